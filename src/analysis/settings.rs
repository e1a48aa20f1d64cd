//! Typed access to an analyzer's `custom_settings` bag
//!
//! Each analyzer converts its bag into a typed struct once, at construction
//! or reconfiguration, so the analysis path never inspects `serde_json::Value`.

use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::types::Settings;

pub struct SettingsReader<'a> {
    settings: &'a Settings,
}

impl<'a> SettingsReader<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Numbers and numeric strings are accepted
    pub fn get_f64(&self, key: &str, default: f64) -> Result<f64> {
        let value = match self.settings.get(key) {
            None | Some(Value::Null) => return Ok(default),
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
        };
        match value {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(EngineError::invalid_setting(key, "expected a number")),
        }
    }

    pub fn get_positive_f64(&self, key: &str, default: f64) -> Result<f64> {
        let value = self.get_f64(key, default)?;
        if value <= 0.0 {
            return Err(EngineError::invalid_setting(
                key,
                format!("must be greater than 0, got {}", value),
            ));
        }
        Ok(value)
    }

    pub fn get_non_negative_f64(&self, key: &str, default: f64) -> Result<f64> {
        let value = self.get_f64(key, default)?;
        if value < 0.0 {
            return Err(EngineError::invalid_setting(
                key,
                format!("must not be negative, got {}", value),
            ));
        }
        Ok(value)
    }

    pub fn get_optional_f64(&self, key: &str) -> Result<Option<f64>> {
        match self.settings.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.get_f64(key, 0.0).map(Some),
        }
    }

    pub fn get_usize(&self, key: &str, default: usize) -> Result<usize> {
        let value = match self.settings.get(key) {
            None | Some(Value::Null) => return Ok(default),
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
            Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
            Some(_) => None,
        };
        value
            .map(|v| v as usize)
            .ok_or_else(|| EngineError::invalid_setting(key, "expected a non-negative integer"))
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.settings.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                _ => Err(EngineError::invalid_setting(key, "expected a boolean")),
            },
            Some(_) => Err(EngineError::invalid_setting(key, "expected a boolean")),
        }
    }

    pub fn get_str(&self, key: &str, default: &str) -> Result<String> {
        match self.settings.get(key) {
            None | Some(Value::Null) => Ok(default.to_string()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(EngineError::invalid_setting(key, "expected a string")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(value: Value) -> Settings {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults_when_missing() {
        let s = Settings::new();
        let reader = SettingsReader::new(&s);
        assert_eq!(reader.get_f64("min_growth", 2.0).unwrap(), 2.0);
        assert_eq!(reader.get_usize("points", 3).unwrap(), 3);
        assert!(reader.get_bool("flag", true).unwrap());
        assert_eq!(reader.get_optional_f64("x").unwrap(), None);
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let s = settings(json!({"min_growth": "1.5", "points": "4", "flag": "false"}));
        let reader = SettingsReader::new(&s);
        assert_eq!(reader.get_f64("min_growth", 2.0).unwrap(), 1.5);
        assert_eq!(reader.get_usize("points", 3).unwrap(), 4);
        assert!(!reader.get_bool("flag", true).unwrap());
    }

    #[test]
    fn test_wrong_types_rejected() {
        let s = settings(json!({"min_growth": "abc", "points": -2, "flag": 3}));
        let reader = SettingsReader::new(&s);
        assert!(reader.get_f64("min_growth", 2.0).is_err());
        assert!(reader.get_usize("points", 3).is_err());
        assert!(reader.get_bool("flag", true).is_err());
    }

    #[test]
    fn test_positive_bound() {
        let s = settings(json!({"min_growth": 0}));
        let reader = SettingsReader::new(&s);
        assert!(reader.get_positive_f64("min_growth", 2.0).is_err());
    }
}
