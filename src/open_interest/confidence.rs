//! Confidence scoring for OI growth alongside price moves

/// Inputs shared by both growth scorers. Changes are in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OiMove {
    pub price_change: f64,
    pub oi_change: f64,
    pub data_points: usize,
    pub duration_minutes: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ConfidenceCalculator;

impl ConfidenceCalculator {
    pub fn new() -> Self {
        Self
    }

    /// OI and price rising together
    pub fn growth_with_price(&self, m: &OiMove) -> f64 {
        let price = m.price_change.max(0.0);
        let oi = m.oi_change.max(0.0);
        let score = (price * 5.0).min(30.0)
            + (oi * 3.0).min(30.0)
            + Self::sync_bonus(price, oi)
            + Self::data_bonus(m.data_points)
            + Self::duration_bonus(m.duration_minutes);
        clamp(score)
    }

    /// OI rising while price falls
    pub fn growth_with_fall(&self, m: &OiMove) -> f64 {
        let fall = m.price_change.min(0.0).abs();
        let oi = m.oi_change.max(0.0);
        let score = (fall * 5.0).min(30.0)
            + (oi * 3.0).min(30.0)
            + Self::contrast_bonus(fall, oi)
            + Self::data_bonus(m.data_points)
            + Self::duration_bonus(m.duration_minutes);
        clamp(score)
    }

    /// Up to 15 when the OI/price ratio sits in [0.5, 2.0], peaking at 1.0
    pub fn sync_bonus(price_change: f64, oi_change: f64) -> f64 {
        if price_change <= 0.0 || oi_change <= 0.0 {
            return 0.0;
        }
        let ratio = oi_change / price_change;
        if !(0.5..=2.0).contains(&ratio) {
            return 0.0;
        }
        (15.0 * (1.0 - ratio.ln().abs() / 2f64.ln())).max(0.0)
    }

    /// Inverse movement: the larger both legs, the clearer the signal
    pub fn contrast_bonus(price_fall: f64, oi_change: f64) -> f64 {
        if price_fall <= 0.0 || oi_change <= 0.0 {
            return 0.0;
        }
        ((price_fall + oi_change) * 2.0).min(20.0)
    }

    fn data_bonus(points: usize) -> f64 {
        match points {
            n if n >= 10 => 10.0,
            n if n >= 5 => 5.0,
            _ => 0.0,
        }
    }

    fn duration_bonus(minutes: f64) -> f64 {
        if minutes <= 0.0 {
            0.0
        } else if minutes <= 15.0 {
            10.0
        } else if minutes <= 60.0 {
            5.0
        } else {
            0.0
        }
    }
}

fn clamp(score: f64) -> f64 {
    crate::analysis::math::clamp_confidence(score)
}
