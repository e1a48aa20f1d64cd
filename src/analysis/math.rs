//! Pure numeric helpers used by the confidence scorers

/// Percent change between two values, `None` when the base is unusable
pub fn percent_change(from: f64, to: f64) -> Option<f64> {
    if from == 0.0 || !from.is_finite() || !to.is_finite() {
        return None;
    }
    Some((to - from) / from * 100.0)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Least-squares slope of the series, expressed as percent of the mean per step
pub fn trend_strength(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values);
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den == 0.0 || y_mean == 0.0 {
        return 0.0;
    }
    num / den / y_mean * 100.0
}

/// Coefficient of variation in percent
pub fn volatility(values: &[f64]) -> f64 {
    let avg = mean(values);
    if avg == 0.0 {
        return 0.0;
    }
    std_dev(values) / avg.abs() * 100.0
}

/// Share of non-flat moves that go in the dominant direction (0-1)
pub fn consistency(values: &[f64]) -> f64 {
    let (mut up, mut down) = (0usize, 0usize);
    for pair in values.windows(2) {
        if pair[1] > pair[0] {
            up += 1;
        } else if pair[1] < pair[0] {
            down += 1;
        }
    }
    let moves = up + down;
    if moves == 0 {
        return 0.0;
    }
    up.max(down) as f64 / moves as f64
}

/// Share of moves going up (`up = true`) or down, flat moves count against
pub fn directional_share(values: &[f64], up: bool) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let hits = values
        .windows(2)
        .filter(|p| if up { p[1] > p[0] } else { p[1] < p[0] })
        .count();
    hits as f64 / (values.len() - 1) as f64
}

/// Pearson correlation, 0 when either series is constant
pub fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let (ma, mb) = (mean(a), mean(b));
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for i in 0..n {
        let da = a[i] - ma;
        let db = b[i] - mb;
        cov += da * db;
        va += da * da;
        vb += db * db;
    }
    if va == 0.0 || vb == 0.0 {
        return 0.0;
    }
    cov / (va.sqrt() * vb.sqrt())
}

pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}
