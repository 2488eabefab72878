/// Integrated correlation time of `series` in samples, if it can be estimated.
///
/// Lags are evaluated lazily so the cost is proportional to the window Sokal's
/// criterion settles on rather than to the full series length.
pub fn integrated_time(series: &[f64]) -> Option<f64> {
    let (mean, var) = moments(series)?;
    let mut tau = 0.5;
    for lag in 1..=series.len() / 2 {
        tau += lag_correlation(series, mean, var, lag);
        if lag as f64 >= 5.0 * tau {
            break;
        }
    }
    (tau.is_finite() && tau > 0.0).then_some(tau)
}

fn moments(series: &[f64]) -> Option<(f64, f64)> {
    let n = series.len();
    if n < 2 {
        return None;
    }
    let mean = series.iter().sum::<f64>() / n as f64;
    let var = series.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n as f64;
    Some((mean, var))
}

fn lag_correlation(series: &[f64], mean: f64, var: f64, lag: usize) -> f64 {
    if var <= 0.0 {
        return 0.0;
    }
    let n = series.len();
    let cov = series[..n - lag]
        .iter()
        .zip(&series[lag..])
        .map(|(a, b)| (a - mean) * (b - mean))
        .sum::<f64>()
        / (n - lag) as f64;
    cov / var
}
