/// Simple moving average over the last `window` values
///
/// Returns `None` when the series is shorter than the window (a partial
/// average would be a different indicator) or when the window is zero.
pub fn sma(values: &[f64], window: usize) -> Option<f64> {
    if window == 0 || values.len() < window {
        return None;
    }

    let sum: f64 = values.iter().rev().take(window).sum();
    Some(sum / window as f64)
}
