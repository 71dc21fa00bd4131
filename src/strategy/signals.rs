use crate::indicators::sma;
use crate::{Error, Result};

/// What the decision cycle works from: where price has been versus where it is
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketSignal {
    /// Moving-average trend reference
    pub reference: f64,
    /// Most recent close
    pub latest_price: f64,
}

/// Derive the cycle's market signal from a close-price series
///
/// Fails with `InsufficientData` when the series is shorter than the window;
/// a partial average is never substituted. Pure - calling it twice on the
/// same series gives the same signal.
pub fn extract_signal(closes: &[f64], window: usize) -> Result<MarketSignal> {
    if window == 0 {
        return Err(Error::Config(
            "moving-average window must be at least 1".into(),
        ));
    }

    let reference = sma(closes, window).ok_or(Error::InsufficientData {
        got: closes.len(),
        need: window,
    })?;

    // sma succeeding means closes.len() >= window >= 1
    let latest_price = closes[closes.len() - 1];

    Ok(MarketSignal {
        reference,
        latest_price,
    })
}
