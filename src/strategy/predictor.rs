use super::TrendPredictor;
use crate::Result;

/// Baseline forecast: price drifts back toward its moving average
///
/// `weight` is the fraction of the gap to the reference expected to close in
/// one interval. It is the stand-in wired up when no trained model is
/// configured; anything smarter implements `TrendPredictor` and replaces it.
#[derive(Debug, Clone)]
pub struct MeanReversionPredictor {
    weight: f64,
}

impl MeanReversionPredictor {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl Default for MeanReversionPredictor {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl TrendPredictor for MeanReversionPredictor {
    fn predict(&self, price: f64, reference: f64) -> Result<f64> {
        Ok(price + self.weight * (reference - price))
    }

    fn name(&self) -> &str {
        "MeanReversionPredictor"
    }
}
