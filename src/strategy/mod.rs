// Trading strategy module
pub mod predictor;
pub mod signals;
pub mod state_machine;

use crate::Result;

/// Price-forecast oracle consulted once per decision cycle
///
/// Implementations receive the latest close and the moving-average reference
/// and return the expected next price. The decision loop only compares the
/// forecast against the current price, so any model that can rank "up or
/// down from here" plugs in behind this trait.
pub trait TrendPredictor: Send + Sync {
    /// Forecast the next price
    fn predict(&self, price: f64, reference: f64) -> Result<f64>;

    /// Name for logs
    fn name(&self) -> &str;
}

pub use predictor::MeanReversionPredictor;
pub use signals::{extract_signal, MarketSignal};
pub use state_machine::{TradingMode, TradingStateMachine};
