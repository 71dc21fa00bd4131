use thiserror::Error;

/// Errors surfaced by the trading loop and its collaborators.
///
/// Everything here is cycle-scoped: the run loop logs the failure and waits
/// for the next tick. Retry exhaustion is deliberately NOT a variant; the
/// retry wrapper reports it through `CallOutcome` instead of raising.
#[derive(Debug, Error)]
pub enum Error {
    /// Price history is shorter than the moving-average window.
    #[error("insufficient price data: got {got} closes, need {need}")]
    InsufficientData { got: usize, need: usize },

    /// Network or HTTP-level failure talking to the exchange.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The exchange answered, but its response envelope reported an error
    /// (or the payload was malformed).
    #[error("exchange error: {0}")]
    Exchange(String),

    /// The trend predictor could not produce a forecast.
    #[error("prediction failed: {0}")]
    Prediction(String),

    /// Bad or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}
