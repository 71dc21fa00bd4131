use crate::control::PidController;
use crate::execution::{EngineConfig, RetryPolicy};
use crate::Result;
use config::{Config, Environment};
use serde::Deserialize;
use std::time::Duration;

/// Runtime settings: built-in defaults first, `HYBRIDBOT_*` environment
/// overrides on top (e.g. `HYBRIDBOT_PAIR`, `HYBRIDBOT_SMA_WINDOW`)
///
/// API credentials are NOT settings - main reads them straight from the
/// environment so they never travel through a printable struct.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Kraken pair name
    pub pair: String,
    /// OHLC candle interval
    pub interval_minutes: u32,
    /// Candles requested per fetch
    pub candle_count: usize,
    /// Moving-average window
    pub sma_window: usize,
    /// Seconds between decision cycles
    pub cycle_seconds: u64,
    /// PID gains
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Optional symmetric clamp on the PID integral (unbounded when unset)
    pub integral_limit: Option<f64>,
    /// Order submission retry budget
    pub max_attempts: u32,
    /// Fixed pause between retries
    pub retry_delay_seconds: u64,
    /// Submit orders in Kraken's validate-only mode
    pub validate_orders: bool,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .set_default("pair", "XXRPZUSD")?
            .set_default("interval_minutes", 1440)?
            .set_default("candle_count", 200)?
            .set_default("sma_window", 200)?
            .set_default("cycle_seconds", 86400)?
            .set_default("kp", 0.1)?
            .set_default("ki", 0.01)?
            .set_default("kd", 0.05)?
            .set_default("max_attempts", 3)?
            .set_default("retry_delay_seconds", 2)?
            .set_default("validate_orders", false)?
            .add_source(Environment::with_prefix("HYBRIDBOT").try_parsing(true))
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay: Duration::from_secs(self.retry_delay_seconds),
        }
    }

    /// Controller primed with the configured gains and optional windup clamp
    pub fn controller(&self) -> PidController {
        let pid = PidController::new(self.kp, self.ki, self.kd);
        match self.integral_limit {
            Some(limit) => pid.with_integral_limit(limit),
            None => pid,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            pair: self.pair.clone(),
            interval_minutes: self.interval_minutes,
            candle_count: self.candle_count,
            sma_window: self.sma_window,
            cycle_interval: Duration::from_secs(self.cycle_seconds),
            retry: self.retry_policy(),
            validate_orders: self.validate_orders,
        }
    }
}
