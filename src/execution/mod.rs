// Decision cycle and order submission module
pub mod engine;
pub mod retry;

pub use engine::{CycleReport, EngineConfig, TradingEngine};
pub use retry::{invoke_with_retry, retry_all_errors, CallOutcome, RetryPolicy};
