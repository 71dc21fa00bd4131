use crate::api::kraken::{KrakenClient, OrderConfirmation};
use crate::control::PidController;
use crate::execution::retry::{invoke_with_retry, retry_all_errors, CallOutcome, RetryPolicy};
use crate::models::{OrderIntent, OrderSide};
use crate::strategy::{extract_signal, TradingMode, TradingStateMachine, TrendPredictor};
use crate::Result;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

/// Engine tunables, decoupled from how settings are loaded
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub pair: String,
    pub interval_minutes: u32,
    pub candle_count: usize,
    pub sma_window: usize,
    pub cycle_interval: Duration,
    pub retry: RetryPolicy,
    /// Submit orders in Kraken's validate-only mode (checked, never booked)
    pub validate_orders: bool,
}

/// What one cycle saw and decided, for logs and tests
#[derive(Debug)]
pub struct CycleReport {
    pub mode: TradingMode,
    pub reference: f64,
    pub latest_price: f64,
    pub prediction: f64,
    pub control_signal: f64,
    pub intent: Option<OrderIntent>,
    pub outcome: Option<CallOutcome<OrderConfirmation>>,
}

/// Sequences one decision cycle: fetch, extract, predict, advance the mode
/// machine, compute the control signal, and submit an order when mode and
/// signal agree
///
/// Owns all mutable decision state (controller memory, current mode), so a
/// single engine instance is one independent trading unit. Running several
/// pairs means several engines; nothing here is shared.
pub struct TradingEngine {
    client: KrakenClient,
    predictor: Box<dyn TrendPredictor>,
    controller: PidController,
    machine: TradingStateMachine,
    config: EngineConfig,
}

impl TradingEngine {
    pub fn new(
        client: KrakenClient,
        predictor: Box<dyn TrendPredictor>,
        controller: PidController,
        config: EngineConfig,
    ) -> Self {
        Self {
            client,
            predictor,
            controller,
            machine: TradingStateMachine::new(),
            config,
        }
    }

    pub fn current_mode(&self) -> TradingMode {
        self.machine.mode()
    }

    /// Run one full decision cycle
    ///
    /// Any error before the decision point (fetch, extraction, prediction)
    /// aborts the cycle with controller and mode machine untouched. A failed
    /// submission does NOT error: the retry wrapper reports exhaustion
    /// through the outcome and the cycle completes.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let closes = self
            .client
            .closing_prices(
                &self.config.pair,
                self.config.interval_minutes,
                self.config.candle_count,
            )
            .await?;

        let signal = extract_signal(&closes, self.config.sma_window)?;

        // Consult the oracle before touching any state: a dead model must
        // leave mode and controller exactly as they were.
        let prediction = self
            .predictor
            .predict(signal.latest_price, signal.reference)?;

        let mode = self
            .machine
            .advance(signal.latest_price, signal.reference, prediction);
        let control_signal = self.controller.compute(signal.reference, signal.latest_price);

        tracing::info!(
            "📈 {}: price {:.4} vs reference {:.4}, prediction {:.4}, mode {}, signal {:.6}",
            self.config.pair,
            signal.latest_price,
            signal.reference,
            prediction,
            mode.as_str(),
            control_signal
        );

        let intent = self.size_order(mode, control_signal);

        let outcome = match &intent {
            Some(intent) => Some(self.submit(intent).await),
            None => None,
        };

        Ok(CycleReport {
            mode,
            reference: signal.reference,
            latest_price: signal.latest_price,
            prediction,
            control_signal,
            intent,
            outcome,
        })
    }

    /// An order exists only when mode and controller agree on direction;
    /// its volume is the magnitude of the control signal
    fn size_order(&self, mode: TradingMode, control_signal: f64) -> Option<OrderIntent> {
        match mode {
            TradingMode::Buying if control_signal > 0.0 => Some(OrderIntent::market(
                &self.config.pair,
                OrderSide::Buy,
                control_signal.abs(),
            )),
            TradingMode::Selling if control_signal < 0.0 => Some(OrderIntent::market(
                &self.config.pair,
                OrderSide::Sell,
                control_signal.abs(),
            )),
            TradingMode::Buying | TradingMode::Selling => {
                tracing::debug!(
                    "Mode {} armed but controller signal {:.6} points the other way, no order",
                    mode.as_str(),
                    control_signal
                );
                None
            }
            _ => None,
        }
    }

    async fn submit(&self, intent: &OrderIntent) -> CallOutcome<OrderConfirmation> {
        tracing::info!(
            "Submitting {} {} {:.8} {}",
            intent.kind.as_str(),
            intent.side.as_str(),
            intent.volume,
            intent.pair
        );

        let client = self.client.clone();
        let intent = intent.clone();
        let validate = self.config.validate_orders;

        let outcome = invoke_with_retry(
            "AddOrder",
            &self.config.retry,
            retry_all_errors,
            move || {
                let client = client.clone();
                let intent = intent.clone();
                async move { client.add_order(&intent, validate).await }
            },
        )
        .await;

        match &outcome.result {
            Some(confirmation) if confirmation.txid.is_empty() => {
                tracing::info!("✓ Order validated, not booked: {}", confirmation.descr.order)
            }
            Some(confirmation) => tracing::info!(
                "✓ Order accepted: {} (txid {:?})",
                confirmation.descr.order,
                confirmation.txid
            ),
            // Exhaustion was already logged at ERROR by the retry wrapper
            None => {}
        }

        outcome
    }

    /// Run cycles forever at the configured interval
    ///
    /// The loop is the fault barrier: every cycle error is logged and
    /// swallowed, and the next tick proceeds regardless. Slow cycles skip
    /// missed ticks instead of bunching them up.
    pub async fn run_forever(&mut self) {
        tracing::info!(
            "🔄 Entering decision loop for {} (cycle every {}s, predictor {})",
            self.config.pair,
            self.config.cycle_interval.as_secs(),
            self.predictor.name()
        );

        let mut ticker = interval_at(Instant::now(), self.config.cycle_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            match self.run_cycle().await {
                Ok(report) => match &report.intent {
                    Some(intent) => tracing::info!(
                        "Cycle done: {} -> {} {:.8} (submitted: {})",
                        report.mode.as_str(),
                        intent.side.as_str(),
                        intent.volume,
                        report
                            .outcome
                            .as_ref()
                            .map(|o| o.succeeded())
                            .unwrap_or(false)
                    ),
                    None => tracing::info!("Cycle done: {}, no order", report.mode.as_str()),
                },
                Err(e) => tracing::error!("Cycle failed: {}", e),
            }
        }
    }
}
