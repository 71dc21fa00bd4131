/// Entry band: a dip is a close more than 10% below the reference
const BUY_DIP_RATIO: f64 = 0.9;
/// Entry band: a rally is a close more than 10% above the reference
const SELL_RALLY_RATIO: f64 = 1.1;

/// Operating mode of the decision loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingMode {
    /// Watching the market, no setup confirmed
    Waiting,
    /// Dip confirmed, a buy may be sized this cycle
    Buying,
    /// Rally confirmed, a sell may be sized this cycle
    Selling,
    /// Cooldown after an action mode, always releases next cycle
    Holding,
}

impl TradingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingMode::Waiting => "waiting",
            TradingMode::Buying => "buying",
            TradingMode::Selling => "selling",
            TradingMode::Holding => "holding",
        }
    }
}

/// Mode machine gating when the bot may act
///
/// A buy setup is a >10% dip under the reference that the predictor expects
/// to recover; a sell setup is the mirror image. Action modes last exactly
/// one cycle before decaying through `Holding` back to `Waiting`, so two
/// consecutive orders on the same setup are impossible. The only shortcut
/// is a direct flip between `Buying` and `Selling` when the market swings
/// through the whole band in one interval.
#[derive(Debug, Clone)]
pub struct TradingStateMachine {
    mode: TradingMode,
}

impl TradingStateMachine {
    /// Start in `Waiting`; there is no terminal mode
    pub fn new() -> Self {
        Self {
            mode: TradingMode::Waiting,
        }
    }

    pub fn mode(&self) -> TradingMode {
        self.mode
    }

    /// Advance one cycle and return the new mode
    pub fn advance(&mut self, price: f64, reference: f64, prediction: f64) -> TradingMode {
        let buy_setup = price < BUY_DIP_RATIO * reference && prediction > price;
        let sell_setup = price > SELL_RALLY_RATIO * reference && prediction < price;

        let next = match self.mode {
            TradingMode::Waiting if buy_setup => TradingMode::Buying,
            TradingMode::Waiting if sell_setup => TradingMode::Selling,
            TradingMode::Waiting => TradingMode::Waiting,
            TradingMode::Buying if sell_setup => TradingMode::Selling,
            TradingMode::Buying => TradingMode::Holding,
            TradingMode::Selling if buy_setup => TradingMode::Buying,
            TradingMode::Selling => TradingMode::Holding,
            TradingMode::Holding => TradingMode::Waiting,
        };

        if next != self.mode {
            tracing::info!(
                "Mode {} -> {} (price={:.4}, reference={:.4}, prediction={:.4})",
                self.mode.as_str(),
                next.as_str(),
                price,
                reference,
                prediction
            );
        }

        self.mode = next;
        next
    }
}

impl Default for TradingStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
