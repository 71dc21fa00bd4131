use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLC candle for a trading pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub vwap: f64,
    pub volume: f64,
    pub trades: u32,
}

/// Which side of the book an order hits
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Wire name expected by the exchange (`type` parameter)
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

/// Exchange order type (`ordertype` parameter)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderKind {
    Market,
    Limit,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Market => "market",
            OrderKind::Limit => "limit",
        }
    }
}

/// A fully specified order, ready for submission
///
/// Built fresh for each decision and discarded once submitted. `price` is
/// present exactly when `kind` is `Limit` - the constructors enforce this,
/// so there is no half-built state to validate later.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderIntent {
    pub pair: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub volume: f64,
    pub price: Option<f64>,
}

impl OrderIntent {
    /// Market order: executes at whatever the book offers
    pub fn market(pair: impl Into<String>, side: OrderSide, volume: f64) -> Self {
        Self {
            pair: pair.into(),
            side,
            kind: OrderKind::Market,
            volume,
            price: None,
        }
    }

    /// Limit order at a fixed price
    pub fn limit(pair: impl Into<String>, side: OrderSide, volume: f64, price: f64) -> Self {
        Self {
            pair: pair.into(),
            side,
            kind: OrderKind::Limit,
            volume,
            price: Some(price),
        }
    }
}
