pub mod kraken;

pub use kraken::{ClosedOrders, KrakenClient, OpenOrders, OrderConfirmation};
