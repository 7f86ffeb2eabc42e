pub mod freshness;
pub mod lifecycle;
pub mod oanda;
pub mod scanner;

pub use freshness::{Freshness, FreshnessTracker};
pub use lifecycle::{Engine, EngineHandle};
pub use oanda::OandaClient;
pub use scanner::{Scanner, StrategyGroup, TickSummary, PROBE_CANDLES};
