pub mod engulfing;
pub mod sr_breakout;

pub use engulfing::EngulfingDetector;
pub use sr_breakout::{Levels, SrBreakoutDetector, PIP_SIZE};
