pub mod signals;
pub mod trend_cross;

pub use signals::{EntrySignal, SignalDetector};
pub use trend_cross::InstrumentEngine;
