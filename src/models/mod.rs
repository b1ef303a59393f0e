pub mod candle;
pub mod side;
pub mod timeframe;

pub use candle::{Candle, CandleSeries};
pub use side::{ExitReason, Side};
pub use timeframe::Timeframe;
