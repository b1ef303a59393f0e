pub mod adx;
pub mod indicators;
pub mod sma;
pub mod wilder;

pub use indicators::{compute_frames, IndicatorEngine, IndicatorFrame};
