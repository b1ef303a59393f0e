pub mod ledger;
pub mod position;
pub mod session;
pub mod trade_record;

pub use ledger::{InstrumentStats, TradeLedger};
pub use position::{Action, Phase, PositionState};
pub use session::TradingSession;
pub use trade_record::TradeRecord;
