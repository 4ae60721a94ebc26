pub mod change;
pub mod interaction;
pub mod ledger;
pub mod like_state;
pub mod session;

pub use change::{ChangeEvent, RemoteRecord};
pub use interaction::InteractionRecord;
pub use ledger::InteractionLedger;
pub use like_state::LikeState;
pub use session::Session;
