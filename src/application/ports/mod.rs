pub mod change_feed;
pub mod notifier;
pub mod offline_store;
pub mod remote_store;

pub use change_feed::{ChangeFeed, ChangeStream};
pub use notifier::{Notice, NoticeLevel, Notifier};
pub use offline_store::{OfflineActionDraft, OfflineActionRecord, OfflineStore, OptimisticSnapshot};
pub use remote_store::{InteractionDraft, LikeOutcome, PageCursor, RecordPage, RemoteStore};
