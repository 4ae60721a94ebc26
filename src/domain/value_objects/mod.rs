pub mod author;
pub mod content;
pub mod ids;
pub mod kind;
pub mod target;

pub use author::AuthorProfile;
pub use content::Content;
pub use ids::{GroupId, PostId, RecordId, UserId};
pub use kind::{ActionKind, InteractionKind, SyncStatus};
pub use target::TargetRef;
