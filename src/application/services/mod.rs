pub mod interaction_service;
pub mod like_service;
pub mod realtime_router;

pub use interaction_service::InteractionService;
pub use like_service::LikeService;
pub use realtime_router::RealtimeRouter;
