pub mod config;
pub mod error;
pub mod guard;
pub mod scope;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use guard::InFlightGuard;
pub use scope::ScopeToken;
