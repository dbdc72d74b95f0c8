pub mod config;
pub mod error;

pub use config::{AdminConfig, AppConfig, RateLimitConfig, ServerConfig};
pub use error::{GatekeeperError, GatekeeperResult};
