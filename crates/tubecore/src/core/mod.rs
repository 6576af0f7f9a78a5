//! Core utilities, configuration, and common functionality

pub mod config;
pub mod error;
pub mod logging;
pub mod process;
pub mod session;
pub mod url;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_tools_configuration};
pub use session::{Session, SessionKind, SessionRegistry};
pub use validation::ValidationError;
