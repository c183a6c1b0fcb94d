// Layered configuration for Girder applications

pub mod env;
pub mod error;
pub mod loader;
pub mod server;
pub mod validation;

pub use env::{EnvLoader, EnvSource, NESTING_SEPARATOR};
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use server::{LogSettings, ServerConfig};
pub use validation::{ConfigValidator, Validate};
