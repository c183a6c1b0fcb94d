// Configuration validation

use crate::{ConfigError, Result};

/// Trait for validating a loaded configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Field-level checks shared by configuration structs
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!("{field} cannot be empty")));
        }
        Ok(())
    }

    pub fn is_port(value: u16, field: &str) -> Result<()> {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{field} must be a valid port number"
            )));
        }
        Ok(())
    }

    pub fn positive(value: usize, field: &str) -> Result<()> {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!("{field} must be greater than 0")));
        }
        Ok(())
    }

    /// Case-insensitive membership
    pub fn one_of(value: &str, allowed: &[&str], field: &str) -> Result<()> {
        if !allowed.iter().any(|a| a.eq_ignore_ascii_case(value)) {
            return Err(ConfigError::ValidationError(format!(
                "{field} must be one of {}, got {value:?}",
                allowed.join(", ")
            )));
        }
        Ok(())
    }
}
