//! Error types for the crate
//!
//! Map operations are infallible; only configuration loading can fail.

use thiserror::Error;

// == Error Enum ==
/// Unified error type for the crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A configuration value could not be parsed
    #[error("Invalid value for {var}: {value:?}")]
    InvalidConfig {
        /// Environment variable name
        var: &'static str,
        /// Raw value that failed to parse
        value: String,
    },
}

// == Result Type Alias ==
/// Convenience Result type for the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_message() {
        let err = Error::InvalidConfig {
            var: "EPHEMERAL_DISABLE_SCHEDULING",
            value: "maybe".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for EPHEMERAL_DISABLE_SCHEDULING: \"maybe\""
        );
    }
}
