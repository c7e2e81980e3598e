//! Configuration Module
//!
//! Construction-time options for [`ExpiringMap`](crate::ExpiringMap).

use std::env;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Environment variable controlling [`ExpiringMapConfig::disable_scheduling`].
pub const DISABLE_SCHEDULING_VAR: &str = "EPHEMERAL_DISABLE_SCHEDULING";

/// Expiring map configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExpiringMapConfig {
    /// When true no eviction timers are armed; expired entries are only
    /// reclaimed when a read finds them
    pub disable_scheduling: bool,
}

impl ExpiringMapConfig {
    /// Config with scheduling turned off.
    pub fn lazy_only() -> Self {
        Self {
            disable_scheduling: true,
        }
    }

    /// Creates a new config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `EPHEMERAL_DISABLE_SCHEDULING` - `true/false/1/0/yes/no/on/off` (default: false)
    pub fn from_env() -> Result<Self> {
        let disable_scheduling = match env::var(DISABLE_SCHEDULING_VAR) {
            Ok(raw) => parse_flag(&raw).ok_or(Error::InvalidConfig {
                var: DISABLE_SCHEDULING_VAR,
                value: raw,
            })?,
            Err(_) => false,
        };

        Ok(Self { disable_scheduling })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ExpiringMapConfig::default();
        assert!(!config.disable_scheduling);
        assert!(ExpiringMapConfig::lazy_only().disable_scheduling);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" on "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("Off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
        assert_eq!(parse_flag(""), None);
    }

    // Only test touching the variable, so no cross-test races
    #[test]
    fn test_config_from_env() {
        env::remove_var(DISABLE_SCHEDULING_VAR);
        assert_eq!(
            ExpiringMapConfig::from_env(),
            Ok(ExpiringMapConfig::default())
        );

        env::set_var(DISABLE_SCHEDULING_VAR, "yes");
        assert_eq!(
            ExpiringMapConfig::from_env(),
            Ok(ExpiringMapConfig::lazy_only())
        );

        env::set_var(DISABLE_SCHEDULING_VAR, "sometimes");
        assert!(matches!(
            ExpiringMapConfig::from_env(),
            Err(Error::InvalidConfig { value, .. }) if value == "sometimes"
        ));

        env::remove_var(DISABLE_SCHEDULING_VAR);
    }

    #[test]
    fn test_config_deserialize_defaults() {
        let config: ExpiringMapConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ExpiringMapConfig::default());

        let config: ExpiringMapConfig =
            serde_json::from_str(r#"{"disable_scheduling":true}"#).unwrap();
        assert!(config.disable_scheduling);
    }
}
