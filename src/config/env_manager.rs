use std::env;

use crate::error::{Result, SetupError};

/// Environment variable holding the default target host
pub const TARGET_VAR: &str = "LEO_TARGET";
/// Environment variable holding the default API token
pub const AUTHTOKEN_VAR: &str = "LEO_AUTHTOKEN";
/// Environment variable holding the default broker id
pub const BROKERID_VAR: &str = "LEO_BROKERID";

/// Connection defaults picked up from the environment
///
/// These sit below both the command line and the config file: they only
/// fill values nothing else provided.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvDefaults {
    /// Default target host
    pub target: Option<String>,
    /// Default API token
    pub authtoken: Option<String>,
    /// Default broker id
    pub brokerid: Option<i64>,
}

impl EnvDefaults {
    /// Reads defaults from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads defaults through an arbitrary lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let brokerid = match non_empty(BROKERID_VAR) {
            Some(raw) => Some(raw.trim().parse::<i64>().map_err(|_| {
                SetupError::Config(format!("{} must be an integer, got '{}'", BROKERID_VAR, raw))
            })?),
            None => None,
        };

        Ok(Self {
            target: non_empty(TARGET_VAR),
            authtoken: non_empty(AUTHTOKEN_VAR),
            brokerid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_reads_all_values() -> Result<()> {
        let defaults = EnvDefaults::from_lookup(lookup(&[
            (TARGET_VAR, "10.0.0.5"),
            (AUTHTOKEN_VAR, "abc123"),
            (BROKERID_VAR, " 42 "),
        ]))?;
        assert_eq!(defaults.target.as_deref(), Some("10.0.0.5"));
        assert_eq!(defaults.authtoken.as_deref(), Some("abc123"));
        assert_eq!(defaults.brokerid, Some(42));
        Ok(())
    }

    #[test]
    fn test_blank_values_are_ignored() -> Result<()> {
        let defaults = EnvDefaults::from_lookup(lookup(&[(TARGET_VAR, "   ")]))?;
        assert_eq!(defaults, EnvDefaults::default());
        Ok(())
    }

    #[test]
    fn test_bad_broker_id() {
        let result = EnvDefaults::from_lookup(lookup(&[(BROKERID_VAR, "east")]));
        assert!(matches!(result, Err(SetupError::Config(_))));
    }
}
