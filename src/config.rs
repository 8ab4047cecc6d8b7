//! Runtime configuration read from the environment.

use crate::error::ConfigError;
use crate::slicer::{AvailabilitySlicer, DEFAULT_SLOT_MINUTES};

pub const SLOT_MINUTES_VAR: &str = "CLINIC_SLOT_MINUTES";
pub const LOG_FILTER_VAR: &str = "CLINIC_LOG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    /// Length of a bookable unit.
    pub slot_minutes: i64,
    /// `tracing_subscriber::EnvFilter` directive.
    pub log_filter: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        PortalConfig {
            slot_minutes: DEFAULT_SLOT_MINUTES,
            log_filter: "info".to_string(),
        }
    }
}

impl PortalConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = PortalConfig::default();

        if let Some(raw) = lookup(SLOT_MINUTES_VAR) {
            config.slot_minutes = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: SLOT_MINUTES_VAR,
                value: raw.clone(),
            })?;
        }
        if let Some(filter) = lookup(LOG_FILTER_VAR) {
            config.log_filter = filter;
        }

        config.slicer()?;
        Ok(config)
    }

    pub fn slicer(&self) -> Result<AvailabilitySlicer, ConfigError> {
        AvailabilitySlicer::new(self.slot_minutes)
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
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = PortalConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, PortalConfig::default());
        assert_eq!(config.slicer().unwrap().unit(), chrono::Duration::minutes(60));
    }

    #[test]
    fn reads_overrides() {
        let config =
            PortalConfig::from_lookup(lookup(&[(SLOT_MINUTES_VAR, " 30 "), (LOG_FILTER_VAR, "debug")]))
                .unwrap();
        assert_eq!(config.slot_minutes, 30);
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn rejects_bad_slot_size() {
        assert_eq!(
            PortalConfig::from_lookup(lookup(&[(SLOT_MINUTES_VAR, "soon")])),
            Err(ConfigError::Invalid {
                key: SLOT_MINUTES_VAR,
                value: "soon".to_string()
            })
        );
        assert_eq!(
            PortalConfig::from_lookup(lookup(&[(SLOT_MINUTES_VAR, "0")])),
            Err(ConfigError::NonPositiveSlot(0))
        );
        assert_eq!(
            PortalConfig::from_lookup(lookup(&[(SLOT_MINUTES_VAR, "9223372036854775807")])),
            Err(ConfigError::SlotOutOfRange(i64::MAX))
        );
    }
}
