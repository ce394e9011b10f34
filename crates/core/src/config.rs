use crate::error::{ParamsError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Characters the query syntax already gives a meaning to
const RESERVED_MARKERS: &[char] = &[
    '\'', '_', '{', '}', '(', ')', '[', ']', ':', '.', ',', '!', '*', '=', '<', '>', '-', '/',
];

/// Configuration for one engine instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Character introducing a placeholder
    pub marker: char,

    /// Show the panel right away instead of waiting for a toggle
    pub initially_visible: bool,

    /// Quiet period used to fold bursts of schema notifications into one pass
    pub debounce_ms: u64,

    /// Capacity of the pass update broadcast channel
    pub update_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            marker: '?',
            initially_visible: false,
            debounce_ms: 25,
            update_capacity: 32,
        }
    }
}

impl EngineConfig {
    /// React to schema notifications without waiting
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            debounce_ms: 0,
            ..Default::default()
        }
    }

    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.update_capacity == 0 {
            return Err(ParamsError::invalid_config("update_capacity must be > 0"));
        }
        if self.marker.is_alphanumeric()
            || self.marker.is_whitespace()
            || RESERVED_MARKERS.contains(&self.marker)
        {
            return Err(ParamsError::invalid_config(format!(
                "{:?} cannot be used as a placeholder marker",
                self.marker
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        EngineConfig::default().validate().unwrap();
        assert_eq!(EngineConfig::immediate().debounce(), Duration::ZERO);
    }

    #[test]
    fn rejects_bad_marker_and_capacity() {
        let config = EngineConfig {
            marker: 'x',
            ..Default::default()
        };
        assert!(config.validate().is_err());

        for marker in [':', '.', '[', '{', '\''] {
            let config = EngineConfig {
                marker,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "{marker:?}");
        }
        let config = EngineConfig {
            marker: '$',
            ..Default::default()
        };
        config.validate().unwrap();

        let config = EngineConfig {
            update_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_partial_json() {
        let config: EngineConfig = serde_json::from_str(r#"{"marker": "$"}"#).unwrap();
        assert_eq!(config.marker, '$');
        assert_eq!(config.update_capacity, 32);
    }
}
