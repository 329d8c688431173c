//! Router configuration

use serde::{Deserialize, Serialize};

/// Configuration for the event router service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Capacity of the command channel; `None` means unbounded
    pub channel_capacity: Option<usize>,
    /// Whether to log every dispatch (for debugging)
    pub log_dispatches: bool,
    /// Whether to track dispatch statistics
    pub enable_stats: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: None,
            log_dispatches: false,
            enable_stats: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RouterConfig::default();
        assert_eq!(config.channel_capacity, None);
        assert!(!config.log_dispatches);
        assert!(config.enable_stats);
    }

    #[test]
    fn test_serde_round_trip() {
        let config = RouterConfig {
            channel_capacity: Some(256),
            log_dispatches: true,
            enable_stats: false,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: RouterConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.channel_capacity, Some(256));
        assert!(back.log_dispatches);
        assert!(!back.enable_stats);
    }
}
