//! Lifecycle Core Configuration

use cadenza_platform::StopMode;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// How diagnostics (failed native calls, invalid arguments, capacity
/// violations) are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiagnosticsMode {
    /// Drop everything, continue best-effort (shipping builds)
    Silent,
    /// Log through `tracing` and continue
    #[default]
    Log,
    /// Log, then panic on programming errors (development builds)
    Strict,
}

/// Overall lifecycle core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplConfig {
    /// Maximum number of native instances enumerated by Pause/Resume
    pub instance_list_capacity: usize,

    /// Diagnostics policy selected at startup
    pub diagnostics: DiagnosticsMode,

    /// Stop mode used when an object stops instances of an event
    pub stop_mode: StopMode,

    /// Initial capacity of each object's pending and active lists
    pub pending_capacity_hint: usize,
}

impl Default for ImplConfig {
    fn default() -> Self {
        Self {
            instance_list_capacity: 32,
            diagnostics: DiagnosticsMode::Log,
            stop_mode: StopMode::AllowFadeOut,
            pending_capacity_hint: 8,
        }
    }
}

impl ImplConfig {
    /// Create config for development: every programming error is fatal
    pub fn development() -> Self {
        Self {
            diagnostics: DiagnosticsMode::Strict,
            ..Self::default()
        }
    }

    /// Create config for shipping: degrade gracefully, never crash
    pub fn shipping() -> Self {
        Self {
            diagnostics: DiagnosticsMode::Silent,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate().map_err(CoreError::ConfigError)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.instance_list_capacity == 0 || self.instance_list_capacity > 1024 {
            return Err(format!(
                "Invalid instance list capacity: {}",
                self.instance_list_capacity
            ));
        }
        if self.pending_capacity_hint > 4096 {
            return Err(format!(
                "Invalid pending capacity hint: {}",
                self.pending_capacity_hint
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ImplConfig::default();
        assert_eq!(config.instance_list_capacity, 32);
        assert_eq!(config.diagnostics, DiagnosticsMode::Log);
        assert_eq!(config.stop_mode, StopMode::AllowFadeOut);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_preset_configs() {
        assert_eq!(ImplConfig::development().diagnostics, DiagnosticsMode::Strict);
        assert_eq!(ImplConfig::shipping().diagnostics, DiagnosticsMode::Silent);
    }

    #[test]
    fn test_validation() {
        let zero = ImplConfig {
            instance_list_capacity: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let huge_hint = ImplConfig {
            pending_capacity_hint: 100_000,
            ..Default::default()
        };
        assert!(huge_hint.validate().is_err());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "instance_list_capacity": 64,
            "diagnostics": "Strict",
            "stop_mode": "Immediate",
            "pending_capacity_hint": 4
        }"#;
        let config = ImplConfig::from_json(json).unwrap();
        assert_eq!(config.instance_list_capacity, 64);
        assert_eq!(config.stop_mode, StopMode::Immediate);

        let invalid = json.replace("64", "0");
        assert!(matches!(
            ImplConfig::from_json(&invalid),
            Err(CoreError::ConfigError(_))
        ));
        assert!(ImplConfig::from_json("{").is_err());
    }
}
