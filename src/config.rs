//! Engine configuration.
//!
//! Protocol limits are carried in an explicit [`EngineConfig`] built once
//! at startup and handed to the executor. Nothing reads configuration from
//! global state.

use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Highest slot number a hook may hold.
    pub max_slots: u32,
    /// Upper bound for `etxn_nonce` calls per execution.
    pub max_nonce: u32,
    /// Upper bound for `etxn_reserve`.
    pub max_emit: u32,
    /// Parameter overrides a single execution may set.
    pub max_params: u32,
    /// Modified state entries across one transaction's hook chain.
    pub max_state_modifications: u32,
    /// Namespaces an account may hold.
    pub max_namespaces: u32,
    pub max_state_data_size: usize,
    pub max_param_key_size: usize,
    pub max_param_value_size: usize,
    pub max_exit_reason_len: usize,
    /// Emission chains deeper than this are refused.
    pub max_emit_generation: u32,
    /// How far past the current ledger `LastLedgerSequence` may point.
    pub max_ledger_lookahead: u32,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            max_slots: 255,
            max_nonce: 255,
            max_emit: 255,
            max_params: 16,
            max_state_modifications: 256,
            max_namespaces: 256,
            max_state_data_size: 256,
            max_param_key_size: 32,
            max_param_value_size: 256,
            max_exit_reason_len: 256,
            max_emit_generation: 10,
            max_ledger_lookahead: 5,
        }
    }

    /// Load and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading engine configuration from {:?}", path);
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)
            .map_err(|e| EngineError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| EngineError::Config(format!("Failed to render configuration: {}", e)))
    }

    /// Reject limits the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_slots == 0 || self.max_slots > 255 {
            return Err(EngineError::Config(format!(
                "max_slots must be within 1..=255, got {}",
                self.max_slots
            )));
        }
        // nonce counter is serialized as u16
        if self.max_nonce > u16::MAX as u32 {
            return Err(EngineError::Config(format!(
                "max_nonce must fit in 16 bits, got {}",
                self.max_nonce
            )));
        }
        if self.max_emit == 0 {
            return Err(EngineError::Config("max_emit must be positive".into()));
        }
        if self.max_state_modifications == 0 {
            return Err(EngineError::Config(
                "max_state_modifications must be positive".into(),
            ));
        }
        if self.max_param_key_size == 0 || self.max_param_key_size > 32 {
            return Err(EngineError::Config(format!(
                "max_param_key_size must be within 1..=32, got {}",
                self.max_param_key_size
            )));
        }
        if self.max_ledger_lookahead == 0 {
            return Err(EngineError::Config(
                "max_ledger_lookahead must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_ledger_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.max_slots, 255);
        assert_eq!(config.max_params, 16);
        assert_eq!(config.max_state_modifications, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml("max_emit = 4\nmax_nonce = 8\n").unwrap();
        assert_eq!(config.max_emit, 4);
        assert_eq!(config.max_nonce, 8);
        assert_eq!(config.max_slots, 255);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = EngineConfig::from_toml("max_gas = 1\n").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_out_of_range_slots_rejected() {
        let err = EngineConfig::from_toml("max_slots = 300\n").unwrap_err();
        assert!(err.to_string().contains("max_slots"));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EngineConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(EngineConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "max_slots = 16\n").unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap().max_slots, 16);
    }
}
