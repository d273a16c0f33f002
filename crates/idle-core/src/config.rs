//! Game tuning: generation sources, offline catch-up and tick cadence.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{BigNum, MinigameId, ResourceKind, UpgradeId};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid config yaml: {0}")]
    Yaml(String),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Top-level configuration, usually read from a YAML file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub generation: GenerationConfig,
    pub offline: OfflineConfig,
    pub tick: TickConfig,
}

/// How minigame scores become continuous income.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Sum of top scores divided by this gives units per second.
    pub score_to_rate_divisor: BigNum,
    /// Minigames whose scores feed each resource.
    pub sources: BTreeMap<ResourceKind, Vec<MinigameId>>,
    /// Upgrade whose effect multiplies each resource's rate.
    pub multipliers: BTreeMap<ResourceKind, UpgradeId>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            score_to_rate_divisor: BigNum::from(100u32),
            sources: BTreeMap::from([(ResourceKind::Gold, MinigameId::ALL.to_vec())]),
            multipliers: BTreeMap::from([(
                ResourceKind::Gold,
                UpgradeId::from("gold_multiplier"),
            )]),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
    pub enabled: bool,
    /// Absences longer than this are capped.
    pub max_offline_seconds: u64,
    /// Fraction of the online rate earned while away.
    pub efficiency: BigNum,
    /// Absences at least this long ask the UI for a welcome-back modal.
    pub modal_threshold_seconds: u64,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_offline_seconds: 8 * 3600,
            efficiency: BigNum::from(5u32) * BigNum::pow10(-1),
            modal_threshold_seconds: 60,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Upper clamp on a single frame's delta.
    pub max_frame_delta_ms: u64,
    /// Wall-time between rate recomputations.
    pub rate_refresh_ms: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            max_frame_delta_ms: 1000,
            rate_refresh_ms: 250,
        }
    }
}

impl GameConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: GameConfig =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Yaml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Yaml(e.to_string()))
    }

    /// Range checks on tuning values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.generation.score_to_rate_divisor.is_positive() {
            return Err(ConfigError::Invalid(
                "generation.score_to_rate_divisor must be > 0".into(),
            ));
        }
        let eff = self.offline.efficiency;
        if eff.is_negative() || eff > BigNum::ONE {
            return Err(ConfigError::Invalid(
                "offline.efficiency must be within [0, 1]".into(),
            ));
        }
        if self.tick.max_frame_delta_ms == 0 {
            return Err(ConfigError::Invalid("tick.max_frame_delta_ms must be > 0".into()));
        }
        if self.tick.rate_refresh_ms == 0 {
            return Err(ConfigError::Invalid("tick.rate_refresh_ms must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = GameConfig::default();
        assert_eq!(c.offline.max_offline_seconds, 28_800);
        assert_eq!(c.offline.efficiency.to_string(), "0.5");
        assert_eq!(c.offline.modal_threshold_seconds, 60);
        assert!(c.offline.enabled);
        assert_eq!(c.tick.max_frame_delta_ms, 1000);
        assert_eq!(c.tick.rate_refresh_ms, 250);
        assert_eq!(c.generation.score_to_rate_divisor, BigNum::from(100u32));
        c.validate().unwrap();
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let c = GameConfig::from_yaml_str(
            "offline:\n  efficiency: 0.25\n  max_offline_seconds: 3600\ntick:\n  rate_refresh_ms: 500\n",
        )
        .unwrap();
        assert_eq!(c.offline.efficiency.to_string(), "0.25");
        assert_eq!(c.offline.max_offline_seconds, 3600);
        assert_eq!(c.offline.modal_threshold_seconds, 60);
        assert_eq!(c.tick.rate_refresh_ms, 500);
        assert_eq!(c.tick.max_frame_delta_ms, 1000);
        assert_eq!(c.generation, GenerationConfig::default());
    }

    #[test]
    fn yaml_roundtrip() {
        let c = GameConfig::default();
        let text = c.to_yaml_string().unwrap();
        assert_eq!(GameConfig::from_yaml_str(&text).unwrap(), c);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = GameConfig::from_yaml_str("offline:\n  efficiency: \"1.5\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = GameConfig::from_yaml_str("tick:\n  max_frame_delta_ms: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err =
            GameConfig::from_yaml_str("generation:\n  score_to_rate_divisor: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(matches!(
            GameConfig::from_yaml_str("tick: [1, 2"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
