#![deny(warnings)]

//! Core domain models and invariants for the idle progression core.
//!
//! This crate defines the serializable game state, the state-store seam every
//! other component reads and writes through, the static upgrade and automation
//! registries, and the validated game configuration.

pub mod automation;
pub mod config;
pub mod state;
pub mod upgrades;

pub use automation::{AutomationDef, AutomationEffect, AutomationError, AutomationId, AutomationRegistry};
pub use config::{ConfigError, GameConfig, GenerationConfig, OfflineConfig, TickConfig};
pub use idle_econ::BigNum;
pub use state::{AutomationRuntime, GameState, SessionStats, StateStore, TOP_SCORES_PER_MINIGAME};
pub use upgrades::{
    Cost, EffectType, UpgradeCost, UpgradeDef, UpgradeError, UpgradeId, UpgradeInfo, UpgradeKey,
    UpgradeKind, UpgradeRegistry,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Currencies held by the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Primary currency, produced continuously from minigame scores.
    Gold,
    /// Skill currency, mostly produced by automations.
    Technique,
    /// Prestige currency.
    Prestige,
}

impl ResourceKind {
    /// All resource kinds in display order.
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Gold,
        ResourceKind::Technique,
        ResourceKind::Prestige,
    ];

    /// The resource credited by continuous generation and offline catch-up.
    pub const PRIMARY: ResourceKind = ResourceKind::Gold;

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::Gold => "Gold",
            ResourceKind::Technique => "Technique",
            ResourceKind::Prestige => "Prestige",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Minigames whose scores feed generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinigameId {
    Runner,
    Stacker,
    Rhythm,
}

impl MinigameId {
    pub const ALL: [MinigameId; 3] = [MinigameId::Runner, MinigameId::Stacker, MinigameId::Rhythm];

    pub fn name(&self) -> &'static str {
        match self {
            MinigameId::Runner => "Runner",
            MinigameId::Stacker => "Stacker",
            MinigameId::Rhythm => "Rhythm",
        }
    }
}

impl fmt::Display for MinigameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validation errors for registries and their cross references.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Two definitions share an id.
    #[error("duplicate id: {0}")]
    DuplicateId(String),
    /// Costs and grant amounts must be strictly positive.
    #[error("non-positive cost or amount in {0}")]
    NonPositiveAmount(String),
    /// Growth rates must be strictly positive.
    #[error("growth rate must be > 0 in {0}")]
    InvalidGrowth(String),
    /// Automation intervals must be non-zero.
    #[error("automation {0} has a zero interval")]
    ZeroInterval(String),
    /// Reference to an automation that is not registered.
    #[error("unknown automation: {0}")]
    UnknownAutomation(String),
    /// Reference to an upgrade that is not registered.
    #[error("unknown upgrade: {0}")]
    UnknownUpgrade(String),
    /// Configuration values out of range.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Everything static about a game: definitions plus tuning.
#[derive(Clone, Debug)]
pub struct GameRules {
    pub upgrades: UpgradeRegistry,
    pub automations: AutomationRegistry,
    pub config: GameConfig,
}

impl GameRules {
    /// Bundle and cross-validate registries and configuration.
    pub fn new(
        upgrades: UpgradeRegistry,
        automations: AutomationRegistry,
        config: GameConfig,
    ) -> Result<Self, ValidationError> {
        let rules = Self {
            upgrades,
            automations,
            config,
        };
        rules.validate()?;
        Ok(rules)
    }

    /// The shipped definitions with default tuning.
    pub fn standard() -> Self {
        Self {
            upgrades: UpgradeRegistry::standard(),
            automations: AutomationRegistry::standard(),
            config: GameConfig::default(),
        }
    }

    /// Same definitions with custom tuning.
    pub fn with_config(config: GameConfig) -> Result<Self, ValidationError> {
        Self::new(
            UpgradeRegistry::standard(),
            AutomationRegistry::standard(),
            config,
        )
    }

    /// Check references between upgrades, automations and configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.config.validate()?;
        let automation_ids: BTreeSet<&AutomationId> =
            self.automations.iter().map(|a| &a.id).collect();
        for def in self.upgrades.iter() {
            if let UpgradeKind::DualUnlock { unlocks, .. } = &def.kind {
                if !automation_ids.contains(unlocks) {
                    return Err(ValidationError::UnknownAutomation(unlocks.0.clone()));
                }
            }
        }
        for auto in self.automations.iter() {
            if self.upgrades.get(&auto.gate).is_none() {
                return Err(ValidationError::UnknownUpgrade(auto.gate.0.clone()));
            }
        }
        for id in self.config.generation.multipliers.values() {
            if self.upgrades.get(id).is_none() {
                return Err(ValidationError::UnknownUpgrade(id.0.clone()));
            }
        }
        Ok(())
    }

    /// Whether a global upgrade has at least one level (or is owned).
    pub fn is_owned<S: StateStore + ?Sized>(&self, store: &S, id: &UpgradeId) -> bool {
        self.upgrades
            .level(store, &UpgradeKey::global(id.clone()))
            .map(|l| l > 0)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_rules_are_consistent() {
        GameRules::standard().validate().unwrap();
    }

    #[test]
    fn dangling_automation_reference_is_rejected() {
        let err = GameRules::new(
            UpgradeRegistry::standard(),
            AutomationRegistry::new(vec![]).unwrap(),
            GameConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::UnknownAutomation(_)));
    }

    #[test]
    fn unknown_multiplier_upgrade_is_rejected() {
        let mut config = GameConfig::default();
        config
            .generation
            .multipliers
            .insert(ResourceKind::Technique, UpgradeId::from("missing"));
        let err = GameRules::with_config(config).unwrap_err();
        assert_eq!(err, ValidationError::UnknownUpgrade("missing".into()));
    }

    #[test]
    fn resource_keys_serialize_as_snake_case() {
        let s = serde_json::to_string(&ResourceKind::Technique).unwrap();
        assert_eq!(s, r#""technique""#);
        let back: MinigameId = serde_json::from_str(r#""rhythm""#).unwrap();
        assert_eq!(back, MinigameId::Rhythm);
    }
}
