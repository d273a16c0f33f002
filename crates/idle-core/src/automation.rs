//! Static automation definitions.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::{BigNum, ResourceKind, StateStore, UpgradeId, ValidationError};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AutomationId(pub String);

impl From<&str> for AutomationId {
    fn from(s: &str) -> Self {
        AutomationId(s.to_string())
    }
}

impl fmt::Display for AutomationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AutomationError {
    /// Unknown id, or an automation whose gate has never been owned.
    #[error("automation not found: {0}")]
    NotFound(String),
}

/// What one trigger does to the store.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AutomationEffect {
    /// Debit `cost` of `from` and credit `amount` of `to`; nothing when the
    /// balance does not cover the cost.
    Convert {
        from: ResourceKind,
        cost: BigNum,
        to: ResourceKind,
        amount: BigNum,
    },
    /// Unconditional credit.
    Grant { to: ResourceKind, amount: BigNum },
}

impl AutomationEffect {
    /// Run the effect once. Returns whether anything happened.
    pub fn apply<S: StateStore + ?Sized>(&self, store: &mut S) -> bool {
        match *self {
            AutomationEffect::Convert {
                from,
                cost,
                to,
                amount,
            } => {
                if !store.debit(from, cost) {
                    trace!(resource = %from, "conversion skipped, balance too low");
                    return false;
                }
                store.credit(to, amount);
                true
            }
            AutomationEffect::Grant { to, amount } => {
                store.credit(to, amount);
                true
            }
        }
    }

    /// Resource and amount produced by one successful trigger.
    pub fn output(&self) -> (ResourceKind, BigNum) {
        match *self {
            AutomationEffect::Convert { to, amount, .. } | AutomationEffect::Grant { to, amount } => {
                (to, amount)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AutomationDef {
    pub id: AutomationId,
    pub name: String,
    pub interval_ms: u64,
    /// Upgrade that must be owned before the automation exists.
    pub gate: UpgradeId,
    pub effect: AutomationEffect,
}

#[derive(Clone, Debug)]
pub struct AutomationRegistry {
    defs: Vec<AutomationDef>,
}

impl AutomationRegistry {
    pub fn new(defs: Vec<AutomationDef>) -> Result<Self, ValidationError> {
        let mut seen = BTreeSet::new();
        for def in &defs {
            if !seen.insert(def.id.clone()) {
                return Err(ValidationError::DuplicateId(def.id.0.clone()));
            }
            if def.interval_ms == 0 {
                return Err(ValidationError::ZeroInterval(def.id.0.clone()));
            }
            let amounts_ok = match def.effect {
                AutomationEffect::Convert { cost, amount, .. } => {
                    cost.is_positive() && amount.is_positive()
                }
                AutomationEffect::Grant { amount, .. } => amount.is_positive(),
            };
            if !amounts_ok {
                return Err(ValidationError::NonPositiveAmount(def.id.0.clone()));
            }
        }
        Ok(Self { defs })
    }

    pub fn standard() -> Self {
        Self {
            defs: vec![
                AutomationDef {
                    id: AutomationId::from("refine_technique"),
                    name: "Refinery".into(),
                    interval_ms: 60_000,
                    gate: UpgradeId::from("technique_refinery"),
                    effect: AutomationEffect::Convert {
                        from: ResourceKind::Gold,
                        cost: BigNum::from(500u32),
                        to: ResourceKind::Technique,
                        amount: BigNum::ONE,
                    },
                },
                AutomationDef {
                    id: AutomationId::from("condense_prestige"),
                    name: "Prestige Press".into(),
                    interval_ms: 300_000,
                    gate: UpgradeId::from("prestige_press"),
                    effect: AutomationEffect::Convert {
                        from: ResourceKind::Technique,
                        cost: BigNum::from(100u32),
                        to: ResourceKind::Prestige,
                        amount: BigNum::ONE,
                    },
                },
            ],
        }
    }

    pub fn get(&self, id: &AutomationId) -> Option<&AutomationDef> {
        self.defs.iter().find(|d| &d.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AutomationDef> {
        self.defs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameState;

    fn convert() -> AutomationEffect {
        AutomationEffect::Convert {
            from: ResourceKind::Gold,
            cost: BigNum::from(500u32),
            to: ResourceKind::Technique,
            amount: BigNum::ONE,
        }
    }

    #[test]
    fn convert_needs_full_cost() {
        let mut s = GameState::new();
        s.credit(ResourceKind::Gold, BigNum::from(499u32));
        assert!(!convert().apply(&mut s));
        assert_eq!(s.balance(ResourceKind::Gold), BigNum::from(499u32));
        s.credit(ResourceKind::Gold, BigNum::ONE);
        assert!(convert().apply(&mut s));
        assert_eq!(s.balance(ResourceKind::Gold), BigNum::ZERO);
        assert_eq!(s.balance(ResourceKind::Technique), BigNum::ONE);
    }

    #[test]
    fn grant_always_applies() {
        let mut s = GameState::new();
        let grant = AutomationEffect::Grant {
            to: ResourceKind::Prestige,
            amount: BigNum::from(3u32),
        };
        assert!(grant.apply(&mut s));
        assert_eq!(grant.output(), (ResourceKind::Prestige, BigNum::from(3u32)));
        assert_eq!(s.balance(ResourceKind::Prestige), BigNum::from(3u32));
    }

    #[test]
    fn registry_rejects_bad_definitions() {
        let mut def = AutomationRegistry::standard().defs[0].clone();
        def.interval_ms = 0;
        assert_eq!(
            AutomationRegistry::new(vec![def.clone()]).unwrap_err(),
            ValidationError::ZeroInterval("refine_technique".into())
        );
        def.interval_ms = 1000;
        assert!(matches!(
            AutomationRegistry::new(vec![def.clone(), def]),
            Err(ValidationError::DuplicateId(_))
        ));
    }

    #[test]
    fn standard_registry_lookup() {
        let reg = AutomationRegistry::standard();
        AutomationRegistry::new(reg.iter().cloned().collect()).unwrap();
        let def = reg.get(&AutomationId::from("refine_technique")).unwrap();
        assert_eq!(def.interval_ms, 60_000);
        assert!(reg.get(&AutomationId::from("nope")).is_none());
    }
}
