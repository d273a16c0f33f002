//! Upgrade definitions and the cost/effect model over a state snapshot.

use std::collections::BTreeSet;
use std::fmt;

use idle_econ::{calculate_upgrade_cost, format_big, format_percent_big, DEFAULT_PRECISION};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{AutomationId, BigNum, MinigameId, ResourceKind, StateStore, ValidationError};

/// Stable identifier of an upgrade, e.g. "gold_multiplier".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpgradeId(pub String);

impl From<&str> for UpgradeId {
    fn from(s: &str) -> Self {
        UpgradeId(s.to_string())
    }
}

impl fmt::Display for UpgradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An upgrade address: per-subject upgrades need the minigame they apply to.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UpgradeKey {
    pub id: UpgradeId,
    pub subject: Option<MinigameId>,
}

impl UpgradeKey {
    pub fn global(id: impl Into<UpgradeId>) -> Self {
        Self {
            id: id.into(),
            subject: None,
        }
    }

    pub fn scoped(id: impl Into<UpgradeId>, subject: MinigameId) -> Self {
        Self {
            id: id.into(),
            subject: Some(subject),
        }
    }
}

impl From<UpgradeId> for UpgradeKey {
    fn from(id: UpgradeId) -> Self {
        UpgradeKey::global(id)
    }
}

/// An amount of one resource.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    pub resource: ResourceKind,
    pub amount: BigNum,
}

impl Cost {
    pub fn new(resource: ResourceKind, amount: BigNum) -> Self {
        Self { resource, amount }
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", format_big(&self.amount, DEFAULT_PRECISION), self.resource)
    }
}

/// What a leveled or one-time upgrade's effect value means.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    /// Multiplies the continuous generation of a resource.
    GenerationMultiplier(ResourceKind),
    /// Fractional score bonus inside one minigame.
    ScoreBonus,
    /// Unlocks a feature; effect is 1 when owned.
    Feature,
}

/// Category-specific cost and effect parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum UpgradeKind {
    /// Cost `base × growth^level`, effect `base + per_level × level`.
    Leveled {
        cost_resource: ResourceKind,
        base_cost: BigNum,
        growth: BigNum,
        /// 0 means unlimited.
        max_level: u32,
        effect: EffectType,
        base_effect: BigNum,
        effect_per_level: BigNum,
    },
    /// Bought once for a constant cost.
    OneTime { cost: Cost, effect: EffectType },
    /// Repeatable purchase that credits `grant` immediately.
    FlatGrant {
        cost_resource: ResourceKind,
        base_cost: BigNum,
        /// `1` keeps the cost constant.
        growth: BigNum,
        max_level: u32,
        grant: Cost,
    },
    /// Bought once for two simultaneous costs; unlocks an automation.
    DualUnlock {
        primary: Cost,
        secondary: Cost,
        unlocks: AutomationId,
    },
    /// Leveled independently per minigame; cost `base + increment × level`.
    PerSubject {
        cost_resource: ResourceKind,
        base_cost: BigNum,
        cost_increment: BigNum,
        max_level: u32,
        effect: EffectType,
        base_effect: BigNum,
        effect_per_level: BigNum,
    },
}

impl UpgradeKind {
    /// Level cap; 0 means unlimited. One-time categories cap at 1.
    pub fn max_level(&self) -> u32 {
        match self {
            UpgradeKind::Leveled { max_level, .. }
            | UpgradeKind::FlatGrant { max_level, .. }
            | UpgradeKind::PerSubject { max_level, .. } => *max_level,
            UpgradeKind::OneTime { .. } | UpgradeKind::DualUnlock { .. } => 1,
        }
    }

    pub fn is_per_subject(&self) -> bool {
        matches!(self, UpgradeKind::PerSubject { .. })
    }
}

/// A static upgrade definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpgradeDef {
    pub id: UpgradeId,
    pub name: String,
    pub description: String,
    pub kind: UpgradeKind,
}

/// Cost of the next level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UpgradeCost {
    pub primary: Cost,
    pub secondary: Option<Cost>,
}

/// Purchase and lookup failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UpgradeError {
    /// Unknown id, or a subject given for a global upgrade (or missing for a
    /// per-subject one).
    #[error("upgrade not found: {0}")]
    NotFound(String),
    #[error("upgrade already at max level: {0}")]
    AlreadyMaxed(String),
    #[error("not enough {0}")]
    InsufficientFunds(ResourceKind),
}

/// Everything a purchase UI needs for one upgrade.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UpgradeInfo {
    pub id: UpgradeId,
    pub subject: Option<MinigameId>,
    pub name: String,
    pub description: String,
    pub level: u32,
    pub max_level: u32,
    pub cost: String,
    pub secondary_cost: Option<String>,
    pub effect: String,
    pub affordable: bool,
    pub maxed: bool,
}

/// Validated set of upgrade definitions.
#[derive(Clone, Debug)]
pub struct UpgradeRegistry {
    defs: Vec<UpgradeDef>,
}

impl UpgradeRegistry {
    pub fn new(defs: Vec<UpgradeDef>) -> Result<Self, ValidationError> {
        let mut seen = BTreeSet::new();
        for def in &defs {
            if !seen.insert(def.id.clone()) {
                return Err(ValidationError::DuplicateId(def.id.0.clone()));
            }
            validate_def(def)?;
        }
        Ok(Self { defs })
    }

    /// The shipped upgrade set.
    pub fn standard() -> Self {
        Self {
            defs: standard_defs(),
        }
    }

    pub fn get(&self, id: &UpgradeId) -> Option<&UpgradeDef> {
        self.defs.iter().find(|d| &d.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UpgradeDef> {
        self.defs.iter()
    }

    /// Resolve a key, checking that its subject matches the category.
    pub fn lookup(&self, key: &UpgradeKey) -> Result<&UpgradeDef, UpgradeError> {
        let def = self
            .get(&key.id)
            .ok_or_else(|| UpgradeError::NotFound(key.id.0.clone()))?;
        if def.kind.is_per_subject() != key.subject.is_some() {
            return Err(UpgradeError::NotFound(key.id.0.clone()));
        }
        Ok(def)
    }

    /// Stored level, or the owned flag as 0/1.
    pub fn level<S: StateStore + ?Sized>(
        &self,
        store: &S,
        key: &UpgradeKey,
    ) -> Result<u32, UpgradeError> {
        let def = self.lookup(key)?;
        Ok(stored_level(store, def, key.subject))
    }

    pub fn is_maxed<S: StateStore + ?Sized>(
        &self,
        store: &S,
        key: &UpgradeKey,
    ) -> Result<bool, UpgradeError> {
        let def = self.lookup(key)?;
        Ok(maxed(def, stored_level(store, def, key.subject)))
    }

    /// Cost of the next level at the currently stored level.
    pub fn next_cost<S: StateStore + ?Sized>(
        &self,
        store: &S,
        key: &UpgradeKey,
    ) -> Result<UpgradeCost, UpgradeError> {
        let def = self.lookup(key)?;
        Ok(cost_at(def, stored_level(store, def, key.subject)))
    }

    pub fn can_afford<S: StateStore + ?Sized>(
        &self,
        store: &S,
        key: &UpgradeKey,
    ) -> Result<bool, UpgradeError> {
        let def = self.lookup(key)?;
        let level = stored_level(store, def, key.subject);
        if maxed(def, level) {
            return Ok(false);
        }
        Ok(covers(store, &cost_at(def, level)))
    }

    /// Current effect value.
    pub fn effect<S: StateStore + ?Sized>(
        &self,
        store: &S,
        key: &UpgradeKey,
    ) -> Result<BigNum, UpgradeError> {
        let def = self.lookup(key)?;
        Ok(effect_at(def, stored_level(store, def, key.subject)))
    }

    /// Buy one level. Debits are all or nothing: when the secondary cost of a
    /// dual-currency upgrade cannot be paid the primary debit is refunded.
    pub fn purchase<S: StateStore + ?Sized>(
        &self,
        store: &mut S,
        key: &UpgradeKey,
    ) -> Result<(), UpgradeError> {
        let def = self.lookup(key)?;
        let level = stored_level(store, def, key.subject);
        if maxed(def, level) {
            return Err(UpgradeError::AlreadyMaxed(def.id.0.clone()));
        }
        let cost = cost_at(def, level);
        if !store.debit(cost.primary.resource, cost.primary.amount) {
            return Err(UpgradeError::InsufficientFunds(cost.primary.resource));
        }
        if let Some(secondary) = cost.secondary {
            if !store.debit(secondary.resource, secondary.amount) {
                store.refund(cost.primary.resource, cost.primary.amount);
                return Err(UpgradeError::InsufficientFunds(secondary.resource));
            }
        }
        match (&def.kind, key.subject) {
            (UpgradeKind::Leveled { .. }, _) => store.set_upgrade_level(&def.id, level + 1),
            (UpgradeKind::FlatGrant { grant, .. }, _) => {
                store.set_upgrade_level(&def.id, level + 1);
                store.credit(grant.resource, grant.amount);
            }
            (UpgradeKind::OneTime { .. } | UpgradeKind::DualUnlock { .. }, _) => {
                store.set_upgrade_flag(&def.id, true)
            }
            (UpgradeKind::PerSubject { .. }, Some(subject)) => {
                store.set_subject_level(&def.id, subject, level + 1)
            }
            // lookup() rejects per-subject keys without a subject
            (UpgradeKind::PerSubject { .. }, None) => {
                return Err(UpgradeError::NotFound(def.id.0.clone()))
            }
        }
        debug!(upgrade = %def.id, subject = ?key.subject, level = level + 1, "purchased upgrade");
        Ok(())
    }

    /// Fail-soft purchase for UI callers.
    pub fn try_purchase<S: StateStore + ?Sized>(&self, store: &mut S, key: &UpgradeKey) -> bool {
        match self.purchase(store, key) {
            Ok(()) => true,
            Err(UpgradeError::NotFound(id)) => {
                warn!(upgrade = %id, "purchase of unknown upgrade ignored");
                false
            }
            Err(e) => {
                debug!(upgrade = %key.id, reason = %e, "purchase declined");
                false
            }
        }
    }

    /// Display data for a purchase UI; `None` for unknown keys.
    pub fn display_info<S: StateStore + ?Sized>(
        &self,
        store: &S,
        key: &UpgradeKey,
    ) -> Option<UpgradeInfo> {
        let def = match self.lookup(key) {
            Ok(def) => def,
            Err(e) => {
                warn!(upgrade = %key.id, error = %e, "display info requested for unknown upgrade");
                return None;
            }
        };
        let level = stored_level(store, def, key.subject);
        let is_maxed = maxed(def, level);
        let cost = cost_at(def, level);
        Some(UpgradeInfo {
            id: def.id.clone(),
            subject: key.subject,
            name: def.name.clone(),
            description: def.description.clone(),
            level,
            max_level: def.kind.max_level(),
            cost: cost.primary.to_string(),
            secondary_cost: cost.secondary.map(|c| c.to_string()),
            effect: describe_effect(def, effect_at(def, level)),
            affordable: !is_maxed && covers(store, &cost),
            maxed: is_maxed,
        })
    }
}

fn stored_level<S: StateStore + ?Sized>(
    store: &S,
    def: &UpgradeDef,
    subject: Option<MinigameId>,
) -> u32 {
    match &def.kind {
        UpgradeKind::Leveled { .. } | UpgradeKind::FlatGrant { .. } => store.upgrade_level(&def.id),
        UpgradeKind::OneTime { .. } | UpgradeKind::DualUnlock { .. } => {
            u32::from(store.upgrade_flag(&def.id))
        }
        UpgradeKind::PerSubject { .. } => subject
            .map(|s| store.subject_level(&def.id, s))
            .unwrap_or(0),
    }
}

fn maxed(def: &UpgradeDef, level: u32) -> bool {
    let max = def.kind.max_level();
    max != 0 && level >= max
}

fn cost_at(def: &UpgradeDef, level: u32) -> UpgradeCost {
    let single = |resource, amount| UpgradeCost {
        primary: Cost::new(resource, amount),
        secondary: None,
    };
    match &def.kind {
        UpgradeKind::Leveled {
            cost_resource,
            base_cost,
            growth,
            ..
        }
        | UpgradeKind::FlatGrant {
            cost_resource,
            base_cost,
            growth,
            ..
        } => single(*cost_resource, calculate_upgrade_cost(base_cost, growth, level)),
        UpgradeKind::OneTime { cost, .. } => single(cost.resource, cost.amount),
        UpgradeKind::DualUnlock {
            primary, secondary, ..
        } => UpgradeCost {
            primary: *primary,
            secondary: Some(*secondary),
        },
        UpgradeKind::PerSubject {
            cost_resource,
            base_cost,
            cost_increment,
            ..
        } => single(
            *cost_resource,
            *base_cost + *cost_increment * BigNum::from(level),
        ),
    }
}

fn effect_at(def: &UpgradeDef, level: u32) -> BigNum {
    match &def.kind {
        UpgradeKind::Leveled {
            base_effect,
            effect_per_level,
            ..
        }
        | UpgradeKind::PerSubject {
            base_effect,
            effect_per_level,
            ..
        } => *base_effect + *effect_per_level * BigNum::from(level),
        UpgradeKind::FlatGrant { grant, .. } => grant.amount,
        UpgradeKind::OneTime { .. } | UpgradeKind::DualUnlock { .. } => BigNum::from(level.min(1)),
    }
}

fn covers<S: StateStore + ?Sized>(store: &S, cost: &UpgradeCost) -> bool {
    let ok = |c: &Cost| store.balance(c.resource) >= c.amount;
    ok(&cost.primary) && cost.secondary.as_ref().map_or(true, ok)
}

fn describe_effect(def: &UpgradeDef, value: BigNum) -> String {
    let owned = |v: BigNum| (if v.is_zero() { "Locked" } else { "Owned" }).to_string();
    match &def.kind {
        UpgradeKind::Leveled { effect, .. }
        | UpgradeKind::PerSubject { effect, .. }
        | UpgradeKind::OneTime { effect, .. } => match effect {
            EffectType::GenerationMultiplier(_) => {
                format!("x{}", format_big(&value, DEFAULT_PRECISION))
            }
            EffectType::ScoreBonus => format!("+{}", format_percent_big(&value, DEFAULT_PRECISION)),
            EffectType::Feature => owned(value),
        },
        UpgradeKind::FlatGrant { grant, .. } => format!("+{grant}"),
        UpgradeKind::DualUnlock { unlocks, .. } => format!("{} ({unlocks})", owned(value)),
    }
}

fn validate_def(def: &UpgradeDef) -> Result<(), ValidationError> {
    let id = || def.id.0.clone();
    let positive = |v: &BigNum| {
        if v.is_positive() {
            Ok(())
        } else {
            Err(ValidationError::NonPositiveAmount(id()))
        }
    };
    match &def.kind {
        UpgradeKind::Leveled {
            base_cost, growth, ..
        } => {
            positive(base_cost)?;
            if !growth.is_positive() {
                return Err(ValidationError::InvalidGrowth(id()));
            }
        }
        UpgradeKind::FlatGrant {
            base_cost,
            growth,
            grant,
            ..
        } => {
            positive(base_cost)?;
            positive(&grant.amount)?;
            if !growth.is_positive() {
                return Err(ValidationError::InvalidGrowth(id()));
            }
        }
        UpgradeKind::OneTime { cost, .. } => positive(&cost.amount)?,
        UpgradeKind::DualUnlock {
            primary, secondary, ..
        } => {
            positive(&primary.amount)?;
            positive(&secondary.amount)?;
        }
        UpgradeKind::PerSubject {
            base_cost,
            cost_increment,
            ..
        } => {
            positive(base_cost)?;
            if cost_increment.is_negative() {
                return Err(ValidationError::NonPositiveAmount(id()));
            }
        }
    }
    Ok(())
}

fn num(s: &str) -> BigNum {
    s.parse().unwrap_or_default()
}

fn standard_defs() -> Vec<UpgradeDef> {
    use ResourceKind::*;
    vec![
        UpgradeDef {
            id: UpgradeId::from("gold_multiplier"),
            name: "Golden Touch".into(),
            description: "Multiplies passive Gold generation.".into(),
            kind: UpgradeKind::Leveled {
                cost_resource: Gold,
                base_cost: num("100"),
                growth: num("1.15"),
                max_level: 0,
                effect: EffectType::GenerationMultiplier(Gold),
                base_effect: num("1"),
                effect_per_level: num("0.25"),
            },
        },
        UpgradeDef {
            id: UpgradeId::from("focus_training"),
            name: "Focus Training".into(),
            description: "Unlocks focus mode in every minigame.".into(),
            kind: UpgradeKind::OneTime {
                cost: Cost::new(Technique, num("50")),
                effect: EffectType::Feature,
            },
        },
        UpgradeDef {
            id: UpgradeId::from("technique_pack"),
            name: "Technique Manual".into(),
            description: "Trade Gold for Technique right away.".into(),
            kind: UpgradeKind::FlatGrant {
                cost_resource: Gold,
                base_cost: num("1000"),
                growth: num("1"),
                max_level: 0,
                grant: Cost::new(Technique, num("10")),
            },
        },
        UpgradeDef {
            id: UpgradeId::from("technique_refinery"),
            name: "Refinery".into(),
            description: "Automatically refines Gold into Technique every minute.".into(),
            kind: UpgradeKind::DualUnlock {
                primary: Cost::new(Gold, num("5000")),
                secondary: Cost::new(Technique, num("25")),
                unlocks: AutomationId::from("refine_technique"),
            },
        },
        UpgradeDef {
            id: UpgradeId::from("prestige_press"),
            name: "Prestige Press".into(),
            description: "Condenses Technique into Prestige every five minutes.".into(),
            kind: UpgradeKind::DualUnlock {
                primary: Cost::new(Gold, num("1e6")),
                secondary: Cost::new(Technique, num("500")),
                unlocks: AutomationId::from("condense_prestige"),
            },
        },
        UpgradeDef {
            id: UpgradeId::from("practice"),
            name: "Practice".into(),
            description: "Raises scores in one minigame.".into(),
            kind: UpgradeKind::PerSubject {
                cost_resource: Technique,
                base_cost: num("5"),
                cost_increment: num("5"),
                max_level: 10,
                effect: EffectType::ScoreBonus,
                base_effect: BigNum::ZERO,
                effect_per_level: num("0.1"),
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameState;

    fn big(s: &str) -> BigNum {
        s.parse().unwrap()
    }

    fn key(id: &str) -> UpgradeKey {
        UpgradeKey::global(id)
    }

    #[test]
    fn standard_registry_validates() {
        UpgradeRegistry::new(standard_defs()).unwrap();
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut defs = standard_defs();
        defs.push(defs[0].clone());
        assert_eq!(
            UpgradeRegistry::new(defs).unwrap_err(),
            ValidationError::DuplicateId("gold_multiplier".into())
        );
    }

    #[test]
    fn leveled_cost_grows_exponentially() {
        let reg = UpgradeRegistry::standard();
        let mut s = GameState::new();
        let k = key("gold_multiplier");
        assert_eq!(reg.next_cost(&s, &k).unwrap().primary.amount, big("100"));
        s.set_upgrade_level(&UpgradeId::from("gold_multiplier"), 1);
        assert_eq!(reg.next_cost(&s, &k).unwrap().primary.amount, big("115"));
        // repeated queries without a purchase agree
        assert_eq!(reg.next_cost(&s, &k).unwrap(), reg.next_cost(&s, &k).unwrap());
    }

    #[test]
    fn purchase_debits_exact_cost_and_levels_once() {
        let reg = UpgradeRegistry::standard();
        let mut s = GameState::new();
        s.credit(ResourceKind::Gold, big("250"));
        let k = key("gold_multiplier");
        reg.purchase(&mut s, &k).unwrap();
        assert_eq!(s.balance(ResourceKind::Gold), big("150"));
        assert_eq!(reg.level(&s, &k).unwrap(), 1);
        assert_eq!(reg.effect(&s, &k).unwrap(), big("1.25"));
        // next level costs 115, balance is 150
        reg.purchase(&mut s, &k).unwrap();
        assert_eq!(s.balance(ResourceKind::Gold), big("35"));
        assert_eq!(
            reg.purchase(&mut s, &k),
            Err(UpgradeError::InsufficientFunds(ResourceKind::Gold))
        );
        assert_eq!(s.balance(ResourceKind::Gold), big("35"));
        assert_eq!(reg.level(&s, &k).unwrap(), 2);
    }

    #[test]
    fn one_time_upgrade_maxes_after_purchase() {
        let reg = UpgradeRegistry::standard();
        let mut s = GameState::new();
        s.credit(ResourceKind::Technique, big("120"));
        let k = key("focus_training");
        assert_eq!(reg.effect(&s, &k).unwrap(), BigNum::ZERO);
        reg.purchase(&mut s, &k).unwrap();
        assert!(reg.is_maxed(&s, &k).unwrap());
        assert_eq!(reg.effect(&s, &k).unwrap(), BigNum::ONE);
        assert!(!reg.can_afford(&s, &k).unwrap());
        assert_eq!(
            reg.purchase(&mut s, &k),
            Err(UpgradeError::AlreadyMaxed("focus_training".into()))
        );
        assert_eq!(s.balance(ResourceKind::Technique), big("70"));
    }

    #[test]
    fn flat_grant_credits_in_same_purchase() {
        let reg = UpgradeRegistry::standard();
        let mut s = GameState::new();
        s.credit(ResourceKind::Gold, big("2500"));
        let k = key("technique_pack");
        assert!(reg.try_purchase(&mut s, &k));
        assert!(reg.try_purchase(&mut s, &k));
        assert!(!reg.try_purchase(&mut s, &k));
        assert_eq!(s.balance(ResourceKind::Gold), big("500"));
        assert_eq!(s.balance(ResourceKind::Technique), big("20"));
        assert_eq!(reg.next_cost(&s, &k).unwrap().primary.amount, big("1000"));
    }

    #[test]
    fn dual_unlock_refunds_primary_when_secondary_is_short() {
        let reg = UpgradeRegistry::standard();
        let mut s = GameState::new();
        s.credit(ResourceKind::Gold, big("6000"));
        s.credit(ResourceKind::Technique, big("10"));
        let before = s.clone();
        let k = key("technique_refinery");
        assert!(!reg.can_afford(&s, &k).unwrap());
        assert_eq!(
            reg.purchase(&mut s, &k),
            Err(UpgradeError::InsufficientFunds(ResourceKind::Technique))
        );
        assert_eq!(s, before);

        s.credit(ResourceKind::Technique, big("15"));
        assert!(reg.can_afford(&s, &k).unwrap());
        reg.purchase(&mut s, &k).unwrap();
        assert_eq!(s.balance(ResourceKind::Gold), big("1000"));
        assert_eq!(s.balance(ResourceKind::Technique), BigNum::ZERO);
        assert!(s.upgrade_flag(&UpgradeId::from("technique_refinery")));
    }

    #[test]
    fn per_subject_levels_are_independent() {
        let reg = UpgradeRegistry::standard();
        let mut s = GameState::new();
        s.credit(ResourceKind::Technique, big("100"));
        let runner = UpgradeKey::scoped("practice", MinigameId::Runner);
        let rhythm = UpgradeKey::scoped("practice", MinigameId::Rhythm);
        reg.purchase(&mut s, &runner).unwrap();
        reg.purchase(&mut s, &runner).unwrap();
        assert_eq!(reg.level(&s, &runner).unwrap(), 2);
        assert_eq!(reg.level(&s, &rhythm).unwrap(), 0);
        // 5 + 10 spent, next is 5 + 5 × 2
        assert_eq!(s.balance(ResourceKind::Technique), big("85"));
        assert_eq!(reg.next_cost(&s, &runner).unwrap().primary.amount, big("15"));
        assert_eq!(reg.effect(&s, &runner).unwrap(), big("0.2"));
    }

    #[test]
    fn per_subject_cap_applies() {
        let reg = UpgradeRegistry::standard();
        let mut s = GameState::new();
        s.set_subject_level(&UpgradeId::from("practice"), MinigameId::Stacker, 10);
        s.credit(ResourceKind::Technique, big("1e9"));
        let k = UpgradeKey::scoped("practice", MinigameId::Stacker);
        assert!(reg.is_maxed(&s, &k).unwrap());
        assert!(matches!(reg.purchase(&mut s, &k), Err(UpgradeError::AlreadyMaxed(_))));
    }

    #[test]
    fn unknown_or_mis_scoped_keys_are_not_found() {
        let reg = UpgradeRegistry::standard();
        let mut s = GameState::new();
        assert!(matches!(reg.level(&s, &key("nope")), Err(UpgradeError::NotFound(_))));
        assert!(matches!(reg.level(&s, &key("practice")), Err(UpgradeError::NotFound(_))));
        let scoped = UpgradeKey::scoped("gold_multiplier", MinigameId::Runner);
        assert!(matches!(reg.effect(&s, &scoped), Err(UpgradeError::NotFound(_))));
        assert!(!reg.try_purchase(&mut s, &key("nope")));
        assert!(reg.display_info(&s, &key("nope")).is_none());
    }

    #[test]
    fn display_info_formats_costs_and_effects() {
        let reg = UpgradeRegistry::standard();
        let mut s = GameState::new();
        s.credit(ResourceKind::Gold, big("1500"));
        let info = reg.display_info(&s, &key("gold_multiplier")).unwrap();
        assert_eq!(info.cost, "100 Gold");
        assert_eq!(info.effect, "x1");
        assert!(info.affordable);
        assert!(!info.maxed);

        let dual = reg.display_info(&s, &key("technique_refinery")).unwrap();
        assert_eq!(dual.cost, "5.00K Gold");
        assert_eq!(dual.secondary_cost.as_deref(), Some("25 Technique"));
        assert_eq!(dual.effect, "Locked (refine_technique)");
        assert!(!dual.affordable);

        let practice = reg
            .display_info(&s, &UpgradeKey::scoped("practice", MinigameId::Runner))
            .unwrap();
        assert_eq!(practice.effect, "+0%");
        assert_eq!(practice.max_level, 10);
    }
}
