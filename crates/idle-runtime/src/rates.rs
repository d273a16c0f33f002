//! Continuous generation rates derived from minigame scores and upgrades.

use std::collections::BTreeMap;

use idle_core::{BigNum, GameRules, ResourceKind, StateStore, UpgradeKey};
use idle_econ::{format_rate_big, DEFAULT_PRECISION};
use serde::Serialize;
use tracing::warn;

/// `Σ top scores / divisor` over every minigame feeding `resource`.
pub fn base_rate<S: StateStore + ?Sized>(store: &S, rules: &GameRules, resource: ResourceKind) -> BigNum {
    let generation = &rules.config.generation;
    let Some(sources) = generation.sources.get(&resource) else {
        return BigNum::ZERO;
    };
    let total: BigNum = sources
        .iter()
        .flat_map(|game| store.top_scores(*game).iter())
        .sum();
    total
        .checked_div(generation.score_to_rate_divisor)
        .unwrap_or(BigNum::ZERO)
}

/// Effect of the resource's designated multiplier upgrade, `1` when none.
pub fn multiplier<S: StateStore + ?Sized>(store: &S, rules: &GameRules, resource: ResourceKind) -> BigNum {
    let Some(id) = rules.config.generation.multipliers.get(&resource) else {
        return BigNum::ONE;
    };
    match rules.upgrades.effect(store, &UpgradeKey::global(id.clone())) {
        Ok(v) => v,
        Err(e) => {
            warn!(resource = %resource, error = %e, "multiplier upgrade unavailable");
            BigNum::ONE
        }
    }
}

pub fn final_rate<S: StateStore + ?Sized>(store: &S, rules: &GameRules, resource: ResourceKind) -> BigNum {
    base_rate(store, rules, resource) * multiplier(store, rules, resource)
}

/// Average per-second output of unlocked, enabled automations. Display only;
/// crediting happens per trigger.
pub fn automation_rates<S: StateStore + ?Sized>(
    store: &S,
    rules: &GameRules,
) -> BTreeMap<ResourceKind, BigNum> {
    let mut out: BTreeMap<ResourceKind, BigNum> = BTreeMap::new();
    for def in rules.automations.iter() {
        let active = match store.automation(&def.id) {
            Some(runtime) => runtime.enabled,
            // gate owned but not yet evaluated: it will start enabled
            None => rules.is_owned(store, &def.gate),
        };
        if !active {
            continue;
        }
        let (resource, amount) = def.effect.output();
        let per_second = (amount * BigNum::from(1000u32))
            .checked_div(BigNum::from(def.interval_ms))
            .unwrap_or(BigNum::ZERO);
        *out.entry(resource).or_default() += per_second;
    }
    out
}

pub fn has_active_generation<S: StateStore + ?Sized>(store: &S, rules: &GameRules) -> bool {
    final_rate(store, rules, ResourceKind::PRIMARY).is_positive()
}

/// Rates at one moment, raw and formatted.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RateSnapshot {
    /// Continuous generation, per configured resource.
    pub rates: BTreeMap<ResourceKind, BigNum>,
    /// Average automation output, per resource.
    pub automation: BTreeMap<ResourceKind, BigNum>,
    pub formatted: BTreeMap<ResourceKind, String>,
    pub formatted_automation: BTreeMap<ResourceKind, String>,
}

impl RateSnapshot {
    pub fn capture<S: StateStore + ?Sized>(store: &S, rules: &GameRules) -> Self {
        let rates: BTreeMap<ResourceKind, BigNum> = rules
            .config
            .generation
            .sources
            .keys()
            .map(|kind| (*kind, final_rate(store, rules, *kind)))
            .collect();
        let automation = automation_rates(store, rules);
        let fmt = |m: &BTreeMap<ResourceKind, BigNum>| {
            m.iter()
                .map(|(k, v)| (*k, format_rate_big(v, DEFAULT_PRECISION)))
                .collect()
        };
        Self {
            formatted: fmt(&rates),
            formatted_automation: fmt(&automation),
            rates,
            automation,
        }
    }

    /// Continuous rate for a resource; zero when it has no sources.
    pub fn rate(&self, kind: ResourceKind) -> BigNum {
        self.rates.get(&kind).copied().unwrap_or_default()
    }

    pub fn primary(&self) -> BigNum {
        self.rate(ResourceKind::PRIMARY)
    }
}
