//! Periodic automation scheduling, live and offline.

use idle_core::{
    AutomationDef, AutomationError, AutomationId, AutomationRuntime, BigNum, GameRules, StateStore,
};
use serde::Serialize;
use tracing::{debug, info};

/// Lifecycle of one automation at a given instant. `Executing` is the span
/// of the effect call inside [`evaluate`] and is never observed from outside.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutomationState {
    /// Gate never owned; no runtime state.
    Uninitialized,
    /// Toggled off by the player.
    Disabled,
    Idle,
    Due,
}

/// State of `def` at `now_ms`, without mutating anything.
pub fn state_of<S: StateStore + ?Sized>(store: &S, def: &AutomationDef, now_ms: i64) -> AutomationState {
    match store.automation(&def.id) {
        None => AutomationState::Uninitialized,
        Some(rt) if !rt.enabled => AutomationState::Disabled,
        Some(rt) if is_due(&rt, def, now_ms) => AutomationState::Due,
        Some(_) => AutomationState::Idle,
    }
}

fn is_due(rt: &AutomationRuntime, def: &AutomationDef, now_ms: i64) -> bool {
    let elapsed = now_ms.saturating_sub(rt.last_triggered_ms);
    elapsed >= 0 && elapsed as u64 >= def.interval_ms
}

/// One due evaluation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Trigger {
    pub id: AutomationId,
    pub succeeded: bool,
}

/// Evaluate every automation at wall-clock `now_ms`.
///
/// Newly unlocked automations get runtime state and wait one full interval.
/// A due automation runs its effect and its timestamp moves to `now_ms`
/// whether or not the effect could be paid for.
pub fn evaluate<S: StateStore + ?Sized>(store: &mut S, rules: &GameRules, now_ms: i64) -> Vec<Trigger> {
    let mut fired = Vec::new();
    for def in rules.automations.iter() {
        match state_of(&*store, def, now_ms) {
            AutomationState::Uninitialized => {
                if rules.is_owned(&*store, &def.gate) {
                    store.set_automation(
                        &def.id,
                        AutomationRuntime {
                            enabled: true,
                            last_triggered_ms: now_ms,
                        },
                    );
                    info!(automation = %def.id, "automation unlocked");
                }
            }
            AutomationState::Disabled | AutomationState::Idle => {}
            AutomationState::Due => {
                let succeeded = def.effect.apply(store);
                store.set_automation(
                    &def.id,
                    AutomationRuntime {
                        enabled: true,
                        last_triggered_ms: now_ms,
                    },
                );
                debug!(automation = %def.id, succeeded, "automation triggered");
                fired.push(Trigger {
                    id: def.id.clone(),
                    succeeded,
                });
            }
        }
    }
    fired
}

/// Toggle an unlocked automation. The timestamp is kept, so time spent
/// disabled does not bank triggers.
pub fn set_enabled<S: StateStore + ?Sized>(
    store: &mut S,
    rules: &GameRules,
    id: &AutomationId,
    enabled: bool,
) -> Result<(), AutomationError> {
    if rules.automations.get(id).is_none() {
        return Err(AutomationError::NotFound(id.0.clone()));
    }
    let mut runtime = store
        .automation(id)
        .ok_or_else(|| AutomationError::NotFound(id.0.clone()))?;
    runtime.enabled = enabled;
    store.set_automation(id, runtime);
    debug!(automation = %id, enabled, "automation toggled");
    Ok(())
}

/// `floor(offline_ms × efficiency / interval_ms)`.
pub fn offline_trigger_count(offline_ms: u64, efficiency: BigNum, interval_ms: u64) -> u64 {
    if interval_ms == 0 || !efficiency.is_positive() {
        return 0;
    }
    (BigNum::from(offline_ms) * efficiency)
        .checked_div(BigNum::from(interval_ms))
        .map(|n| n.floor().to_f64())
        .filter(|n| n.is_finite() && *n > 0.0)
        .map(|n| n as u64)
        .unwrap_or(0)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OfflineTriggerEntry {
    pub id: AutomationId,
    pub attempted: u64,
    pub succeeded: u64,
}

/// Outcome of catching automations up after an absence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OfflineTriggerReport {
    pub entries: Vec<OfflineTriggerEntry>,
}

impl OfflineTriggerReport {
    pub fn succeeded(&self, id: &AutomationId) -> u64 {
        self.entries
            .iter()
            .find(|e| &e.id == id)
            .map_or(0, |e| e.succeeded)
    }
}

/// Run each enabled automation up to its offline trigger count, stopping at
/// the first failed attempt, then restart every automation's interval at
/// `now_ms`. Partial intervals are not carried over.
pub fn apply_offline_triggers<S: StateStore + ?Sized>(
    store: &mut S,
    rules: &GameRules,
    offline_ms: u64,
    now_ms: i64,
) -> OfflineTriggerReport {
    let offline = &rules.config.offline;
    let mut report = OfflineTriggerReport::default();
    for def in rules.automations.iter() {
        let Some(mut runtime) = store.automation(&def.id) else {
            continue;
        };
        if runtime.enabled && offline.enabled {
            let count = offline_trigger_count(offline_ms, offline.efficiency, def.interval_ms);
            let mut entry = OfflineTriggerEntry {
                id: def.id.clone(),
                attempted: 0,
                succeeded: 0,
            };
            for _ in 0..count {
                entry.attempted += 1;
                if !def.effect.apply(store) {
                    break;
                }
                entry.succeeded += 1;
            }
            if count > 0 {
                debug!(
                    automation = %def.id,
                    potential = count,
                    succeeded = entry.succeeded,
                    "offline automation catch-up"
                );
            }
            report.entries.push(entry);
        }
        runtime.last_triggered_ms = now_ms;
        store.set_automation(&def.id, runtime);
    }
    report
}
