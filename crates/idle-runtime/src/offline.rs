//! Catch-up for the time between sessions.

use std::collections::BTreeMap;

use idle_core::{BigNum, GameRules, OfflineConfig, ResourceKind, StateStore};
use idle_econ::format_duration;
use serde::Serialize;
use tracing::{debug, info};

use crate::automation::{apply_offline_triggers, OfflineTriggerReport};
use crate::rates::RateSnapshot;

/// One-shot result of an absence, for a welcome-back flow.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OfflineProgress {
    pub was_calculated: bool,
    pub should_show_modal: bool,
    /// Whole seconds away, for display.
    pub total_seconds_away: u64,
    /// Whole seconds credited after the cap, for display.
    pub effective_seconds: u64,
    /// Exact absence in ms.
    pub total_ms: u64,
    /// Exact credited window in ms, capped.
    pub effective_ms: u64,
    pub was_capped: bool,
    pub formatted_duration: String,
    pub earnings: BTreeMap<ResourceKind, BigNum>,
    pub efficiency: BigNum,
}

impl OfflineProgress {
    /// The no-op result.
    pub fn none(efficiency: BigNum) -> Self {
        Self {
            was_calculated: false,
            should_show_modal: false,
            total_seconds_away: 0,
            effective_seconds: 0,
            total_ms: 0,
            effective_ms: 0,
            was_capped: false,
            formatted_duration: format_duration(0),
            earnings: BTreeMap::new(),
            efficiency,
        }
    }

    pub fn earned(&self, kind: ResourceKind) -> BigNum {
        self.earnings.get(&kind).copied().unwrap_or_default()
    }
}

/// Earnings for the absence between `last_played_ms` and `now_ms` at
/// `rate` units of the primary resource per second.
pub fn calculate_offline_progress(
    last_played_ms: i64,
    now_ms: i64,
    config: &OfflineConfig,
    rate: BigNum,
) -> OfflineProgress {
    let elapsed_ms = now_ms.saturating_sub(last_played_ms);
    if !config.enabled || last_played_ms == 0 || elapsed_ms < 1000 {
        return OfflineProgress::none(config.efficiency);
    }
    let total_ms = elapsed_ms as u64;
    let cap_ms = config.max_offline_seconds.saturating_mul(1000);
    let was_capped = total_ms > cap_ms;
    let effective_ms = total_ms.min(cap_ms);
    let seconds = BigNum::from(effective_ms) * BigNum::pow10(-3);
    let earned = (rate * seconds * config.efficiency).max(BigNum::ZERO);
    let total = total_ms / 1000;
    let mut earnings = BTreeMap::new();
    earnings.insert(ResourceKind::PRIMARY, earned);
    OfflineProgress {
        was_calculated: true,
        should_show_modal: total_ms >= config.modal_threshold_seconds.saturating_mul(1000),
        total_seconds_away: total,
        effective_seconds: effective_ms / 1000,
        total_ms,
        effective_ms,
        was_capped,
        formatted_duration: format_duration(total),
        earnings,
        efficiency: config.efficiency,
    }
}

/// Credit a calculated result and record the absence. Must be called at
/// most once per result; a non-calculated result changes nothing.
pub fn apply_offline_progress<S: StateStore + ?Sized>(store: &mut S, progress: &OfflineProgress) {
    if !progress.was_calculated {
        return;
    }
    for (kind, amount) in &progress.earnings {
        store.credit(*kind, *amount);
    }
    store.add_offline_ms(progress.total_ms);
    store.record_offline_session();
    info!(
        away = %progress.formatted_duration,
        capped = progress.was_capped,
        "offline progress applied"
    );
}

/// Everything computed when a session resumes.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResumeReport {
    pub rates: RateSnapshot,
    /// Not yet applied; see [`apply_offline_progress`].
    pub progress: OfflineProgress,
    /// Already applied to the store.
    pub automations: OfflineTriggerReport,
}

/// Compute offline earnings at the current rate and catch automations up.
///
/// Automation triggers are applied immediately; primary-resource earnings are
/// returned for the caller to apply once acknowledged.
pub fn resume_session<S: StateStore + ?Sized>(
    store: &mut S,
    rules: &GameRules,
    now_ms: i64,
) -> ResumeReport {
    let rates = RateSnapshot::capture(&*store, rules);
    let progress = calculate_offline_progress(
        store.last_played_ms(),
        now_ms,
        &rules.config.offline,
        rates.primary(),
    );
    let automations = apply_offline_triggers(store, rules, progress.effective_ms, now_ms);
    debug!(
        calculated = progress.was_calculated,
        seconds = progress.total_seconds_away,
        "session resumed"
    );
    ResumeReport {
        rates,
        progress,
        automations,
    }
}
