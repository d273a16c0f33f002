#![deny(warnings)]

//! Time-driven progression: generation rates, the automation scheduler,
//! offline catch-up on resume, and the per-frame tick engine.
//!
//! Every entry point takes the state store by reference for the duration of
//! the call. The only state held between calls is the engine's cached rates.

pub mod automation;
pub mod engine;
pub mod offline;
pub mod rates;

pub use automation::{
    apply_offline_triggers, evaluate, offline_trigger_count, set_enabled, state_of,
    AutomationState, OfflineTriggerEntry, OfflineTriggerReport, Trigger,
};
pub use engine::{
    Clock, EngineState, FrameHost, FrameReport, FrameRequest, HeadlessHost, ManualClock,
    SystemClock, TickEngine,
};
pub use offline::{
    apply_offline_progress, calculate_offline_progress, resume_session, OfflineProgress,
    ResumeReport,
};
pub use rates::{
    automation_rates, base_rate, final_rate, has_active_generation, multiplier, RateSnapshot,
};
