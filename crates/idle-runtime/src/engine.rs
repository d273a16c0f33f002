//! Host-driven tick loop.
//!
//! The host calls [`TickEngine::on_frame`] once per rendered frame with a
//! monotonic frame timestamp. Generation is credited from the frame delta,
//! clamped so a throttled or suspended tab cannot produce a burst, while
//! automations and the session clock use wall time from a [`Clock`].

use std::cell::Cell;
use std::rc::Rc;

use idle_core::{BigNum, GameRules, ResourceKind, StateStore};
use tracing::{debug, info, warn};

use crate::automation::{evaluate, Trigger};
use crate::rates::RateSnapshot;

/// Wall-clock source in epoch milliseconds.
pub trait Clock {
    fn now_ms(&self) -> i64;
}

/// The system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<i64>>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn set(&self, ms: i64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: i64) {
        self.now.set(self.now.get().saturating_add(ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }
}

/// Handle of a pending frame request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRequest(pub u64);

/// The host's frame scheduler.
pub trait FrameHost {
    fn request_frame(&mut self) -> FrameRequest;
    fn cancel_frame(&mut self, request: FrameRequest);
}

/// A host that just counts requests, for headless drivers.
#[derive(Clone, Debug, Default)]
pub struct HeadlessHost {
    next: u64,
    pending: Option<FrameRequest>,
    cancelled: u64,
}

impl HeadlessHost {
    pub fn pending(&self) -> Option<FrameRequest> {
        self.pending
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

impl FrameHost for HeadlessHost {
    fn request_frame(&mut self) -> FrameRequest {
        self.next += 1;
        let request = FrameRequest(self.next);
        self.pending = Some(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending == Some(request) {
            self.pending = None;
            self.cancelled += 1;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
    Destroyed,
}

/// What one frame did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    /// Clamped frame delta in ms.
    pub delta_ms: f64,
    /// Primary-resource generation credited this frame.
    pub credited: BigNum,
    pub triggers: Vec<Trigger>,
    pub rates_refreshed: bool,
}

type RateCallback = Box<dyn FnMut(&RateSnapshot)>;

pub struct TickEngine<C: Clock, H: FrameHost> {
    rules: GameRules,
    clock: C,
    host: H,
    state: EngineState,
    pending: Option<FrameRequest>,
    last_frame_ms: Option<f64>,
    /// Sub-millisecond played time not yet recorded.
    played_carry_ms: f64,
    cached: RateSnapshot,
    last_refresh_ms: i64,
    on_rate_change: Option<RateCallback>,
}

impl<C: Clock, H: FrameHost> TickEngine<C, H> {
    pub fn new(rules: GameRules, clock: C, host: H) -> Self {
        Self {
            rules,
            clock,
            host,
            state: EngineState::Stopped,
            pending: None,
            last_frame_ms: None,
            played_carry_ms: 0.0,
            cached: RateSnapshot::default(),
            last_refresh_ms: 0,
            on_rate_change: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Last computed rates.
    pub fn rates(&self) -> &RateSnapshot {
        &self.cached
    }

    /// Register the display callback, replacing any previous one.
    pub fn on_rate_change(&mut self, callback: impl FnMut(&RateSnapshot) + 'static) {
        self.on_rate_change = Some(Box::new(callback));
    }

    pub fn start<S: StateStore + ?Sized>(&mut self, store: &S) {
        match self.state {
            EngineState::Running => {
                warn!("tick engine already running");
                return;
            }
            EngineState::Destroyed => {
                warn!("tick engine destroyed, not starting");
                return;
            }
            EngineState::Stopped => {}
        }
        self.last_frame_ms = None;
        self.refresh_rates(store);
        self.pending = Some(self.host.request_frame());
        self.state = EngineState::Running;
        info!(rate = %self.cached.primary(), "tick engine started");
    }

    pub fn stop(&mut self) {
        if self.state != EngineState::Running {
            warn!("tick engine already stopped");
            return;
        }
        if let Some(request) = self.pending.take() {
            self.host.cancel_frame(request);
        }
        self.state = EngineState::Stopped;
        info!("tick engine stopped");
    }

    /// Stop and stamp the session so the next resume measures from now.
    pub fn suspend<S: StateStore + ?Sized>(&mut self, store: &mut S) {
        if self.is_running() {
            self.stop();
        }
        store.set_last_played_ms(self.clock.now_ms());
        debug!("tick engine suspended");
    }

    /// Stop and release the display callback; the engine cannot restart.
    pub fn destroy(&mut self) {
        if self.is_running() {
            self.stop();
        }
        self.on_rate_change = None;
        self.state = EngineState::Destroyed;
    }

    /// Recompute the cached rates now and notify the display callback.
    pub fn refresh_rates<S: StateStore + ?Sized>(&mut self, store: &S) {
        self.cached = RateSnapshot::capture(store, &self.rules);
        self.last_refresh_ms = self.clock.now_ms();
        if let Some(callback) = self.on_rate_change.as_mut() {
            callback(&self.cached);
        }
    }

    /// Run one frame. Ignored unless running.
    pub fn on_frame<S: StateStore + ?Sized>(&mut self, store: &mut S, frame_ms: f64) -> FrameReport {
        if !self.is_running() {
            return FrameReport::default();
        }
        self.pending = None;

        let max = self.rules.config.tick.max_frame_delta_ms as f64;
        let delta_ms = match self.last_frame_ms {
            Some(prev) if (frame_ms - prev).is_finite() => (frame_ms - prev).clamp(0.0, max),
            _ => 0.0,
        };
        self.last_frame_ms = Some(frame_ms);

        let mut report = FrameReport {
            delta_ms,
            ..FrameReport::default()
        };

        if delta_ms > 0.0 {
            let seconds = BigNum::try_from(delta_ms / 1000.0).unwrap_or(BigNum::ZERO);
            for (kind, rate) in &self.cached.rates {
                if !rate.is_positive() {
                    continue;
                }
                let gain = *rate * seconds;
                store.credit(*kind, gain);
                if *kind == ResourceKind::PRIMARY {
                    report.credited = gain;
                }
            }
        }

        let now = self.clock.now_ms();
        report.triggers = evaluate(store, &self.rules, now);

        self.played_carry_ms += delta_ms;
        let whole = self.played_carry_ms.floor();
        if whole >= 1.0 {
            store.add_played_ms(whole as u64);
            self.played_carry_ms -= whole;
        }
        store.set_last_played_ms(now);

        let refresh = self.rules.config.tick.rate_refresh_ms as i64;
        if now.saturating_sub(self.last_refresh_ms) >= refresh {
            self.refresh_rates(&*store);
            report.rates_refreshed = true;
        }

        self.pending = Some(self.host.request_frame());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idle_core::{AutomationId, GameState, MinigameId, ResourceKind, UpgradeId};
    use std::cell::RefCell;

    const T: i64 = 1_700_000_000_000;

    fn setup() -> (TickEngine<ManualClock, HeadlessHost>, GameState, ManualClock) {
        let clock = ManualClock::new(T);
        let mut s = GameState::new();
        // 1000 / 100 = 10 gold per second
        s.record_score(MinigameId::Runner, BigNum::from(1_000u32));
        let engine = TickEngine::new(GameRules::standard(), clock.clone(), HeadlessHost::default());
        (engine, s, clock)
    }

    #[test]
    fn lifecycle_noops_and_frame_requests() {
        let (mut engine, s, _) = setup();
        engine.stop();
        assert_eq!(engine.state(), EngineState::Stopped);
        engine.start(&s);
        let first = engine.host().pending();
        assert!(first.is_some());
        engine.start(&s);
        assert_eq!(engine.host().pending(), first);
        engine.stop();
        assert_eq!(engine.host().pending(), None);
        assert_eq!(engine.host().cancelled(), 1);
        engine.destroy();
        engine.start(&s);
        assert_eq!(engine.state(), EngineState::Destroyed);
    }

    #[test]
    fn first_frame_credits_nothing_then_delta_is_clamped() {
        let (mut engine, mut s, _) = setup();
        engine.start(&s);
        let r = engine.on_frame(&mut s, 0.0);
        assert_eq!(r.delta_ms, 0.0);
        assert_eq!(s.balance(ResourceKind::Gold), BigNum::ZERO);

        let r = engine.on_frame(&mut s, 500.0);
        assert_eq!(r.delta_ms, 500.0);
        assert_eq!(s.balance(ResourceKind::Gold), BigNum::from(5u32));

        // a 30s gap in frames only counts as the 1s clamp
        let r = engine.on_frame(&mut s, 30_500.0);
        assert_eq!(r.delta_ms, 1000.0);
        assert_eq!(s.balance(ResourceKind::Gold), BigNum::from(15u32));

        // timestamps going backwards count as zero
        let r = engine.on_frame(&mut s, 100.0);
        assert_eq!(r.delta_ms, 0.0);
        assert_eq!(s.stats.total_played_ms, 1_500);
    }

    #[test]
    fn frames_after_stop_are_ignored() {
        let (mut engine, mut s, _) = setup();
        engine.start(&s);
        engine.on_frame(&mut s, 0.0);
        engine.stop();
        let r = engine.on_frame(&mut s, 1000.0);
        assert_eq!(r, FrameReport::default());
        assert_eq!(s.balance(ResourceKind::Gold), BigNum::ZERO);
    }

    #[test]
    fn automations_follow_wall_clock_not_frames() {
        let (mut engine, mut s, clock) = setup();
        s.credit(ResourceKind::Gold, BigNum::from(10_000u32));
        s.set_upgrade_flag(&UpgradeId::from("technique_refinery"), true);
        engine.start(&s);
        engine.on_frame(&mut s, 0.0);
        // one frame, but a full minute of wall time
        clock.advance(60_000);
        let r = engine.on_frame(&mut s, 16.0);
        assert_eq!(r.triggers.len(), 1);
        assert_eq!(r.triggers[0].id, AutomationId::from("refine_technique"));
        assert_eq!(s.balance(ResourceKind::Technique), BigNum::ONE);
        assert_eq!(s.last_played_ms(), T + 60_000);
    }

    #[test]
    fn automations_see_generation_from_the_same_frame() {
        let (mut engine, mut s, clock) = setup();
        s.credit(ResourceKind::Gold, BigNum::from(495u32));
        s.set_upgrade_flag(&UpgradeId::from("technique_refinery"), true);
        engine.start(&s);
        engine.on_frame(&mut s, 0.0);
        clock.advance(60_000);
        // 1s at 10/s lifts 495 past the 500 refinery cost
        let r = engine.on_frame(&mut s, 1000.0);
        assert_eq!(r.credited, BigNum::from(10u32));
        assert_eq!(
            r.triggers,
            vec![Trigger {
                id: AutomationId::from("refine_technique"),
                succeeded: true,
            }]
        );
        assert_eq!(s.balance(ResourceKind::Gold), BigNum::from(5u32));
        assert_eq!(s.balance(ResourceKind::Technique), BigNum::ONE);
    }

    #[test]
    fn rates_refresh_on_wall_cadence() {
        let (mut engine, mut s, clock) = setup();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        engine.on_rate_change(move |snap| sink.borrow_mut().push(snap.primary()));
        engine.start(&s);
        assert_eq!(seen.borrow().len(), 1);

        s.record_score(MinigameId::Stacker, BigNum::from(1_000u32));
        clock.advance(100);
        assert!(!engine.on_frame(&mut s, 0.0).rates_refreshed);
        clock.advance(150);
        assert!(engine.on_frame(&mut s, 16.0).rates_refreshed);
        assert_eq!(*seen.borrow(), vec![BigNum::from(10u32), BigNum::from(20u32)]);
        assert_eq!(engine.rates().primary(), BigNum::from(20u32));

        engine.destroy();
        engine.refresh_rates(&s);
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn suspend_stamps_last_played() {
        let (mut engine, mut s, clock) = setup();
        engine.start(&s);
        clock.set(T + 5_000);
        engine.suspend(&mut s);
        assert!(!engine.is_running());
        assert_eq!(s.last_played_ms(), T + 5_000);
    }
}
