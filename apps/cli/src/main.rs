#![deny(warnings)]

//! Headless driver: resume a save, report offline earnings, simulate an
//! active session against a manual clock, and save again.

use std::path::PathBuf;

use anyhow::{Context, Result};
use idle_core::{
    BigNum, GameConfig, GameRules, GameState, MinigameId, ResourceKind, StateStore, UpgradeKey,
    TOP_SCORES_PER_MINIGAME,
};
use idle_econ::{format_big, format_duration, DEFAULT_PRECISION};
use idle_runtime::{
    apply_offline_progress, resume_session, Clock, HeadlessHost, ManualClock, SystemClock,
    TickEngine,
};
use persistence::{JsonFileStore, SaveStore};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

struct Args {
    config: Option<PathBuf>,
    save: PathBuf,
    minutes: u32,
    fps: u32,
    seed: u64,
    json: bool,
}

fn parse_args() -> Args {
    let mut args = Args {
        config: None,
        save: PathBuf::from("saves/idle.json"),
        minutes: 5,
        fps: 30,
        seed: 42,
        json: false,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = it.next().map(PathBuf::from),
            "--save" => {
                if let Some(p) = it.next() {
                    args.save = PathBuf::from(p);
                }
            }
            "--minutes" => args.minutes = it.next().and_then(|s| s.parse().ok()).unwrap_or(args.minutes),
            "--fps" => args.fps = it.next().and_then(|s| s.parse().ok()).unwrap_or(args.fps).max(1),
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()).unwrap_or(args.seed),
            "--json" => args.json = true,
            other => warn!(arg = other, "ignoring unknown argument"),
        }
    }
    args
}

fn load_rules(path: Option<&PathBuf>) -> Result<GameRules> {
    let Some(path) = path else {
        return Ok(GameRules::standard());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let config = GameConfig::from_yaml_str(&text)?;
    Ok(GameRules::with_config(config)?)
}

/// A fresh save with a few seeded minigame results to generate from.
fn fresh_state(seed: u64) -> GameState {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut state = GameState::new();
    for game in MinigameId::ALL {
        for _ in 0..TOP_SCORES_PER_MINIGAME {
            state.record_score(game, BigNum::from(rng.gen_range(100u32..2_000)));
        }
    }
    state
}

/// Greedy buyer: cheapest useful purchases first.
fn shop(rules: &GameRules, state: &mut GameState) -> bool {
    let mut bought = false;
    for id in ["prestige_press", "technique_refinery", "technique_pack", "gold_multiplier"] {
        while rules.upgrades.try_purchase(state, &UpgradeKey::global(id)) {
            bought = true;
        }
    }
    for game in MinigameId::ALL {
        bought |= rules
            .upgrades
            .try_purchase(state, &UpgradeKey::scoped("practice", game));
    }
    bought
}

fn print_balances(state: &GameState) {
    for kind in ResourceKind::ALL {
        println!(
            "  {:<10} {:>12}",
            kind.name(),
            format_big(&state.balance(kind), DEFAULT_PRECISION)
        );
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::DEBUG)
        .init();

    let args = parse_args();
    info!(
        save = %args.save.display(),
        minutes = args.minutes,
        build = env!("GIT_SHA"),
        "starting idle CLI"
    );

    let rules = load_rules(args.config.as_ref())?;
    let mut store = JsonFileStore::new(&args.save);
    let mut state = match store.load()? {
        Some(state) => state,
        None => {
            info!(seed = args.seed, "no save found, starting fresh");
            fresh_state(args.seed)
        }
    };

    let now = SystemClock.now_ms();
    let resume = resume_session(&mut state, &rules, now);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&resume)?);
    }
    let progress = &resume.progress;
    if progress.was_calculated {
        println!(
            "Welcome back | away: {}{} | earned: {} {}",
            progress.formatted_duration,
            if progress.was_capped { " (capped)" } else { "" },
            format_big(&progress.earned(ResourceKind::PRIMARY), DEFAULT_PRECISION),
            ResourceKind::PRIMARY,
        );
        for entry in resume.automations.entries.iter().filter(|e| e.attempted > 0) {
            println!("  {} ran {}/{} times", entry.id, entry.succeeded, entry.attempted);
        }
    }
    apply_offline_progress(&mut state, progress);

    let clock = ManualClock::new(now);
    let mut engine = TickEngine::new(rules.clone(), clock.clone(), HeadlessHost::default());
    engine.start(&state);

    let frame_ms = 1000.0 / f64::from(args.fps);
    let frames = u64::from(args.minutes) * 60 * u64::from(args.fps);
    let mut triggers = 0usize;
    for frame in 0..frames {
        clock.set(now + (frame as f64 * frame_ms) as i64);
        triggers += engine.on_frame(&mut state, frame as f64 * frame_ms).triggers.len();
        if frame % u64::from(args.fps) == 0 && shop(&rules, &mut state) {
            engine.refresh_rates(&state);
        }
    }
    engine.suspend(&mut state);
    engine.destroy();
    // simulated minutes are not wall time; the next resume measures from now
    state.set_last_played_ms(SystemClock.now_ms());

    let rates = engine.rates();
    println!(
        "Session | simulated: {} | automation runs: {} | rate: {}",
        format_duration(u64::from(args.minutes) * 60),
        triggers,
        rates
            .formatted
            .get(&ResourceKind::PRIMARY)
            .map(String::as_str)
            .unwrap_or("0/sec"),
    );
    for (kind, rate) in &rates.formatted_automation {
        println!("  {kind} from automations: {rate}");
    }
    print_balances(&state);

    store.save(&state)?;
    println!("Saved to {}", store.path().display());
    Ok(())
}
