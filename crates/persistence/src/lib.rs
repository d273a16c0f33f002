#![deny(warnings)]

//! Save/load boundary: JSON snapshots of the game state.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use idle_core::GameState;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Current on-disk format version.
pub const SAVE_VERSION: u32 = 1;

/// Envelope written around the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveFile {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub state: GameState,
}

impl SaveFile {
    pub fn new(state: GameState) -> Self {
        Self {
            version: SAVE_VERSION,
            saved_at: Utc::now(),
            state,
        }
    }
}

/// Opaque load/store of a single save slot.
pub trait SaveStore {
    /// `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<GameState>>;
    fn save(&mut self, state: &GameState) -> Result<()>;
}

pub fn encode(state: &GameState) -> Result<String> {
    serde_json::to_string_pretty(&SaveFile::new(state.clone())).context("serialize save")
}

pub fn decode(text: &str) -> Result<GameState> {
    let file: SaveFile = serde_json::from_str(text).context("parse save")?;
    if file.version > SAVE_VERSION {
        bail!(
            "save version {} is newer than supported version {}",
            file.version,
            SAVE_VERSION
        );
    }
    Ok(file.state)
}

/// Save slot backed by a JSON file. Writes go to a sibling temp file first
/// and are renamed into place.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SaveStore for JsonFileStore {
    fn load(&self) -> Result<Option<GameState>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no save file");
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        let state = decode(&text).with_context(|| format!("load {}", self.path.display()))?;
        info!(path = %self.path.display(), "save loaded");
        Ok(Some(state))
    }

    fn save(&mut self, state: &GameState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, encode(state)?).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replace {}", self.path.display()))?;
        info!(path = %self.path.display(), "save written");
        Ok(())
    }
}

/// In-memory slot that still goes through the JSON encoding.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    text: Option<String>,
}

impl MemoryStore {
    pub fn raw(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

impl SaveStore for MemoryStore {
    fn load(&self) -> Result<Option<GameState>> {
        self.text.as_deref().map(decode).transpose()
    }

    fn save(&mut self, state: &GameState) -> Result<()> {
        self.text = Some(encode(state)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idle_core::{BigNum, MinigameId, ResourceKind, StateStore, UpgradeId};
    use proptest::prelude::*;

    fn sample() -> GameState {
        let mut s = GameState::new();
        s.credit(ResourceKind::Gold, "1.5e400".parse().unwrap());
        s.credit(ResourceKind::Technique, "12.25".parse().unwrap());
        s.record_score(MinigameId::Runner, BigNum::from(4_200u32));
        s.set_upgrade_level(&UpgradeId::from("gold_multiplier"), 7);
        s.set_last_played_ms(1_700_000_000_000);
        s
    }

    #[test]
    fn memory_store_roundtrip() {
        let mut store = MemoryStore::default();
        assert!(store.load().unwrap().is_none());
        store.save(&sample()).unwrap();
        assert!(store.raw().unwrap().contains(r#""gold": "1.5e400""#));
        assert_eq!(store.load().unwrap(), Some(sample()));
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!(
            "idle-save-test-{}-{}",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let mut store = JsonFileStore::new(dir.join("slot.json"));
        assert!(store.load().unwrap().is_none());
        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample()));
        assert!(!dir.join("slot.json.tmp").exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn newer_versions_and_garbage_are_rejected() {
        let mut file = SaveFile::new(GameState::new());
        file.version = SAVE_VERSION + 1;
        let text = serde_json::to_string(&file).unwrap();
        assert!(decode(&text).is_err());
        assert!(decode("{not json").is_err());
    }

    #[test]
    fn numeric_json_is_accepted_on_load() {
        let text = r#"{"version":1,"saved_at":"2024-01-01T00:00:00Z","state":{"balances":{"gold":250}}}"#;
        let state = decode(text).unwrap();
        assert_eq!(state.balance(ResourceKind::Gold), BigNum::from(250u32));
    }

    proptest! {
        #[test]
        fn balances_survive_encoding(m in 1u64..u64::MAX, e in -50i64..5000) {
            let value: BigNum = format!("{m}e{e}").parse().unwrap();
            let mut s = GameState::new();
            s.set_balance(ResourceKind::Prestige, value);
            let back = decode(&encode(&s).unwrap()).unwrap();
            prop_assert_eq!(back.balance(ResourceKind::Prestige), value);
        }
    }
}
