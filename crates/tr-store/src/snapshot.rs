use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use tr_types::config::OptimizationConfig;
use tr_types::filters::MetricFilter;
use tr_types::session::{LogEntry, SessionSnapshot, SessionState, TrialRecord};

/// Directory segment every persisted key lives under.
pub const STORE_NAMESPACE: &str = "tunerig";

const CONFIG_KEY: &str = "config";
const FILTERS_KEY: &str = "filters";
const HISTORY_KEY: &str = "history";
const JOURNAL_KEY: &str = "journal";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable store for session state, one JSON file per key.
///
/// Written best-effort during a run so a reconnecting observer can
/// reconstruct an in-flight or just-finished session without replay.
#[derive(Debug)]
pub struct SnapshotStore {
    pub root: PathBuf,
}

impl SnapshotStore {
    /// Open (or create) the store under `base`. Keys land in
    /// `base/tunerig/<key>.json`.
    pub fn new<P: AsRef<Path>>(base: P) -> StoreResult<Self> {
        let root = base.as_ref().join(STORE_NAMESPACE);
        std::fs::create_dir_all(&root)?;

        Ok(Self { root })
    }

    /// Open the store under the platform data directory.
    pub fn at_default_location() -> StoreResult<Self> {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base)
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    fn write_key<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        let contents = serde_json::to_string_pretty(value)?;
        std::fs::write(self.key_path(key), contents)?;
        Ok(())
    }

    fn read_key<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Persist the active config. The filter set is also written under its
    /// own key so filter editors can read it without decoding the config.
    pub fn persist_config(&self, config: &OptimizationConfig) -> StoreResult<()> {
        self.write_key(CONFIG_KEY, config)?;
        self.write_key(FILTERS_KEY, &config.filters)
    }

    pub fn persist_history(&self, history: &[TrialRecord]) -> StoreResult<()> {
        self.write_key(HISTORY_KEY, &history)
    }

    pub fn persist_journal(&self, journal: &[LogEntry]) -> StoreResult<()> {
        self.write_key(JOURNAL_KEY, &journal)
    }

    pub fn load_config(&self) -> StoreResult<Option<OptimizationConfig>> {
        self.read_key(CONFIG_KEY)
    }

    pub fn load_filters(&self) -> StoreResult<Vec<MetricFilter>> {
        Ok(self.read_key(FILTERS_KEY)?.unwrap_or_default())
    }

    pub fn load_history(&self) -> StoreResult<Vec<TrialRecord>> {
        Ok(self.read_key(HISTORY_KEY)?.unwrap_or_default())
    }

    pub fn load_journal(&self) -> StoreResult<Vec<LogEntry>> {
        Ok(self.read_key(JOURNAL_KEY)?.unwrap_or_default())
    }

    /// Reconstruct a snapshot for an observer reconnecting after a restart.
    /// The best result is the newest history entry the service flagged best;
    /// a process that restarted is by definition no longer running anything.
    pub fn load_snapshot(&self) -> StoreResult<SessionSnapshot> {
        let history = self.load_history()?;
        let best = history.iter().rev().find(|t| t.is_best_so_far).cloned();

        Ok(SessionSnapshot {
            state: SessionState::Idle,
            config: self.load_config()?,
            history,
            best,
            journal: self.load_journal()?,
        })
    }
}
