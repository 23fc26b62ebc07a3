//! Persistence collaborator
//!
//! The engine exposes a serialisable `Snapshot` of everything that must survive a
//! reload. Where it is kept is up to a `SnapshotStore`; the engine never depends on
//! a particular transport.

use crate::core_modules::ledger::LapLedger;
use crate::core_modules::rotation::Roster;
use crate::error::SnapshotError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub ledger: LapLedger,
    pub roster: Roster,
    pub current_index: usize,
    pub round: u32,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(content)?)
    }
}

pub trait SnapshotStore {
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError>;

    /// `Ok(None)` when nothing has been saved yet.
    fn load(&mut self) -> Result<Option<Snapshot>, SnapshotError>;
}

/// Keeps the latest snapshot in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    latest: Option<Snapshot>,
}

impl SnapshotStore for MemoryStore {
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        self.latest = Some(snapshot.clone());
        Ok(())
    }

    fn load(&mut self) -> Result<Option<Snapshot>, SnapshotError> {
        Ok(self.latest.clone())
    }
}

/// Writes the snapshot as pretty JSON to a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let json = snapshot.to_json()?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn load(&mut self) -> Result<Option<Snapshot>, SnapshotError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(Snapshot::from_json(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::ledger::LapRecord;
    use crate::core_modules::rotation::RunnerId;

    fn sample() -> Snapshot {
        let mut ledger = LapLedger::new();
        ledger.append(LapRecord {
            duration_ms: 4321.5,
            runner_id: RunnerId(1),
            runner_name: "Ana".into(),
            round: 1,
        });
        Snapshot {
            ledger,
            roster: Roster::from_names(["Ana", "Bea"]),
            current_index: 1,
            round: 1,
        }
    }

    #[test]
    fn file_store_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("session.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn file_store_keeps_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("session.json"));
        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample()));
    }

    #[test]
    fn corrupt_file_is_an_encoding_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{ not json").unwrap();
        let mut store = JsonFileStore::new(path);
        assert!(matches!(store.load(), Err(SnapshotError::Encoding(_))));
    }

    #[test]
    fn roster_serialises_as_plain_list() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["roster"][1]["name"], "Bea");
        assert_eq!(json["roster"][0]["id"], 1);
    }
}
