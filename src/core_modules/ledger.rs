// THEORY:
// The `LapLedger` is the historical record of the session and the only thing
// reporting and export read from. It has two parts:
//
// - `committed`: laps from rounds that have been closed.
// - `open`: laps of the round in progress.
//
// Every `LapRecord` carries its own round number, so grouping by round never
// depends on the roster size (which may grow between rounds). Records are never
// edited once appended; the only mutations are `commit_round`, which moves the open
// laps wholesale into `committed`, and `clear`.

use crate::core_modules::frame::Millis;
use crate::core_modules::rotation::RunnerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapRecord {
    pub duration_ms: Millis,
    pub runner_id: RunnerId,
    pub runner_name: String,
    pub round: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LapLedger {
    committed: Vec<LapRecord>,
    open: Vec<LapRecord>,
}

impl LapLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, lap: LapRecord) {
        self.open.push(lap);
    }

    /// Moves the laps of the round in progress into the permanent record.
    pub fn commit_round(&mut self) -> usize {
        let moved = self.open.len();
        self.committed.append(&mut self.open);
        moved
    }

    /// All laps in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &LapRecord> {
        self.committed.iter().chain(self.open.iter())
    }

    pub fn committed(&self) -> &[LapRecord] {
        &self.committed
    }

    pub fn open_round(&self) -> &[LapRecord] {
        &self.open
    }

    pub fn len(&self) -> usize {
        self.committed.len() + self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Laps grouped by their round number, rounds ascending.
    pub fn by_round(&self) -> BTreeMap<u32, Vec<&LapRecord>> {
        let mut rounds: BTreeMap<u32, Vec<&LapRecord>> = BTreeMap::new();
        for lap in self.records() {
            rounds.entry(lap.round).or_default().push(lap);
        }
        rounds
    }

    pub fn clear(&mut self) {
        self.committed.clear();
        self.open.clear();
    }
}
