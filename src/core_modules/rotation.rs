// THEORY:
// The `RunnerRotation` answers one question for every accepted lap: whose lap was
// it, and what happens next? It owns the roster, the index of the runner currently
// on track, and the round counter.
//
// Key architectural principles:
// 1.  **Round-robin attribution**: A lap always belongs to the runner at the index
//     *before* the step, tagged with the round *before* the step.
// 2.  **Round rollover**: When the last runner in the roster finishes, the round
//     counter increments and the index wraps to zero. With rounds disabled, the
//     index still wraps but the counter stays put.
// 3.  **Append-only roster**: Runners are only ever added at the end, so adding one
//     mid-round cannot shift whose turn it is. The newcomer runs when the index
//     reaches them, which may be later in the same round.
// 4.  **Reset returns to setup**: The roster given at construction is kept aside.
//     A reset brings it back and drops every runner added since.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core_modules::frame::Millis;
use crate::core_modules::ledger::LapRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunnerId(pub u32);

impl fmt::Display for RunnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runner {
    pub id: RunnerId,
    pub name: String,
}

fn default_name(n: usize) -> String {
    format!("Runner {n}")
}

/// Ordered, never-empty list of runners. Serialises as a plain list; an empty list
/// deserialises to the single default runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Runner>", into = "Vec<Runner>")]
pub struct Roster {
    runners: Vec<Runner>,
}

impl From<Vec<Runner>> for Roster {
    fn from(runners: Vec<Runner>) -> Self {
        Self::from_runners(runners)
    }
}

impl From<Roster> for Vec<Runner> {
    fn from(roster: Roster) -> Self {
        roster.runners
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self::unnamed()
    }
}

impl Roster {
    /// A single anonymous runner.
    pub fn unnamed() -> Self {
        Self {
            runners: vec![Runner {
                id: RunnerId(1),
                name: default_name(1),
            }],
        }
    }

    /// One runner per entry; blank names get the positional default.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let runners: Vec<Runner> = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let name = name.as_ref().trim();
                Runner {
                    id: RunnerId(i as u32 + 1),
                    name: if name.is_empty() {
                        default_name(i + 1)
                    } else {
                        name.to_string()
                    },
                }
            })
            .collect();
        Self::from_runners(runners)
    }

    /// Falls back to a single default runner when `runners` is empty.
    pub fn from_runners(runners: Vec<Runner>) -> Self {
        if runners.is_empty() {
            Self::unnamed()
        } else {
            Self { runners }
        }
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Runner> {
        self.runners.get(index)
    }

    pub fn runners(&self) -> &[Runner] {
        &self.runners
    }

    pub fn push(&mut self, name: Option<String>) -> &Runner {
        let n = self.runners.len() + 1;
        let next_id = self.runners.iter().map(|r| r.id.0).max().unwrap_or(0) + 1;
        let name = name
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| default_name(n));
        self.runners.push(Runner {
            id: RunnerId(next_id),
            name,
        });
        &self.runners[n - 1]
    }
}

/// What the rotation did after attributing a lap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationStep {
    /// Another runner in the same round is up next.
    NextRunner { index: usize },
    /// The lap closed `finished_round`; the rotation is back at index 0.
    RoundComplete { finished_round: u32 },
}

#[derive(Debug, Clone)]
pub struct RunnerRotation {
    roster: Roster,
    setup: Roster,
    current_index: usize,
    round: u32,
    use_rounds: bool,
}

impl RunnerRotation {
    pub fn new(roster: Roster, use_rounds: bool) -> Self {
        Self {
            setup: roster.clone(),
            roster,
            current_index: 0,
            round: 1,
            use_rounds,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn current_runner(&self) -> &Runner {
        // `current_index` is kept in range by every mutator.
        &self.roster.runners[self.current_index]
    }

    /// Builds the lap record for the runner on track and advances the rotation.
    pub fn attribute(&mut self, duration_ms: Millis) -> (LapRecord, RotationStep) {
        let runner = self.current_runner();
        let lap = LapRecord {
            duration_ms,
            runner_id: runner.id,
            runner_name: runner.name.clone(),
            round: self.round,
        };

        let was_last = self.current_index + 1 >= self.roster.len();
        let step = if !was_last {
            self.current_index += 1;
            RotationStep::NextRunner {
                index: self.current_index,
            }
        } else if self.use_rounds {
            let finished_round = self.round;
            self.round += 1;
            self.current_index = 0;
            RotationStep::RoundComplete { finished_round }
        } else {
            self.current_index = 0;
            RotationStep::NextRunner { index: 0 }
        };
        (lap, step)
    }

    /// Appends a runner at the end of the rotation order.
    pub fn add_runner(&mut self, name: Option<String>) -> &Runner {
        self.roster.push(name)
    }

    /// Back to the setup roster, first runner of round one.
    pub fn reset(&mut self) {
        self.roster = self.setup.clone();
        self.current_index = 0;
        self.round = 1;
    }

    /// Replaces all rotation state, repairing anything out of range.
    pub fn restore(&mut self, roster: Roster, current_index: usize, round: u32) {
        let roster = Roster::from_runners(roster.runners);
        self.current_index = if current_index < roster.len() {
            current_index
        } else {
            0
        };
        self.round = round.max(1);
        self.roster = roster;
    }
}
