//! Scripted scenario driver: a hand-authored escalation of target counts and
//! active sigil budgets, with an optional restriction profile.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::restriction::RestrictionProfile;
use crate::sigil::SigilKind;

const DEFAULT_SCENARIO_DATA: &str = include_str!("../assets/scenario.default.json");

/// Per-round knobs supplied by a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioRound {
    /// Cells to select this round (clamped against capacity by the engine).
    pub cells: usize,
    /// Active sigil-kind budget for this round.
    #[serde(default = "default_one")]
    pub max_kinds: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rounds: Vec<ScenarioRound>,
    /// Applied to the generator when present; absent means "leave the
    /// current profile alone".
    #[serde(default)]
    pub restriction: Option<RestrictionProfile>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScenarioError {
    #[error("scenario has no rounds")]
    Empty,
    #[error("round {round}: cell count must be positive")]
    NonPositiveCells { round: usize },
    #[error("round {round}: kind count {kinds} must be between 1 and {max}", max = SigilKind::COUNT)]
    KindsOutOfRange { round: usize, kinds: usize },
}

impl Scenario {
    /// Built-in scenario shipped with the crate.
    #[must_use]
    pub fn load_from_static() -> Self {
        serde_json::from_str(DEFAULT_SCENARIO_DATA).unwrap_or_default()
    }

    #[must_use]
    pub fn total_rounds(&self) -> u32 {
        self.rounds.len() as u32
    }

    /// Structural validity check. Out-of-range values that can be clamped at
    /// generation time are not errors; only data that makes the scenario
    /// meaningless is rejected.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.rounds.is_empty() {
            return Err(ScenarioError::Empty);
        }
        for (i, round) in self.rounds.iter().enumerate() {
            let round_number = i + 1;
            if round.cells == 0 {
                return Err(ScenarioError::NonPositiveCells {
                    round: round_number,
                });
            }
            if round.max_kinds == 0 || round.max_kinds > SigilKind::COUNT {
                return Err(ScenarioError::KindsOutOfRange {
                    round: round_number,
                    kinds: round.max_kinds,
                });
            }
        }
        Ok(())
    }

    /// Desired cell count for a 1-based round, holding the last entry for
    /// rounds past the end of the script.
    #[must_use]
    pub fn cells_for_round(&self, round: u32) -> usize {
        self.round_entry(round).map_or(0, |entry| entry.cells)
    }

    /// Desired sigil-kind budget for a 1-based round.
    #[must_use]
    pub fn kinds_for_round(&self, round: u32) -> usize {
        self.round_entry(round).map_or(1, |entry| entry.max_kinds)
    }

    fn round_entry(&self, round: u32) -> Option<&ScenarioRound> {
        if self.rounds.is_empty() {
            return None;
        }
        let index = (round.max(1) as usize - 1).min(self.rounds.len() - 1);
        self.rounds.get(index)
    }
}

fn default_one() -> usize {
    1
}
