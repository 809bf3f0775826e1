//! Save-slot timeline driver.
//!
//! A timeline is an ordered list of per-round records authored outside the
//! engine (editor UI, save file) and loaded through a [`TimelineStore`]
//! implementation. Load failures disable the driver and surface a status
//! string; they are never hard errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sigil::SigilKind;

const DEFAULT_TIMELINE_DATA: &str = include_str!("../assets/timeline.default.json");

/// One round's worth of timeline data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct TimelineRound {
    /// Cells added to the grid this round.
    #[serde(default)]
    pub add_cells: usize,
    /// Active sigil-kind budget for this round.
    #[serde(default = "default_one")]
    pub max_kinds: usize,
}

/// Timeline configuration: ordered round records plus global options the
/// Director reads back (the engine itself only consumes the round records).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TimelineConfig {
    #[serde(default)]
    pub rounds: Vec<TimelineRound>,
    /// 0.0 = strict validation, higher values let the Director forgive
    /// near-miss placements.
    #[serde(default)]
    pub forgiveness: f32,
    /// Whether haunting interruptions may fire during the placement stage.
    #[serde(default = "default_true")]
    pub placement_interruptions: bool,
    /// Bounds on the lull between the Traveler retreating and the next
    /// round starting, in seconds.
    #[serde(default)]
    pub lull_min: f32,
    #[serde(default)]
    pub lull_max: f32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimelineError {
    #[error("timeline has no rounds")]
    Empty,
    #[error("round {round}: add_cells {cells} exceeds grid capacity {max}")]
    TooManyCells {
        round: usize,
        cells: usize,
        max: usize,
    },
    #[error("round {round}: kind count {kinds} must be between 1 and {max}", max = SigilKind::COUNT)]
    KindsOutOfRange { round: usize, kinds: usize },
}

impl TimelineConfig {
    /// Built-in timeline shipped with the crate.
    #[must_use]
    pub fn load_from_static() -> Self {
        serde_json::from_str(DEFAULT_TIMELINE_DATA).unwrap_or_default()
    }

    #[must_use]
    pub fn total_rounds(&self) -> u32 {
        self.rounds.len() as u32
    }

    /// Structural validity against the hard ceilings of a given grid.
    pub fn validate(&self, max_cells: usize) -> Result<(), TimelineError> {
        if self.rounds.is_empty() {
            return Err(TimelineError::Empty);
        }
        for (i, round) in self.rounds.iter().enumerate() {
            let round_number = i + 1;
            if round.add_cells > max_cells {
                return Err(TimelineError::TooManyCells {
                    round: round_number,
                    cells: round.add_cells,
                    max: max_cells,
                });
            }
            if round.max_kinds == 0 || round.max_kinds > SigilKind::COUNT {
                return Err(TimelineError::KindsOutOfRange {
                    round: round_number,
                    kinds: round.max_kinds,
                });
            }
        }
        Ok(())
    }

    /// Record for a 1-based round, if the timeline extends that far.
    #[must_use]
    pub fn round_entry(&self, round: u32) -> Option<TimelineRound> {
        if round == 0 {
            return None;
        }
        self.rounds.get(round as usize - 1).copied()
    }
}

fn default_one() -> usize {
    1
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_timeline_parses_and_validates() {
        let timeline = TimelineConfig::load_from_static();
        assert!(timeline.total_rounds() > 0);
        assert!(timeline.validate(24).is_ok());
    }

    #[test]
    fn empty_timeline_is_invalid() {
        assert_eq!(
            TimelineConfig::default().validate(24),
            Err(TimelineError::Empty)
        );
    }

    #[test]
    fn oversized_round_is_invalid() {
        let timeline = TimelineConfig {
            rounds: vec![TimelineRound {
                add_cells: 30,
                max_kinds: 2,
            }],
            ..TimelineConfig::default()
        };
        assert_eq!(
            timeline.validate(24),
            Err(TimelineError::TooManyCells {
                round: 1,
                cells: 30,
                max: 24
            })
        );
    }

    #[test]
    fn round_entries_are_one_based() {
        let timeline = TimelineConfig {
            rounds: vec![
                TimelineRound {
                    add_cells: 2,
                    max_kinds: 1,
                },
                TimelineRound {
                    add_cells: 3,
                    max_kinds: 2,
                },
            ],
            ..TimelineConfig::default()
        };
        assert_eq!(timeline.round_entry(0), None);
        assert_eq!(timeline.round_entry(1).unwrap().add_cells, 2);
        assert_eq!(timeline.round_entry(2).unwrap().max_kinds, 2);
        assert_eq!(timeline.round_entry(3), None);
    }
}
