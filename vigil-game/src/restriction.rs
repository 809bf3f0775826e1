//! Selectable-cell restriction profiles.
//!
//! A profile narrows which cells may be chosen as round targets. The Round
//! Generator derives its per-round eligibility mask from the active profile.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictionProfile {
    /// Master toggle. When off, every non-center cell that is not
    /// permanently blocked is eligible.
    #[serde(default)]
    pub restrict_selectable: bool,
    /// Target size of the eligibility mask when restriction is on.
    #[serde(default = "default_allowed_count")]
    pub allowed_count: usize,
    /// Re-sample the mask each time the round number changes. When off, the
    /// mask is sampled once and then held for the rest of the run.
    #[serde(default)]
    pub randomize_each_round: bool,
    /// Cells that are never eligible, regardless of sampling.
    #[serde(default)]
    pub permanently_blocked: Vec<usize>,
    /// Cells seeded into the mask before random fill.
    #[serde(default)]
    pub forced_allowed: Vec<usize>,
}

impl Default for RestrictionProfile {
    fn default() -> Self {
        Self {
            restrict_selectable: false,
            allowed_count: default_allowed_count(),
            randomize_each_round: false,
            permanently_blocked: Vec::new(),
            forced_allowed: Vec::new(),
        }
    }
}

fn default_allowed_count() -> usize {
    24
}
