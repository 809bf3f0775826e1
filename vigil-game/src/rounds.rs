//! Round Generator: per-round target selection, eligibility restriction,
//! and cross-round history bookkeeping.
//!
//! One generator owns the grid's selection state for a whole run. Every
//! difficulty driver (standard escalation, scripted scenario, saved
//! timeline, endless) funnels into the same draw pipeline once its inputs
//! have been clamped, so the invariants (center exclusion, no repeats
//! outside Endless, eligibility containment) hold for all of them.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::grid::Grid;
use crate::restriction::RestrictionProfile;
use crate::scenario::Scenario;
use crate::sigil::{ItemAssignments, SigilKind};
use crate::timeline::TimelineConfig;
use crate::TimelineStore;

/// The current round's cell -> demanded sigil mapping. Snapshots of this map
/// are what the history records and what the Traveler consumes.
pub type RoundSelection = BTreeMap<usize, SigilKind>;

/// Difficulty driver for a round. Drivers are mutually exclusive; the
/// Director picks one per run.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum RoundMode {
    Standard,
    Scenario,
    Timeline,
    Endless,
}

/// Signals raised during generation for external collaborators. The engine
/// never acts on these itself.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RoundEvent {
    /// Round 2 was generated, which implies round 1 completed. Consumed by
    /// the haunting-unlock collaborator.
    FirstRoundCompleted,
    /// Endless re-draw imminent: all external cell placement/interaction
    /// state must return to idle, since cells may repeat.
    ResetCellsToIdle,
}

/// Outcome of the most recent generation call, surfaced to the Director.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoundOutcome {
    /// Terminal condition reached: round past the end, or no candidates.
    pub win: bool,
    /// The win was caused by candidate exhaustion rather than round count.
    pub no_candidates_remaining: bool,
    /// Target count actually applied after clamping.
    pub applied_cells: usize,
    /// Sigil-kind budget actually applied after clamping.
    pub applied_kinds: usize,
    /// Cells actually drawn into the selection.
    pub generated_cells: usize,
    /// Human-readable summary of what happened.
    pub status: String,
}

/// Debug override: force specific cells (and optionally kinds) for one
/// round. Testing affordance, not a gameplay feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcedSelection {
    pub round: u32,
    pub cells: Vec<usize>,
    #[serde(default)]
    pub kinds: Vec<SigilKind>,
    /// Allow forced cells even when they violate the mask or repeat history.
    #[serde(default)]
    pub ignore_restriction_and_history: bool,
}

/// Endless-mode score counters. Accumulated on successful rounds and frozen
/// by the first failed validation.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct EndlessScore {
    pub rounds_completed: u32,
    pub cells_completed: u32,
}

pub struct RoundGenerator {
    grid: Grid,
    rng: ChaCha20Rng,
    profile: RestrictionProfile,
    target_count: usize,
    max_kinds: usize,
    current: RoundSelection,
    history: BTreeMap<u32, RoundSelection>,
    solved: BTreeSet<usize>,
    locked: BTreeSet<usize>,
    assignments: ItemAssignments,
    allowed_this_round: BTreeSet<usize>,
    blocked: BTreeSet<usize>,
    last_mask_round: Option<u32>,
    outcome: RoundOutcome,
    events: Vec<RoundEvent>,
    forced: Option<ForcedSelection>,
    endless_force_cell_zero: bool,
    endless_score: EndlessScore,
    endless_score_frozen: bool,
    timeline: Option<TimelineConfig>,
    timeline_loaded: bool,
}

impl RoundGenerator {
    const DEFAULT_TARGET_COUNT: usize = 3;
    const DEFAULT_MAX_KINDS: usize = 1;

    #[must_use]
    pub fn new(grid: Grid, seed: u64) -> Self {
        Self {
            grid,
            rng: ChaCha20Rng::seed_from_u64(seed),
            profile: RestrictionProfile::default(),
            target_count: Self::DEFAULT_TARGET_COUNT,
            max_kinds: Self::DEFAULT_MAX_KINDS,
            current: RoundSelection::new(),
            history: BTreeMap::new(),
            solved: BTreeSet::new(),
            locked: BTreeSet::new(),
            assignments: ItemAssignments::default(),
            allowed_this_round: BTreeSet::new(),
            blocked: BTreeSet::new(),
            last_mask_round: None,
            outcome: RoundOutcome::default(),
            events: Vec::new(),
            forced: None,
            endless_force_cell_zero: false,
            endless_score: EndlessScore::default(),
            endless_score_frozen: false,
            timeline: None,
            timeline_loaded: false,
        }
    }

    /// Forget everything from the current run: selection, history, solved
    /// and locked flags, and the cached mask. Profile and timeline survive.
    pub fn reset(&mut self) {
        self.current.clear();
        self.history.clear();
        self.solved.clear();
        self.locked.clear();
        self.allowed_this_round.clear();
        self.blocked.clear();
        self.last_mask_round = None;
        self.outcome = RoundOutcome::default();
        self.events.clear();
    }

    // --- Eligibility -----------------------------------------------------

    /// Recompute the eligibility mask for `round`.
    ///
    /// With restriction off the mask is simply every non-center cell that is
    /// not permanently blocked. With restriction on, forced-allowed cells
    /// are seeded first and the remaining slots are filled with a uniform
    /// sample. The sample is refreshed only when the round number changes
    /// (if `randomize_each_round`) or when no mask was ever computed;
    /// otherwise the cached mask is kept, including across a mid-run toggle
    /// of the randomize flag.
    pub fn refresh_eligibility_mask(&mut self, round: u32) {
        let center = self.grid.center();
        let cell_count = self.grid.cell_count();

        let blocked: BTreeSet<usize> = self
            .profile
            .permanently_blocked
            .iter()
            .copied()
            .filter(|&cell| cell < cell_count && cell != center)
            .collect();
        self.blocked = blocked;

        if !self.profile.restrict_selectable {
            let mask: BTreeSet<usize> = (0..cell_count)
                .filter(|&cell| cell != center && !self.blocked.contains(&cell))
                .collect();
            self.allowed_this_round = mask;
            self.last_mask_round = Some(round);
            return;
        }

        let max_possible = self.grid.max_selectable().saturating_sub(self.blocked.len());
        let clamped_count = self.profile.allowed_count.clamp(1, max_possible.max(1));

        let should_recompute = if self.profile.randomize_each_round {
            self.last_mask_round != Some(round)
        } else {
            self.last_mask_round.is_none()
        };

        if !should_recompute && self.allowed_this_round.len() == clamped_count {
            return;
        }

        let mut mask = BTreeSet::new();
        for &forced in &self.profile.forced_allowed {
            if forced >= cell_count || forced == center || self.blocked.contains(&forced) {
                continue;
            }
            mask.insert(forced);
        }

        let mut candidates: Vec<usize> = (0..cell_count)
            .filter(|&cell| {
                cell != center && !self.blocked.contains(&cell) && !mask.contains(&cell)
            })
            .collect();
        candidates.shuffle(&mut self.rng);

        let remaining = clamped_count.saturating_sub(mask.len());
        mask.extend(candidates.iter().take(remaining).copied());

        self.allowed_this_round = mask;
        self.last_mask_round = Some(round);
    }

    /// Whether a cell may be selected this round. The center and permanently
    /// blocked cells are never eligible; with restriction off everything
    /// else is.
    #[must_use]
    pub fn is_eligible(&self, cell: usize) -> bool {
        if cell == self.grid.center() || self.blocked.contains(&cell) {
            return false;
        }
        if !self.profile.restrict_selectable {
            return true;
        }
        self.allowed_this_round.contains(&cell)
    }

    // --- Drivers ---------------------------------------------------------

    /// Standard escalating round.
    pub fn generate_standard_round(&mut self, round: u32) {
        self.outcome = RoundOutcome::default();
        self.draw_round(round);
        self.outcome.applied_cells = self.outcome.generated_cells;
        self.outcome.status = "generated standard round.".to_string();
    }

    /// Scenario-driven round. Clamps the scenario's requests against hard
    /// ceilings and remaining capacity; a round past the script, an empty
    /// candidate pool, or full grid coverage all terminate the run as a win.
    pub fn generate_scenario_round(&mut self, round: u32, scenario: &Scenario) {
        self.outcome = RoundOutcome::default();

        if let Err(error) = scenario.validate() {
            self.outcome.status = format!("scenario invalid: {error}");
            warn!("{}", self.outcome.status);
            return;
        }

        if let Some(profile) = &scenario.restriction {
            self.profile = profile.clone();
        }

        let round = round.max(1);
        if round > scenario.total_rounds() {
            self.outcome.win = true;
            self.outcome.status = "reached end of scenario (round > total rounds).".to_string();
            return;
        }

        let desired_cells = scenario
            .cells_for_round(round)
            .min(self.grid.max_selectable());
        let desired_kinds = scenario.kinds_for_round(round).clamp(1, SigilKind::COUNT);

        self.refresh_eligibility_mask(round);
        let clamped_cells = desired_cells.min(self.candidate_count());
        self.outcome.applied_cells = clamped_cells;
        self.outcome.applied_kinds = desired_kinds;

        if clamped_cells == 0 {
            self.outcome.win = true;
            self.outcome.no_candidates_remaining = true;
            self.outcome.status =
                "no selectable cells remaining (exhausted or restricted).".to_string();
            return;
        }

        self.target_count = clamped_cells;
        self.max_kinds = desired_kinds;
        self.draw_round(round);

        // The per-round mask can hide cells temporarily; only permanently
        // blocked cells count as truly unavailable here.
        let max_unique = self.grid.max_selectable().saturating_sub(self.blocked.len());
        if self.total_unique_selected() >= max_unique {
            self.outcome.win = true;
            self.outcome.status = "all available cells exhausted.".to_string();
            return;
        }

        self.outcome.status = if round >= scenario.total_rounds() {
            "generated final scenario round.".to_string()
        } else {
            "generated scenario round.".to_string()
        };
    }

    /// Load (or reload) the timeline for a save slot. Failures disable the
    /// driver and leave a readable status; they never propagate.
    pub fn load_timeline<S: TimelineStore>(&mut self, store: &S, slot: &str) -> bool {
        self.timeline = None;
        self.timeline_loaded = false;
        self.outcome = RoundOutcome::default();

        match store.load_timeline(slot) {
            Ok(Some(config)) => {
                if config.total_rounds() == 0 {
                    self.outcome.status = "timeline was empty.".to_string();
                } else {
                    self.timeline = Some(config);
                    self.timeline_loaded = true;
                    self.outcome.status = "timeline loaded.".to_string();
                }
            }
            Ok(None) => {
                self.outcome.status = format!("no timeline saved for slot '{slot}'.");
            }
            Err(error) => {
                self.outcome.status = format!("failed to load timeline: {error}");
                warn!("{}", self.outcome.status);
            }
        }

        self.timeline_loaded
    }

    /// Timeline-driven round against the previously loaded config.
    pub fn generate_timeline_round(&mut self, round: u32) {
        self.outcome = RoundOutcome::default();

        let Some(timeline) = self.timeline.clone().filter(|_| self.timeline_loaded) else {
            self.outcome.status = "timeline not loaded.".to_string();
            return;
        };

        let round = round.max(1);
        let total_rounds = timeline.total_rounds();
        if round > total_rounds {
            self.outcome.win = true;
            self.outcome.status = "reached end of timeline (round > total rounds).".to_string();
            return;
        }

        if let Err(error) = timeline.validate(self.grid.max_selectable()) {
            self.outcome.status = format!("timeline invalid: {error}");
            warn!("{}", self.outcome.status);
            return;
        }

        let Some(entry) = timeline.round_entry(round) else {
            self.outcome.status = "timeline missing round data.".to_string();
            return;
        };

        let add_cells = entry.add_cells.min(self.grid.max_selectable());
        let max_kinds = entry.max_kinds.clamp(1, SigilKind::COUNT);

        self.refresh_eligibility_mask(round);
        let clamped_cells = add_cells.min(self.candidate_count());
        self.outcome.applied_cells = clamped_cells;
        self.outcome.applied_kinds = max_kinds;

        if clamped_cells == 0 {
            self.outcome.win = true;
            self.outcome.no_candidates_remaining = true;
            self.outcome.status =
                "no selectable cells remaining (exhausted or restricted).".to_string();
            return;
        }

        self.target_count = clamped_cells;
        self.max_kinds = max_kinds;
        self.draw_round(round);

        self.outcome.status = if round >= total_rounds {
            "generated final timeline round.".to_string()
        } else {
            "generated timeline round.".to_string()
        };
    }

    /// Endless round: history and restriction are ignored, the target count
    /// ramps with the round number and caps at every non-center cell, and
    /// the active kinds are resampled fresh.
    pub fn generate_endless_round(&mut self, round: u32) {
        self.outcome = RoundOutcome::default();
        let round = round.max(1);

        // Cells can repeat across Endless rounds, so external placement and
        // interaction state must be returned to idle before the new draw.
        self.events.push(RoundEvent::ResetCellsToIdle);
        self.solved.clear();
        self.assignments.randomize(&mut self.rng);

        if round == 2 {
            self.events.push(RoundEvent::FirstRoundCompleted);
        }

        let kinds_budget = self.max_kinds.clamp(1, SigilKind::COUNT);
        let mut kinds = SigilKind::ALL;
        kinds.shuffle(&mut self.rng);
        let active = &kinds[..kinds_budget];

        let center = self.grid.center();
        let mut candidates: Vec<usize> =
            (0..self.grid.cell_count()).filter(|&cell| cell != center).collect();
        candidates.shuffle(&mut self.rng);

        if self.endless_force_cell_zero {
            if center == 0 {
                warn!("force-include cell 0 requested, but cell 0 is the center; skipping");
            } else {
                candidates.retain(|&cell| cell != 0);
                candidates.insert(0, 0);
            }
        }

        let to_select = (round as usize)
            .clamp(1, self.grid.max_selectable())
            .min(candidates.len());

        let mut selection = RoundSelection::new();
        for &cell in candidates.iter().take(to_select) {
            let kind = active
                .choose(&mut self.rng)
                .copied()
                .unwrap_or(SigilKind::Salt);
            selection.insert(cell, kind);
        }
        self.current = selection;

        self.outcome.generated_cells = self.current.len();
        self.outcome.applied_cells = self.current.len();
        self.outcome.applied_kinds = kinds_budget;
        self.outcome.status = "generated endless round.".to_string();
        debug!("endless round {round}: selected {:?}", self.current);
    }

    /// Record the result of an Endless validation pass. Successes accumulate
    /// score; the first failure freezes and returns the final score.
    pub fn record_endless_result(&mut self, round_valid: bool) -> Option<EndlessScore> {
        if round_valid {
            self.endless_score.rounds_completed += 1;
            self.endless_score.cells_completed += self.current.len() as u32;
            return None;
        }
        if self.endless_score_frozen {
            return None;
        }
        self.endless_score_frozen = true;
        Some(self.endless_score)
    }

    /// Clear Endless score tracking at the start of a new Endless run.
    pub fn reset_endless_score(&mut self) {
        self.endless_score = EndlessScore::default();
        self.endless_score_frozen = false;
    }

    // --- Shared draw pipeline --------------------------------------------

    /// The common draw used by the standard, scenario and timeline drivers:
    /// assumes `target_count`/`max_kinds` are already clamped.
    fn draw_round(&mut self, round: u32) {
        let round = round.max(1);
        // Solved flags are per-validation-attempt scratch state.
        self.solved.clear();
        self.assignments.randomize(&mut self.rng);

        // Reaching round 2 implies round 1 completed; the unlock
        // collaborator consumes this exactly once per run.
        if round == 2 {
            self.events.push(RoundEvent::FirstRoundCompleted);
        }

        self.refresh_eligibility_mask(round);

        let kinds_budget = self.max_kinds.clamp(1, SigilKind::COUNT);
        let mut active_kinds: BTreeSet<SigilKind> = self
            .history
            .values()
            .flat_map(|selection| selection.values().copied())
            .collect();

        if round == 1 {
            // First round always opens with two kinds.
            let mut all = SigilKind::ALL;
            all.shuffle(&mut self.rng);
            active_kinds = all[..2].iter().copied().collect();
        } else if active_kinds.len() < kinds_budget {
            let unused: SmallVec<[SigilKind; 4]> = SigilKind::ALL
                .iter()
                .copied()
                .filter(|kind| !active_kinds.contains(kind))
                .collect();
            if let Some(&new_kind) = unused.choose(&mut self.rng) {
                active_kinds.insert(new_kind);
            }
        }

        let mut active: SmallVec<[SigilKind; 4]> = active_kinds.into_iter().collect();
        if active.len() > kinds_budget {
            active.shuffle(&mut self.rng);
            active.truncate(kinds_budget);
        }

        let prior_cells: BTreeSet<usize> = self
            .history
            .values()
            .flat_map(|selection| selection.keys().copied())
            .collect();

        let center = self.grid.center();
        let mut to_select = self
            .target_count
            .min(self.grid.max_selectable().saturating_sub(prior_cells.len()));

        let mut candidates: Vec<usize> = (0..self.grid.cell_count())
            .filter(|&cell| {
                cell != center
                    && !prior_cells.contains(&cell)
                    && self.allowed_this_round.contains(&cell)
            })
            .collect();
        candidates.shuffle(&mut self.rng);

        let mut forced_kinds: Vec<SigilKind> = Vec::new();
        if let Some(forced) = self.forced.clone() {
            if forced.round == round {
                let mut picks: Vec<usize> = Vec::new();
                for &cell in &forced.cells {
                    if !self.grid.contains_index(cell) {
                        warn!("forced cell {cell} out of range; skipping");
                        continue;
                    }
                    if cell == center {
                        warn!("forced cell {cell} is the center; skipping");
                        continue;
                    }
                    if !forced.ignore_restriction_and_history
                        && (prior_cells.contains(&cell)
                            || !self.allowed_this_round.contains(&cell))
                    {
                        warn!("forced cell {cell} violates restriction or history; skipping");
                        continue;
                    }
                    if !picks.contains(&cell) {
                        picks.push(cell);
                    }
                }
                debug!("forcing selections for round {round}: {picks:?}");
                to_select = picks.len();
                candidates = picks;
                forced_kinds = forced.kinds;
            }
        }

        let to_select = to_select.min(candidates.len());

        let mut selection = RoundSelection::new();
        for (slot, &cell) in candidates.iter().take(to_select).enumerate() {
            let kind = forced_kinds
                .get(slot)
                .copied()
                .or_else(|| active.choose(&mut self.rng).copied())
                .unwrap_or(SigilKind::Salt);
            selection.insert(cell, kind);
        }
        self.current = selection;
        self.history.insert(round, self.current.clone());

        self.outcome.generated_cells = self.current.len();
        self.outcome.applied_kinds = active.len();
        debug!("round {round}: selected {:?}", self.current);
    }

    fn candidate_count(&self) -> usize {
        let center = self.grid.center();
        let prior_cells: BTreeSet<usize> = self
            .history
            .values()
            .flat_map(|selection| selection.keys().copied())
            .collect();
        (0..self.grid.cell_count())
            .filter(|&cell| {
                cell != center
                    && !prior_cells.contains(&cell)
                    && self.allowed_this_round.contains(&cell)
            })
            .count()
    }

    // --- Queries and bookkeeping -----------------------------------------

    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    #[must_use]
    pub const fn selection(&self) -> &RoundSelection {
        &self.current
    }

    #[must_use]
    pub const fn history(&self) -> &BTreeMap<u32, RoundSelection> {
        &self.history
    }

    #[must_use]
    pub fn round_selection(&self, round: u32) -> Option<&RoundSelection> {
        self.history.get(&round)
    }

    /// Whether this cell was a target in any recorded round. Distinct from
    /// the solved flag, which is cleared on every generation.
    #[must_use]
    pub fn was_ever_selected(&self, cell: usize) -> bool {
        self.history
            .values()
            .any(|selection| selection.contains_key(&cell))
    }

    /// Unique cells selected across all recorded rounds, center excluded.
    #[must_use]
    pub fn total_unique_selected(&self) -> usize {
        let center = self.grid.center();
        let unique: BTreeSet<usize> = self
            .history
            .values()
            .flat_map(|selection| selection.keys().copied())
            .filter(|&cell| cell != center)
            .collect();
        unique.len()
    }

    /// True when every non-center cell has been selected at least once.
    #[must_use]
    pub fn is_grid_fully_selected(&self) -> bool {
        self.total_unique_selected() >= self.grid.max_selectable()
    }

    pub fn set_solved(&mut self, cell: usize, solved: bool) {
        if solved {
            self.solved.insert(cell);
        } else {
            self.solved.remove(&cell);
        }
    }

    #[must_use]
    pub fn is_solved(&self, cell: usize) -> bool {
        self.solved.contains(&cell)
    }

    /// Commit the current round: its cells can no longer change. Called by
    /// the Director after a passing validation outside Endless.
    pub fn lock_current_round(&mut self) {
        let cells: Vec<usize> = self.current.keys().copied().collect();
        self.locked.extend(cells);
    }

    #[must_use]
    pub fn is_locked(&self, cell: usize) -> bool {
        self.locked.contains(&cell)
    }

    #[must_use]
    pub const fn eligibility_mask(&self) -> &BTreeSet<usize> {
        &self.allowed_this_round
    }

    #[must_use]
    pub const fn assignments(&self) -> &ItemAssignments {
        &self.assignments
    }

    #[must_use]
    pub const fn profile(&self) -> &RestrictionProfile {
        &self.profile
    }

    pub fn set_profile(&mut self, profile: RestrictionProfile) {
        self.profile = profile;
    }

    pub fn set_target_count(&mut self, count: usize) {
        self.target_count = count.clamp(1, self.grid.max_selectable());
    }

    pub fn set_max_kinds(&mut self, max_kinds: usize) {
        self.max_kinds = max_kinds.clamp(1, SigilKind::COUNT);
    }

    pub fn set_forced_selection(&mut self, forced: Option<ForcedSelection>) {
        self.forced = forced;
    }

    pub fn set_endless_force_cell_zero(&mut self, enabled: bool) {
        self.endless_force_cell_zero = enabled;
    }

    #[must_use]
    pub const fn endless_score(&self) -> EndlessScore {
        self.endless_score
    }

    #[must_use]
    pub const fn timeline_loaded(&self) -> bool {
        self.timeline_loaded
    }

    #[must_use]
    pub const fn timeline(&self) -> Option<&TimelineConfig> {
        self.timeline.as_ref()
    }

    #[must_use]
    pub const fn outcome(&self) -> &RoundOutcome {
        &self.outcome
    }

    /// Take all pending generation events.
    pub fn drain_events(&mut self) -> Vec<RoundEvent> {
        std::mem::take(&mut self.events)
    }
}
