//! The Traveler: the patrol agent that walks the grid each round, visiting
//! every target cell ("hint") before retreating.
//!
//! The Traveler is a fixed-step state machine driven by [`Traveler::tick`].
//! It never validates placements and never mutates the Round Generator; it
//! only reads a snapshot taken at [`Traveler::init_run`] and raises signals
//! for the Director to act on (camera turns, hint reveals, completion).
//!
//! Stale-run protection: every `init_run` bumps a run token, and approach
//! notifications carrying an old token are ignored. This keeps callbacks
//! from an abandoned run (round skip, reset) from advancing the new one.

pub mod path;

use std::collections::{BTreeSet, VecDeque};

use log::debug;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::grid::{classify_approach, Approach, Grid, Pos};
use crate::rounds::RoundGenerator;
use crate::PlacementProbe;

/// Tuning knobs for the patrol. All durations are in seconds and speeds in
/// cells per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelerOptions {
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// Pause on reaching a hint cell.
    #[serde(default = "default_second")]
    pub pause_duration: f32,
    /// Pause before walking a segment that changes direction.
    #[serde(default = "default_second")]
    pub turn_pause: f32,
    /// Delay between the approach finishing and the first step.
    #[serde(default = "default_second")]
    pub start_delay: f32,
    /// Re-pick the nearest remaining hint after every visit. When off, the
    /// visit order computed at init is followed as-is.
    #[serde(default = "default_true")]
    pub consume_hints: bool,
    /// Drop hints whose cells are already solved from the patrol.
    #[serde(default)]
    pub skip_solved_hints: bool,
    /// Pick the next hint uniformly at random instead of nearest-first.
    #[serde(default)]
    pub randomize_next_hint: bool,
    /// Refuse corner starts directly adjacent to a hint.
    #[serde(default)]
    pub avoid_corner_adjacent_to_hint: bool,
    /// Start the next round from the current position instead of a corner,
    /// provided the previous round completed.
    #[serde(default = "default_true")]
    pub continue_between_rounds: bool,
    pub enable_speed_up: bool,
    /// Speed-up only applies while the external gate allows it.
    #[serde(default = "default_true")]
    pub speed_up_requires_gate: bool,
    #[serde(default = "default_multiplier")]
    pub speed_up_multiplier: f32,
    /// After all hints are visited, investigate stray markers before
    /// retreating.
    pub enable_sniff: bool,
    #[serde(default = "default_true")]
    pub sniff_requires_gate: bool,
    /// Fixed start cell for reproduction of specific routes.
    #[serde(default)]
    pub debug_force_start: Option<usize>,
}

impl Default for TravelerOptions {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            pause_duration: default_second(),
            turn_pause: default_second(),
            start_delay: default_second(),
            consume_hints: true,
            skip_solved_hints: false,
            randomize_next_hint: false,
            avoid_corner_adjacent_to_hint: false,
            continue_between_rounds: true,
            enable_speed_up: false,
            speed_up_requires_gate: true,
            speed_up_multiplier: default_multiplier(),
            enable_sniff: false,
            sniff_requires_gate: true,
            debug_force_start: None,
        }
    }
}

fn default_speed() -> f32 {
    5.0
}

fn default_second() -> f32 {
    1.0
}

fn default_multiplier() -> f32 {
    2.0
}

fn default_true() -> bool {
    true
}

/// Where the patrol currently is in its run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TravelerPhase {
    /// No run initialized.
    Idle,
    /// Waiting for the Director's approach cinematic to finish.
    AwaitingApproach,
    StartDelay { remaining: f32 },
    Walking,
    PausedAtHint { remaining: f32 },
    PausedForTurn { remaining: f32, next_dir: Pos },
    /// Run finished; the patrol has retreated.
    Complete,
}

/// Events raised during a run, drained by the Director each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelerSignal {
    HintReached { cell: usize },
    SniffReached { cell: usize },
    Turn { angle: u16, approach: Approach },
    PatternComplete,
}

pub struct Traveler {
    options: TravelerOptions,
    grid: Grid,
    rng: ChaCha20Rng,
    run_token: u64,
    phase: TravelerPhase,
    fx: f32,
    fy: f32,
    has_position: bool,
    last_dir: Pos,
    current_target: Pos,
    route: VecDeque<Pos>,
    // Snapshot taken at init_run; the generator may move on underneath us.
    hint_cells: BTreeSet<usize>,
    hint_order: VecDeque<usize>,
    off_limits_for_sniff: BTreeSet<usize>,
    visited_sniff: BTreeSet<usize>,
    sniffing: bool,
    signals: Vec<TravelerSignal>,
    externally_paused: bool,
    speed_up_allowed: bool,
    speed_up_held: bool,
    sniff_allowed: bool,
    last_round_completed: bool,
    force_corner_next: bool,
    pattern_complete: bool,
}

impl Traveler {
    #[must_use]
    pub fn new(options: TravelerOptions, seed: u64) -> Self {
        Self {
            options,
            grid: Grid::default(),
            rng: ChaCha20Rng::seed_from_u64(seed),
            run_token: 0,
            phase: TravelerPhase::Idle,
            fx: 0.0,
            fy: 0.0,
            has_position: false,
            last_dir: Pos::ZERO,
            current_target: Pos::ZERO,
            route: VecDeque::new(),
            hint_cells: BTreeSet::new(),
            hint_order: VecDeque::new(),
            off_limits_for_sniff: BTreeSet::new(),
            visited_sniff: BTreeSet::new(),
            sniffing: false,
            signals: Vec::new(),
            externally_paused: false,
            speed_up_allowed: false,
            speed_up_held: false,
            sniff_allowed: false,
            last_round_completed: false,
            force_corner_next: false,
            pattern_complete: false,
        }
    }

    /// Begin a new run against the generator's current round. Snapshots the
    /// hint cells, picks a start, routes to the first hint, and returns the
    /// new run token. The patrol then waits in [`TravelerPhase::AwaitingApproach`]
    /// unless it is continuing from its previous position.
    pub fn init_run(&mut self, generator: &RoundGenerator) -> u64 {
        self.run_token += 1;
        self.grid = generator.grid().clone();
        self.signals.clear();
        self.route.clear();
        self.last_dir = Pos::ZERO;
        self.pattern_complete = false;
        self.sniffing = false;
        self.visited_sniff.clear();

        self.hint_cells = generator
            .selection()
            .keys()
            .copied()
            .filter(|&cell| !(self.options.skip_solved_hints && generator.is_solved(cell)))
            .collect();

        // Cells that a sniff detour must never target: anything that is or
        // ever was a real target, plus anything already solved.
        self.off_limits_for_sniff = (0..self.grid.cell_count())
            .filter(|&cell| {
                generator.selection().contains_key(&cell)
                    || generator.was_ever_selected(cell)
                    || generator.is_solved(cell)
            })
            .collect();

        let continuing = self.options.continue_between_rounds
            && self.last_round_completed
            && self.has_position
            && !self.force_corner_next
            && self.options.debug_force_start.is_none();
        self.force_corner_next = false;

        let start = if let Some(forced) = self.options.debug_force_start {
            if self.grid.contains_index(forced) && forced != self.grid.center() {
                self.grid.pos_of(forced)
            } else {
                self.pick_corner_start()
            }
        } else if continuing {
            self.grid.snap(self.fx, self.fy)
        } else {
            self.pick_corner_start()
        };

        self.fx = start.x as f32;
        self.fy = start.y as f32;
        self.has_position = true;

        self.hint_order = self.plan_visit_order(start);

        if let Some(cell) = self.next_hint(start) {
            self.current_target = self.grid.pos_of(cell);
            self.route = path::route_to(start, self.current_target);
        } else {
            self.current_target = start;
        }

        self.phase = if continuing {
            TravelerPhase::Walking
        } else {
            TravelerPhase::AwaitingApproach
        };

        debug!(
            "run {} initialized: start {start:?}, {} hints",
            self.run_token,
            self.hint_cells.len()
        );
        self.run_token
    }

    /// The Director's approach cinematic finished. Ignored when the token is
    /// stale or the patrol is not waiting for it.
    pub fn notify_approach_complete(&mut self, token: u64) {
        if token != self.run_token {
            debug!("stale approach notification (token {token}); ignoring");
            return;
        }
        if self.phase == TravelerPhase::AwaitingApproach {
            self.phase = if self.options.start_delay > 0.0 {
                TravelerPhase::StartDelay {
                    remaining: self.options.start_delay,
                }
            } else {
                TravelerPhase::Walking
            };
        }
    }

    /// Advance the patrol by `dt` seconds. A non-positive `dt`, an external
    /// pause, or a phase with nothing to do are all no-ops.
    pub fn tick(&mut self, dt: f32, probe: &dyn PlacementProbe) {
        if dt <= 0.0 || self.externally_paused {
            return;
        }
        match self.phase {
            TravelerPhase::Idle | TravelerPhase::AwaitingApproach | TravelerPhase::Complete => {}
            TravelerPhase::StartDelay { remaining } => {
                let remaining = remaining - dt;
                self.phase = if remaining <= 0.0 {
                    TravelerPhase::Walking
                } else {
                    TravelerPhase::StartDelay { remaining }
                };
            }
            TravelerPhase::PausedAtHint { remaining } => {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    self.route_onward(probe);
                } else {
                    self.phase = TravelerPhase::PausedAtHint { remaining };
                }
            }
            TravelerPhase::PausedForTurn {
                remaining,
                next_dir,
            } => {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    self.last_dir = next_dir;
                    self.phase = TravelerPhase::Walking;
                } else {
                    self.phase = TravelerPhase::PausedForTurn {
                        remaining,
                        next_dir,
                    };
                }
            }
            TravelerPhase::Walking => self.tick_walking(dt, probe),
        }
    }

    fn tick_walking(&mut self, dt: f32, probe: &dyn PlacementProbe) {
        let mut budget = self.effective_speed() * dt;
        loop {
            let Some(&next) = self.route.front() else {
                self.arrive(probe);
                return;
            };
            let dx = next.x as f32 - self.fx;
            let dy = next.y as f32 - self.fy;
            let dist = dx.abs() + dy.abs();
            if dist <= f32::EPSILON {
                self.route.pop_front();
                continue;
            }

            // Turns are detected at segment start, while still on a cell.
            if self.on_lattice() {
                let here = self.grid.snap(self.fx, self.fy);
                let dir = (next - here).signum();
                if self.last_dir != Pos::ZERO && dir != self.last_dir {
                    self.begin_turn_pause(here, dir);
                    return;
                }
                self.last_dir = dir;
            }

            if budget <= 0.0 {
                return;
            }
            let step = budget.min(dist);
            if dx.abs() > 0.0 {
                self.fx += dx.signum() * step;
            } else {
                self.fy += dy.signum() * step;
            }
            budget -= step;

            if step >= dist - f32::EPSILON {
                self.fx = next.x as f32;
                self.fy = next.y as f32;
                self.route.pop_front();
                // An unconsumed hint passed through mid-route counts as an
                // arrival; the rest of the route is recomputed after the
                // pause.
                let cell = self.grid.index_of(next);
                if !self.sniffing && self.hint_cells.contains(&cell) {
                    self.route.clear();
                }
                if self.route.is_empty() {
                    self.arrive(probe);
                    return;
                }
            } else {
                return;
            }
        }
    }

    fn begin_turn_pause(&mut self, here: Pos, dir: Pos) {
        let angle = if dir == -self.last_dir { 180 } else { 90 };
        let approach = classify_approach(&self.grid, here, here + dir);
        self.signals.push(TravelerSignal::Turn { angle, approach });
        self.phase = TravelerPhase::PausedForTurn {
            remaining: self.options.turn_pause,
            next_dir: dir,
        };
    }

    fn arrive(&mut self, probe: &dyn PlacementProbe) {
        let here = self.grid.snap(self.fx, self.fy);
        let cell = self.grid.index_of(here);

        if self.sniffing {
            self.visited_sniff.insert(cell);
            self.signals.push(TravelerSignal::SniffReached { cell });
            if !self.begin_sniff(probe, here) {
                self.complete_run();
            }
            return;
        }

        if self.hint_cells.remove(&cell) {
            self.signals.push(TravelerSignal::HintReached { cell });
            if self.options.pause_duration > 0.0 {
                self.phase = TravelerPhase::PausedAtHint {
                    remaining: self.options.pause_duration,
                };
            } else {
                self.route_onward(probe);
            }
            return;
        }

        // Arrived somewhere with nothing to do (empty initial route, or a
        // hint dropped mid-walk): just keep going.
        self.route_onward(probe);
    }

    fn route_onward(&mut self, probe: &dyn PlacementProbe) {
        let here = self.grid.snap(self.fx, self.fy);
        if let Some(cell) = self.next_hint(here) {
            self.current_target = self.grid.pos_of(cell);
            self.route = path::route_to(here, self.current_target);
            self.phase = TravelerPhase::Walking;
        } else if self.begin_sniff(probe, here) {
            // Phase set inside.
        } else {
            self.complete_run();
        }
    }

    /// Next hint to walk to. Nearest-first when hints are consumed
    /// dynamically, otherwise the order planned at init.
    fn next_hint(&mut self, from: Pos) -> Option<usize> {
        if self.hint_cells.is_empty() {
            return None;
        }
        if self.options.randomize_next_hint {
            let pool: Vec<usize> = self.hint_cells.iter().copied().collect();
            return pool.choose(&mut self.rng).copied();
        }
        if self.options.consume_hints {
            let nearest = path::nearest_by_manhattan(
                from,
                self.hint_cells.iter().map(|&cell| self.grid.pos_of(cell)),
            )?;
            Some(self.grid.index_of(nearest))
        } else {
            while let Some(cell) = self.hint_order.pop_front() {
                if self.hint_cells.contains(&cell) {
                    return Some(cell);
                }
            }
            None
        }
    }

    /// Greedy nearest-first visit order, fixed at init.
    fn plan_visit_order(&self, start: Pos) -> VecDeque<usize> {
        let mut order = VecDeque::new();
        let mut pool = self.hint_cells.clone();
        let mut cursor = start;
        while !pool.is_empty() {
            let Some(next) = path::nearest_by_manhattan(
                cursor,
                pool.iter().map(|&cell| self.grid.pos_of(cell)),
            ) else {
                break;
            };
            let cell = self.grid.index_of(next);
            pool.remove(&cell);
            order.push_back(cell);
            cursor = next;
        }
        order
    }

    /// Start (or continue) the sniff detour: walk to the nearest stray
    /// marker that was never a target. Returns false when sniffing is
    /// disabled, gated off, or there is nothing left to investigate.
    fn begin_sniff(&mut self, probe: &dyn PlacementProbe, here: Pos) -> bool {
        if !self.options.enable_sniff {
            return false;
        }
        if self.options.sniff_requires_gate && !self.sniff_allowed {
            return false;
        }
        let center = self.grid.center();
        let candidates = (0..self.grid.cell_count()).filter(|&cell| {
            cell != center
                && probe.has_marker(cell)
                && !self.off_limits_for_sniff.contains(&cell)
                && !self.visited_sniff.contains(&cell)
        });
        let Some(target) = path::nearest_by_manhattan(
            here,
            candidates.map(|cell| self.grid.pos_of(cell)),
        ) else {
            return false;
        };
        self.sniffing = true;
        self.current_target = target;
        self.route = path::route_to(here, target);
        self.phase = TravelerPhase::Walking;
        true
    }

    fn complete_run(&mut self) {
        self.sniffing = false;
        self.pattern_complete = true;
        self.last_round_completed = true;
        self.phase = TravelerPhase::Complete;
        self.signals.push(TravelerSignal::PatternComplete);
        debug!("run {} complete", self.run_token);
    }

    fn pick_corner_start(&mut self) -> Pos {
        let corners = self.grid.corners();
        let mut pool: Vec<usize> = corners.to_vec();
        if self.options.avoid_corner_adjacent_to_hint && !self.hint_cells.is_empty() {
            let filtered: Vec<usize> = pool
                .iter()
                .copied()
                .filter(|&corner| {
                    let corner_pos = self.grid.pos_of(corner);
                    self.hint_cells
                        .iter()
                        .map(|&cell| corner_pos.manhattan(self.grid.pos_of(cell)))
                        .min()
                        .is_none_or(|nearest| nearest > 1)
                })
                .collect();
            if !filtered.is_empty() {
                pool = filtered;
            }
        }
        let corner = pool.choose(&mut self.rng).copied().unwrap_or(corners[0]);
        self.grid.pos_of(corner)
    }

    fn effective_speed(&self) -> f32 {
        let gated_open = !self.options.speed_up_requires_gate || self.speed_up_allowed;
        if self.options.enable_speed_up && gated_open && self.speed_up_held {
            self.options.speed * self.options.speed_up_multiplier
        } else {
            self.options.speed
        }
    }

    fn on_lattice(&self) -> bool {
        (self.fx - self.fx.round()).abs() < 1e-4 && (self.fy - self.fy.round()).abs() < 1e-4
    }

    // --- External controls -----------------------------------------------

    pub fn set_paused(&mut self, paused: bool) {
        self.externally_paused = paused;
    }

    /// Force the next `init_run` to start from a corner even when the
    /// continue-between-rounds option would keep the current position.
    pub fn force_corner_next_init(&mut self) {
        self.force_corner_next = true;
    }

    pub fn set_speed_up_allowed(&mut self, allowed: bool) {
        self.speed_up_allowed = allowed;
    }

    pub fn set_speed_up_held(&mut self, held: bool) {
        self.speed_up_held = held;
    }

    /// Gate the sniff detour. Disallowing also forgets which stray markers
    /// were already investigated.
    pub fn set_sniff_allowed(&mut self, allowed: bool) {
        self.sniff_allowed = allowed;
        if !allowed {
            self.visited_sniff.clear();
        }
    }

    /// Abandon the current run without completing it.
    pub fn reset_run(&mut self) {
        self.run_token += 1;
        self.phase = TravelerPhase::Idle;
        self.route.clear();
        self.signals.clear();
        self.hint_cells.clear();
        self.hint_order.clear();
        self.sniffing = false;
        self.pattern_complete = false;
        self.last_round_completed = false;
        self.has_position = false;
    }

    /// Take all pending signals.
    pub fn drain_signals(&mut self) -> Vec<TravelerSignal> {
        std::mem::take(&mut self.signals)
    }

    // --- Queries ---------------------------------------------------------

    #[must_use]
    pub const fn phase(&self) -> TravelerPhase {
        self.phase
    }

    #[must_use]
    pub const fn run_token(&self) -> u64 {
        self.run_token
    }

    #[must_use]
    pub const fn position(&self) -> (f32, f32) {
        (self.fx, self.fy)
    }

    #[must_use]
    pub fn cell(&self) -> Pos {
        self.grid.snap(self.fx, self.fy)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == TravelerPhase::Complete
    }

    /// Whether the current run has visited everything it set out to.
    #[must_use]
    pub const fn pattern_complete(&self) -> bool {
        self.pattern_complete
    }

    /// The cell the patrol is currently walking toward.
    #[must_use]
    pub const fn current_target(&self) -> Pos {
        self.current_target
    }

    /// Classification of the segment currently being walked, if any. The
    /// segment is reconstructed from the next queued cell and the last move
    /// direction, so between segments this reports the segment just
    /// finished.
    #[must_use]
    pub fn current_approach(&self) -> Option<Approach> {
        let &next = self.route.front()?;
        if self.last_dir == Pos::ZERO {
            return None;
        }
        Some(classify_approach(&self.grid, next - self.last_dir, next))
    }

    /// Continuous form of [`Self::current_approach`] for external FX:
    /// 1.0 closing on the center, 0.0 retreating, 0.5 lateral or not
    /// walking.
    #[must_use]
    pub fn move_toward01(&self) -> f32 {
        match self.current_approach() {
            Some(Approach::Toward) => 1.0,
            Some(Approach::Away) => 0.0,
            _ => 0.5,
        }
    }

    #[must_use]
    pub fn remaining_hints(&self) -> usize {
        self.hint_cells.len()
    }

    #[must_use]
    pub const fn last_round_completed(&self) -> bool {
        self.last_round_completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rounds::ForcedSelection;
    use crate::sigil::SigilKind;
    use crate::NoPlacements;

    fn forced_generator(cells: &[usize]) -> RoundGenerator {
        let mut generator = RoundGenerator::new(Grid::default(), 99);
        generator.set_forced_selection(Some(ForcedSelection {
            round: 1,
            cells: cells.to_vec(),
            kinds: vec![SigilKind::Salt; cells.len()],
            ignore_restriction_and_history: true,
        }));
        generator.generate_standard_round(1);
        generator
    }

    fn quick_options(start: usize) -> TravelerOptions {
        TravelerOptions {
            speed: 10.0,
            pause_duration: 0.0,
            turn_pause: 0.1,
            start_delay: 0.0,
            debug_force_start: Some(start),
            ..TravelerOptions::default()
        }
    }

    fn run_to_completion(traveler: &mut Traveler, token: u64) -> Vec<TravelerSignal> {
        traveler.notify_approach_complete(token);
        for _ in 0..1_000 {
            if traveler.is_complete() {
                break;
            }
            traveler.tick(0.05, &NoPlacements);
        }
        assert!(traveler.is_complete(), "patrol never completed");
        traveler.drain_signals()
    }

    #[test]
    fn visits_every_hint_then_completes() {
        let generator = forced_generator(&[1, 3, 10]);
        let mut traveler = Traveler::new(quick_options(0), 7);
        let token = traveler.init_run(&generator);
        assert_eq!(traveler.phase(), TravelerPhase::AwaitingApproach);
        assert!(!traveler.last_round_completed());
        // Nearest hint from the forced (0,0) start.
        assert_eq!(traveler.current_target(), Pos::new(1, 0));

        let signals = run_to_completion(&mut traveler, token);
        for cell in [1, 3, 10] {
            assert!(
                signals.contains(&TravelerSignal::HintReached { cell }),
                "hint {cell} never reached"
            );
        }
        assert_eq!(signals.last(), Some(&TravelerSignal::PatternComplete));
        assert_eq!(traveler.remaining_hints(), 0);
        assert!(traveler.last_round_completed());
    }

    #[test]
    fn stale_approach_token_is_ignored() {
        let generator = forced_generator(&[1]);
        let mut traveler = Traveler::new(quick_options(0), 7);
        let token = traveler.init_run(&generator);

        traveler.notify_approach_complete(token + 5);
        assert_eq!(traveler.phase(), TravelerPhase::AwaitingApproach);
        traveler.tick(1.0, &NoPlacements);
        assert_eq!(traveler.phase(), TravelerPhase::AwaitingApproach);

        traveler.notify_approach_complete(token);
        assert_ne!(traveler.phase(), TravelerPhase::AwaitingApproach);
    }

    #[test]
    fn straight_walk_never_turns() {
        // Start (0,0), single hint at (0,2): one axis, no direction change.
        let generator = forced_generator(&[10]);
        let mut traveler = Traveler::new(quick_options(0), 7);
        let token = traveler.init_run(&generator);

        let signals = run_to_completion(&mut traveler, token);
        assert!(!signals
            .iter()
            .any(|signal| matches!(signal, TravelerSignal::Turn { .. })));
    }

    #[test]
    fn direction_change_pauses_with_right_angle() {
        // (0,0) -> hint (0,2) walks +y; then (0,2) -> hint (4,2) walks +x.
        let generator = forced_generator(&[10, 14]);
        let mut traveler = Traveler::new(quick_options(0), 7);
        let token = traveler.init_run(&generator);

        let signals = run_to_completion(&mut traveler, token);
        let turns: Vec<&TravelerSignal> = signals
            .iter()
            .filter(|signal| matches!(signal, TravelerSignal::Turn { .. }))
            .collect();
        assert_eq!(turns.len(), 1);
        assert!(matches!(
            turns[0],
            TravelerSignal::Turn { angle: 90, .. }
        ));
    }

    #[test]
    fn reversal_is_a_half_turn() {
        // Start (2,0); nearest hint is (1,0), then back across to (3,0).
        let generator = forced_generator(&[1, 3]);
        let mut traveler = Traveler::new(quick_options(2), 7);
        let token = traveler.init_run(&generator);

        let signals = run_to_completion(&mut traveler, token);
        assert!(signals
            .iter()
            .any(|signal| matches!(signal, TravelerSignal::Turn { angle: 180, .. })));
    }

    #[test]
    fn hints_are_visited_nearest_first() {
        // From (0,0): cell 1 at distance 1, cell 9 (4,1) at distance 5.
        let generator = forced_generator(&[9, 1]);
        let mut traveler = Traveler::new(quick_options(0), 7);
        let token = traveler.init_run(&generator);

        let signals = run_to_completion(&mut traveler, token);
        let hints: Vec<usize> = signals
            .iter()
            .filter_map(|signal| match signal {
                TravelerSignal::HintReached { cell } => Some(*cell),
                _ => None,
            })
            .collect();
        assert_eq!(hints, vec![1, 9]);
    }

    #[test]
    fn empty_round_completes_immediately() {
        let generator = forced_generator(&[]);
        let mut traveler = Traveler::new(quick_options(0), 7);
        let token = traveler.init_run(&generator);

        let signals = run_to_completion(&mut traveler, token);
        assert_eq!(signals, vec![TravelerSignal::PatternComplete]);
    }

    #[test]
    fn solved_hints_can_be_skipped() {
        let mut generator = forced_generator(&[1, 3]);
        generator.set_solved(3, true);
        let options = TravelerOptions {
            skip_solved_hints: true,
            ..quick_options(0)
        };
        let mut traveler = Traveler::new(options, 7);
        let token = traveler.init_run(&generator);

        let signals = run_to_completion(&mut traveler, token);
        assert!(signals.contains(&TravelerSignal::HintReached { cell: 1 }));
        assert!(!signals.contains(&TravelerSignal::HintReached { cell: 3 }));
    }

    #[test]
    fn corner_starts_avoid_hint_adjacent_corners() {
        // A hint at (1,0) sits next to corner (0,0); that corner must never
        // be drawn as a start when the avoidance option is on.
        let generator = forced_generator(&[1]);
        for seed in 0..20 {
            let mut options = quick_options(0);
            options.debug_force_start = None;
            options.avoid_corner_adjacent_to_hint = true;
            let mut traveler = Traveler::new(options, seed);
            traveler.init_run(&generator);
            assert_ne!(traveler.cell(), Pos::new(0, 0), "seed {seed}");
        }
    }

    #[test]
    fn move_toward01_tracks_the_current_segment() {
        // Hint at (1,0): walking (0,0) -> (1,0) closes on the center.
        let generator = forced_generator(&[1]);
        let mut traveler = Traveler::new(quick_options(0), 7);
        let token = traveler.init_run(&generator);

        // Nothing walked yet: neutral.
        assert_eq!(traveler.current_approach(), None);
        assert_eq!(traveler.move_toward01(), 0.5);

        traveler.notify_approach_complete(token);
        traveler.tick(0.05, &NoPlacements); // half a cell in
        assert_eq!(traveler.current_approach(), Some(Approach::Toward));
        assert_eq!(traveler.move_toward01(), 1.0);

        // Hint at (0,0): walking (1,0) -> (0,0) retreats from the center.
        let generator = forced_generator(&[0]);
        let mut traveler = Traveler::new(quick_options(1), 7);
        let token = traveler.init_run(&generator);
        traveler.notify_approach_complete(token);
        traveler.tick(0.05, &NoPlacements);
        assert_eq!(traveler.current_approach(), Some(Approach::Away));
        assert_eq!(traveler.move_toward01(), 0.0);
    }

    #[test]
    fn external_pause_freezes_movement() {
        let generator = forced_generator(&[14]);
        let mut traveler = Traveler::new(quick_options(0), 7);
        let token = traveler.init_run(&generator);
        traveler.notify_approach_complete(token);

        traveler.set_paused(true);
        let before = traveler.position();
        for _ in 0..20 {
            traveler.tick(0.1, &NoPlacements);
        }
        assert_eq!(traveler.position(), before);

        traveler.set_paused(false);
        traveler.tick(0.1, &NoPlacements);
        assert_ne!(traveler.position(), before);
    }

    #[test]
    fn speed_up_applies_only_when_gated_open_and_held() {
        let options = TravelerOptions {
            speed: 1.0,
            enable_speed_up: true,
            speed_up_requires_gate: true,
            speed_up_multiplier: 3.0,
            ..quick_options(0)
        };
        let generator = forced_generator(&[4]);

        // Held but not allowed: base speed, one cell per second.
        let mut slow = Traveler::new(options.clone(), 7);
        let token = slow.init_run(&generator);
        slow.notify_approach_complete(token);
        slow.set_speed_up_held(true);
        slow.tick(1.0, &NoPlacements);
        assert_eq!(slow.cell(), Pos::new(1, 0));

        // Allowed and held: three cells in the same time.
        let mut fast = Traveler::new(options, 7);
        let token = fast.init_run(&generator);
        fast.notify_approach_complete(token);
        fast.set_speed_up_allowed(true);
        fast.set_speed_up_held(true);
        fast.tick(1.0, &NoPlacements);
        assert_eq!(fast.cell(), Pos::new(3, 0));
    }

    #[test]
    fn sniff_investigates_stray_markers_after_hints() {
        struct Markers(Vec<usize>);
        impl PlacementProbe for Markers {
            fn has_marker(&self, cell: usize) -> bool {
                self.0.contains(&cell)
            }
        }

        let generator = forced_generator(&[1]);
        let options = TravelerOptions {
            enable_sniff: true,
            sniff_requires_gate: false,
            ..quick_options(0)
        };
        let mut traveler = Traveler::new(options, 7);
        let token = traveler.init_run(&generator);
        traveler.notify_approach_complete(token);

        // Marker on the hint cell is off-limits; marker on cell 3 is not.
        let probe = Markers(vec![1, 3]);
        for _ in 0..1_000 {
            if traveler.is_complete() {
                break;
            }
            traveler.tick(0.05, &probe);
        }
        let signals = traveler.drain_signals();
        assert!(signals.contains(&TravelerSignal::SniffReached { cell: 3 }));
        assert!(!signals.contains(&TravelerSignal::SniffReached { cell: 1 }));
        assert_eq!(signals.last(), Some(&TravelerSignal::PatternComplete));
    }

    #[test]
    fn continues_from_position_after_completed_round() {
        let mut generator = forced_generator(&[1]);
        let mut traveler = Traveler::new(quick_options(0), 7);
        let token = traveler.init_run(&generator);
        run_to_completion(&mut traveler, token);
        let rest_position = traveler.cell();

        generator.set_forced_selection(Some(ForcedSelection {
            round: 2,
            cells: vec![14],
            kinds: vec![SigilKind::Iron],
            ignore_restriction_and_history: true,
        }));
        generator.generate_standard_round(2);

        // Previous round completed and the forced start is gone, so the
        // patrol keeps its position and skips the approach.
        traveler.options.debug_force_start = None;
        traveler.init_run(&generator);
        assert_eq!(traveler.phase(), TravelerPhase::Walking);
        assert_eq!(traveler.cell(), rest_position);
    }

    #[test]
    fn forced_corner_restart_requires_approach() {
        let generator = forced_generator(&[1]);
        let mut traveler = Traveler::new(quick_options(0), 7);
        let token = traveler.init_run(&generator);
        run_to_completion(&mut traveler, token);

        traveler.options.debug_force_start = None;
        traveler.force_corner_next_init();
        traveler.init_run(&generator);
        assert_eq!(traveler.phase(), TravelerPhase::AwaitingApproach);

        let grid = Grid::default();
        let corner_index = grid.index_of(traveler.cell());
        assert!(grid.corners().contains(&corner_index));
    }

    #[test]
    fn reset_abandons_run() {
        let generator = forced_generator(&[1, 3]);
        let mut traveler = Traveler::new(quick_options(0), 7);
        let token = traveler.init_run(&generator);
        traveler.notify_approach_complete(token);
        traveler.tick(0.05, &NoPlacements);

        traveler.reset_run();
        assert_eq!(traveler.phase(), TravelerPhase::Idle);
        assert_eq!(traveler.remaining_hints(), 0);
        assert!(traveler.drain_signals().is_empty());
        // Ticks after a reset do nothing.
        traveler.tick(1.0, &NoPlacements);
        assert_eq!(traveler.phase(), TravelerPhase::Idle);
    }
}
