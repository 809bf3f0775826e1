//! Vigil Game Engine
//!
//! Platform-agnostic round-generation and patrol logic for the Hollow Vigil
//! horror game. This crate provides the puzzle mechanics without UI or
//! platform-specific dependencies: the host supplies placement probing,
//! validation, and timeline storage through the traits defined here.

pub mod grid;
pub mod restriction;
pub mod rounds;
pub mod scenario;
pub mod sigil;
pub mod timeline;
pub mod traveler;

// Re-export commonly used types
pub use grid::{classify_approach, Approach, Grid, Pos};
pub use restriction::RestrictionProfile;
pub use rounds::{
    EndlessScore, ForcedSelection, RoundEvent, RoundGenerator, RoundMode, RoundOutcome,
    RoundSelection,
};
pub use scenario::{Scenario, ScenarioError, ScenarioRound};
pub use sigil::{ItemAssignments, SigilKind};
pub use timeline::{TimelineConfig, TimelineError, TimelineRound};
pub use traveler::{Traveler, TravelerOptions, TravelerPhase, TravelerSignal};

/// Ward items placed on cells by the player, keyed by cell index.
pub type PlacementMap = std::collections::BTreeMap<usize, SigilKind>;

/// Trait for abstracting timeline save-slot access.
/// Platform-specific implementations should provide this.
pub trait TimelineStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the timeline saved under `slot`, or `None` when the slot is
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot exists but cannot be read or parsed.
    fn load_timeline(&self, slot: &str) -> Result<Option<TimelineConfig>, Self::Error>;
}

/// Trait for querying the host's placement state. The Traveler's sniff
/// detour uses it to find stray ward markers.
pub trait PlacementProbe {
    /// Whether the player has a ward marker on this cell right now.
    fn has_marker(&self, cell: usize) -> bool;
}

/// A probe for hosts without placement state (tests, headless runs).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPlacements;

impl PlacementProbe for NoPlacements {
    fn has_marker(&self, _cell: usize) -> bool {
        false
    }
}

/// Trait for judging a submitted round. The engine stays ignorant of how the
/// host compares placements to demands; only the verdict comes back.
pub trait RoundValidator {
    fn validate_round(
        &self,
        placed: &PlacementMap,
        selection: &RoundSelection,
        assignments: &ItemAssignments,
    ) -> bool;
}

/// Main engine facade tying the Round Generator and the Traveler together
/// under one difficulty driver.
pub struct VigilEngine {
    mode: RoundMode,
    round: u32,
    generator: RoundGenerator,
    traveler: Traveler,
    scenario: Option<Scenario>,
}

impl VigilEngine {
    // Traveler rng is decoupled from the generator's draw stream so tuning
    // patrol options never reshuffles the rounds.
    const TRAVELER_SEED_SALT: u64 = 0x7261_7665;

    #[must_use]
    pub fn new(seed: u64, mode: RoundMode, traveler_options: TravelerOptions) -> Self {
        let mut engine = Self {
            mode,
            round: 0,
            generator: RoundGenerator::new(Grid::default(), seed),
            traveler: Traveler::new(traveler_options, seed ^ Self::TRAVELER_SEED_SALT),
            scenario: None,
        };
        if mode == RoundMode::Scenario {
            engine.scenario = Some(Scenario::load_from_static());
        }
        engine
    }

    pub fn set_scenario(&mut self, scenario: Scenario) {
        self.scenario = Some(scenario);
    }

    /// Load the timeline for `slot`. Only meaningful in Timeline mode;
    /// failures surface through [`RoundGenerator::outcome`].
    pub fn load_timeline<S: TimelineStore>(&mut self, store: &S, slot: &str) -> bool {
        self.generator.load_timeline(store, slot)
    }

    /// Like [`Self::load_timeline`], but for hosts that cannot proceed
    /// without one: a missing, empty, or unreadable timeline becomes a hard
    /// error carrying the generator's status message.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot holds no usable timeline.
    pub fn require_timeline<S: TimelineStore>(
        &mut self,
        store: &S,
        slot: &str,
    ) -> Result<(), anyhow::Error> {
        if self.generator.load_timeline(store, slot) {
            Ok(())
        } else {
            Err(anyhow::anyhow!("{}", self.generator.outcome().status))
        }
    }

    /// Advance to the next round and generate it with the active driver.
    pub fn begin_round(&mut self) -> &RoundOutcome {
        self.round += 1;
        match self.mode {
            RoundMode::Standard => self.generator.generate_standard_round(self.round),
            RoundMode::Scenario => {
                let scenario = self
                    .scenario
                    .get_or_insert_with(Scenario::load_from_static)
                    .clone();
                self.generator.generate_scenario_round(self.round, &scenario);
            }
            RoundMode::Timeline => self.generator.generate_timeline_round(self.round),
            RoundMode::Endless => self.generator.generate_endless_round(self.round),
        }
        self.generator.outcome()
    }

    /// Start the Traveler's patrol over the current round's targets.
    pub fn begin_patrol(&mut self) -> u64 {
        self.traveler.init_run(&self.generator)
    }

    pub fn notify_approach_complete(&mut self, token: u64) {
        self.traveler.notify_approach_complete(token);
    }

    pub fn tick(&mut self, dt: f32, probe: &dyn PlacementProbe) {
        self.traveler.tick(dt, probe);
    }

    /// Judge the player's placements for the current round and apply the
    /// consequences: a pass locks the round's cells and marks them solved
    /// (or scores, in Endless); the returned flag is the verdict.
    pub fn submit_round<V: RoundValidator>(&mut self, validator: &V, placed: &PlacementMap) -> bool {
        let valid = validator.validate_round(
            placed,
            self.generator.selection(),
            self.generator.assignments(),
        );
        if self.mode == RoundMode::Endless {
            self.generator.record_endless_result(valid);
            return valid;
        }
        if valid {
            let cells: Vec<usize> = self.generator.selection().keys().copied().collect();
            self.generator.lock_current_round();
            for cell in cells {
                self.generator.set_solved(cell, true);
            }
        }
        valid
    }

    /// Abandon the run: round counter back to zero, generator history wiped,
    /// any patrol in flight cancelled. Profile and loaded timeline survive,
    /// as does the RNG stream.
    pub fn reset(&mut self) {
        self.round = 0;
        self.generator.reset();
        self.traveler.reset_run();
    }

    #[must_use]
    pub const fn mode(&self) -> RoundMode {
        self.mode
    }

    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    #[must_use]
    pub const fn generator(&self) -> &RoundGenerator {
        &self.generator
    }

    pub fn generator_mut(&mut self) -> &mut RoundGenerator {
        &mut self.generator
    }

    #[must_use]
    pub const fn traveler(&self) -> &Traveler {
        &self.traveler
    }

    pub fn traveler_mut(&mut self) -> &mut Traveler {
        &mut self.traveler
    }

    #[must_use]
    pub const fn outcome(&self) -> &RoundOutcome {
        self.generator.outcome()
    }
}
