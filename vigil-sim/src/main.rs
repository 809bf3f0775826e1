//! Headless round simulator for the Hollow Vigil engine.
//!
//! Drives the engine the way the in-game Director does: generate a round,
//! run the Traveler's patrol to completion, submit perfect placements, and
//! repeat. Useful for tuning difficulty drivers and eyeballing patrol routes
//! without a frontend.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use log::info;
use rand::Rng;
use thiserror::Error;

use vigil_game::{
    Approach, ItemAssignments, NoPlacements, PlacementMap, RoundMode, RoundSelection,
    RoundValidator, TimelineConfig, TimelineStore, TravelerOptions, TravelerSignal, VigilEngine,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Escalating in-code policy
    Standard,
    /// Built-in scripted scenario
    Scenario,
    /// Timeline loaded from a save-slot file
    Timeline,
    /// Monotonic ramp, repeats allowed
    Endless,
}

impl ModeArg {
    const fn to_mode(self) -> RoundMode {
        match self {
            Self::Standard => RoundMode::Standard,
            Self::Scenario => RoundMode::Scenario,
            Self::Timeline => RoundMode::Timeline,
            Self::Endless => RoundMode::Endless,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "vigil-sim", version)]
#[command(about = "Headless round and patrol simulator for the Hollow Vigil engine")]
struct Args {
    /// RNG seed for the whole run; omit for a random one
    #[arg(long)]
    seed: Option<u64>,

    /// Difficulty driver
    #[arg(long, value_enum, default_value_t = ModeArg::Standard)]
    mode: ModeArg,

    /// Maximum number of rounds to simulate
    #[arg(long, default_value_t = 8)]
    rounds: u32,

    /// Directory holding timeline save slots (timeline mode only)
    #[arg(long, default_value = "timelines")]
    timeline_dir: PathBuf,

    /// Save slot to load the timeline from (timeline mode only)
    #[arg(long, default_value = "slot-1")]
    slot: String,

    /// Simulation step in seconds
    #[arg(long, default_value_t = 0.05)]
    tick: f32,

    /// Walk speed in cells per second
    #[arg(long, default_value_t = 5.0)]
    speed: f32,

    /// Print every patrol signal instead of a per-round summary
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Error)]
enum StoreError {
    #[error("failed to read timeline slot: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse timeline slot: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Timeline slots as JSON files in a directory, one file per slot.
struct FileTimelineStore {
    root: PathBuf,
}

impl FileTimelineStore {
    fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl TimelineStore for FileTimelineStore {
    type Error = StoreError;

    fn load_timeline(&self, slot: &str) -> Result<Option<TimelineConfig>, Self::Error> {
        let path = self.root.join(format!("{slot}.json"));
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }
}

/// Strict comparison: every demanded cell must carry the item the current
/// assignments map to its sigil, and nothing extra may be placed.
struct StrictValidator;

impl RoundValidator for StrictValidator {
    fn validate_round(
        &self,
        placed: &PlacementMap,
        selection: &RoundSelection,
        assignments: &ItemAssignments,
    ) -> bool {
        placed.len() == selection.len()
            && selection.iter().all(|(cell, &sigil)| {
                placed.get(cell) == Some(&assignments.correct_item_for(sigil))
            })
    }
}

fn perfect_placements(engine: &VigilEngine) -> PlacementMap {
    engine
        .generator()
        .selection()
        .iter()
        .map(|(&cell, &sigil)| {
            (cell, engine.generator().assignments().correct_item_for(sigil))
        })
        .collect()
}

fn describe(signal: &TravelerSignal) -> String {
    match signal {
        TravelerSignal::HintReached { cell } => format!("hint reached at cell {cell}").green().to_string(),
        TravelerSignal::SniffReached { cell } => {
            format!("sniffed stray marker at cell {cell}").yellow().to_string()
        }
        TravelerSignal::Turn { angle, approach } => {
            let direction = match approach {
                Approach::Toward => "toward the center",
                Approach::Away => "away from the center",
                Approach::Lateral => "lateral",
            };
            format!("turned {angle}°, {direction}").cyan().to_string()
        }
        TravelerSignal::PatternComplete => "pattern complete".bold().to_string(),
    }
}

fn run_patrol(engine: &mut VigilEngine, tick: f32, verbose: bool) -> Result<()> {
    let token = engine.begin_patrol();
    engine.notify_approach_complete(token);

    let mut ticks = 0u32;
    while !engine.traveler().is_complete() {
        engine.tick(tick, &NoPlacements);
        ticks += 1;
        if ticks > 200_000 {
            bail!("patrol did not complete; the walk appears stuck");
        }
    }

    let signals = engine.traveler_mut().drain_signals();
    if verbose {
        for signal in &signals {
            println!("    {}", describe(signal));
        }
    } else {
        let hints = signals
            .iter()
            .filter(|signal| matches!(signal, TravelerSignal::HintReached { .. }))
            .count();
        let turns = signals
            .iter()
            .filter(|signal| matches!(signal, TravelerSignal::Turn { .. }))
            .count();
        println!(
            "    patrol: {hints} hints, {turns} turns, {:.1}s simulated",
            f64::from(ticks) * f64::from(tick)
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mode = args.mode.to_mode();
    let seed = args
        .seed
        .unwrap_or_else(|| rand::thread_rng().gen_range(0..u64::MAX));

    let options = TravelerOptions {
        speed: args.speed,
        ..TravelerOptions::default()
    };
    let mut engine = VigilEngine::new(seed, mode, options);

    if mode == RoundMode::Timeline {
        let store = FileTimelineStore::new(&args.timeline_dir);
        engine
            .require_timeline(&store, &args.slot)
            .with_context(|| format!("loading timeline from '{}'", args.timeline_dir.display()))?;
        println!("{}", engine.outcome().status.dimmed());
    }

    info!("simulating {} rounds, seed {seed}", args.rounds);

    for _ in 0..args.rounds {
        let outcome = engine.begin_round().clone();
        let round = engine.round();
        println!(
            "{} {}",
            format!("round {round}:").bold(),
            outcome.status.dimmed()
        );

        if outcome.win {
            println!("{}", "run complete (win condition reached)".green().bold());
            break;
        }

        let selection: Vec<String> = engine
            .generator()
            .selection()
            .iter()
            .map(|(cell, kind)| format!("{cell}:{}", kind.key()))
            .collect();
        println!("    targets: {}", selection.join(", "));

        run_patrol(&mut engine, args.tick, args.verbose)?;

        let placed = perfect_placements(&engine);
        let passed = engine.submit_round(&StrictValidator, &placed);
        let verdict = if passed {
            "validated".green()
        } else {
            "rejected".red()
        };
        println!("    submission {verdict}");
    }

    if mode == RoundMode::Endless {
        let score = engine.generator().endless_score();
        println!(
            "endless score: {} rounds, {} cells",
            score.rounds_completed, score.cells_completed
        );
    }

    Ok(())
}
