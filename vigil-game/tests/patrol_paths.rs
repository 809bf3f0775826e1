//! Patrol behavior of the Traveler: routing, turn/approach classification,
//! run-token cancellation, and hint consumption.

use vigil_game::traveler::path::route_to;
use vigil_game::{
    classify_approach, Approach, ForcedSelection, Grid, NoPlacements, Pos, RoundGenerator,
    SigilKind, Traveler, TravelerOptions, TravelerPhase, TravelerSignal,
};

fn round_with(cells: &[usize]) -> RoundGenerator {
    let mut generator = RoundGenerator::new(Grid::default(), 55);
    generator.set_forced_selection(Some(ForcedSelection {
        round: 1,
        cells: cells.to_vec(),
        kinds: vec![SigilKind::Ash; cells.len()],
        ignore_restriction_and_history: true,
    }));
    generator.generate_standard_round(1);
    generator
}

fn patrol_options(start: usize) -> TravelerOptions {
    TravelerOptions {
        speed: 4.0,
        pause_duration: 0.2,
        turn_pause: 0.2,
        start_delay: 0.0,
        debug_force_start: Some(start),
        ..TravelerOptions::default()
    }
}

fn drive(traveler: &mut Traveler, ticks: usize) {
    for _ in 0..ticks {
        if traveler.is_complete() {
            return;
        }
        traveler.tick(0.1, &NoPlacements);
    }
}

#[test]
fn route_closes_x_before_y() {
    let steps: Vec<Pos> = route_to(Pos::new(0, 0), Pos::new(3, 2)).into_iter().collect();
    assert_eq!(steps.len(), 5);
    assert_eq!(
        steps,
        vec![
            Pos::new(1, 0),
            Pos::new(2, 0),
            Pos::new(3, 0),
            Pos::new(3, 1),
            Pos::new(3, 2),
        ]
    );
    // Every step is a single orthogonal move.
    let mut cursor = Pos::new(0, 0);
    for step in steps {
        assert_eq!(cursor.manhattan(step), 1);
        cursor = step;
    }
}

#[test]
fn approach_classification_is_a_pure_segment_function() {
    let grid = Grid::default();
    assert_eq!(
        classify_approach(&grid, Pos::new(0, 0), Pos::new(1, 0)),
        Approach::Toward
    );
    assert_eq!(
        classify_approach(&grid, Pos::new(1, 0), Pos::new(0, 0)),
        Approach::Away
    );
    assert_eq!(
        classify_approach(&grid, Pos::new(0, 2), Pos::new(1, 3)),
        Approach::Lateral
    );
}

#[test]
fn direction_change_always_turns_and_straight_lines_never_do() {
    let generator = round_with(&[2]);
    let mut straight = Traveler::new(patrol_options(0), 1);
    let token = straight.init_run(&generator);
    straight.notify_approach_complete(token);
    drive(&mut straight, 400);
    assert!(straight.is_complete());
    assert!(!straight
        .drain_signals()
        .iter()
        .any(|signal| matches!(signal, TravelerSignal::Turn { .. })));

    // Hint at (2,2)... the center is excluded, so use (2,1): cell 7. The
    // route from (0,0) walks +x to (2,0) then +y, turning once.
    let generator = round_with(&[7]);
    let mut cornering = Traveler::new(patrol_options(0), 1);
    let token = cornering.init_run(&generator);
    cornering.notify_approach_complete(token);
    drive(&mut cornering, 400);
    assert!(cornering.is_complete());
    let turns: Vec<TravelerSignal> = cornering
        .drain_signals()
        .into_iter()
        .filter(|signal| matches!(signal, TravelerSignal::Turn { .. }))
        .collect();
    assert_eq!(turns.len(), 1);
    assert!(matches!(turns[0], TravelerSignal::Turn { angle: 90, .. }));
}

#[test]
fn turn_signal_carries_the_segment_approach() {
    // (0,0) -> (0,2) walks +y, then (0,2) -> (1,2) turns +x toward center.
    let generator = round_with(&[10, 11]);
    let mut traveler = Traveler::new(patrol_options(0), 1);
    let token = traveler.init_run(&generator);
    traveler.notify_approach_complete(token);
    drive(&mut traveler, 400);

    let signals = traveler.drain_signals();
    assert!(signals.contains(&TravelerSignal::Turn {
        angle: 90,
        approach: Approach::Toward,
    }));
}

#[test]
fn stale_run_cannot_advance_a_new_run() {
    let generator = round_with(&[1, 3]);
    let mut traveler = Traveler::new(patrol_options(0), 1);
    let first_token = traveler.init_run(&generator);

    // First run never gets its approach signal; a new run begins.
    let second_token = traveler.init_run(&generator);
    assert_ne!(first_token, second_token);

    traveler.notify_approach_complete(first_token);
    assert_eq!(traveler.phase(), TravelerPhase::AwaitingApproach);
    traveler.tick(1.0, &NoPlacements);
    assert_eq!(traveler.phase(), TravelerPhase::AwaitingApproach);

    traveler.notify_approach_complete(second_token);
    drive(&mut traveler, 400);
    assert!(traveler.is_complete());
}

#[test]
fn hints_passed_through_are_consumed_and_never_retargeted() {
    // Three hints on one row, randomized order: whenever a farther hint is
    // targeted first, the nearer hints lie on its route and must be consumed
    // in passing. Each hint is reached exactly once no matter the order.
    for seed in 1..=10 {
        let generator = round_with(&[1, 2, 3]);
        let options = TravelerOptions {
            randomize_next_hint: true,
            ..patrol_options(0)
        };
        let mut traveler = Traveler::new(options, seed);
        let token = traveler.init_run(&generator);
        traveler.notify_approach_complete(token);
        drive(&mut traveler, 1_000);
        assert!(traveler.is_complete(), "seed {seed}");

        let mut hints: Vec<usize> = traveler
            .drain_signals()
            .into_iter()
            .filter_map(|signal| match signal {
                TravelerSignal::HintReached { cell } => Some(cell),
                _ => None,
            })
            .collect();
        hints.sort_unstable();
        assert_eq!(hints, vec![1, 2, 3], "seed {seed}");
    }
}

#[test]
fn every_hint_is_visited_exactly_once_per_run() {
    for seed in [1, 2, 3] {
        let generator = round_with(&[1, 9, 16, 23]);
        let mut traveler = Traveler::new(patrol_options(4), seed);
        let token = traveler.init_run(&generator);
        traveler.notify_approach_complete(token);
        drive(&mut traveler, 2_000);
        assert!(traveler.is_complete(), "seed {seed}");

        let mut hints: Vec<usize> = traveler
            .drain_signals()
            .into_iter()
            .filter_map(|signal| match signal {
                TravelerSignal::HintReached { cell } => Some(cell),
                _ => None,
            })
            .collect();
        hints.sort_unstable();
        assert_eq!(hints, vec![1, 9, 16, 23], "seed {seed}");
    }
}

#[test]
fn randomized_order_still_visits_everything() {
    let generator = round_with(&[2, 6, 18, 22]);
    let options = TravelerOptions {
        randomize_next_hint: true,
        ..patrol_options(0)
    };
    let mut traveler = Traveler::new(options, 9);
    let token = traveler.init_run(&generator);
    traveler.notify_approach_complete(token);
    drive(&mut traveler, 2_000);
    assert!(traveler.is_complete());

    let mut hints: Vec<usize> = traveler
        .drain_signals()
        .into_iter()
        .filter_map(|signal| match signal {
            TravelerSignal::HintReached { cell } => Some(cell),
            _ => None,
        })
        .collect();
    hints.sort_unstable();
    assert_eq!(hints, vec![2, 6, 18, 22]);
}
