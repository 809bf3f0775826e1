//! Pure routing helpers for the Traveler: axis-ordered Manhattan paths and
//! nearest-target selection.

use std::collections::VecDeque;

use crate::grid::Pos;

/// Build the step-by-step route from `from` to `to`: walk the x axis first,
/// then the y axis. Every entry is one unit step; `from` itself is not
/// included, `to` is the final entry (an empty route means they coincide).
#[must_use]
pub fn route_to(from: Pos, to: Pos) -> VecDeque<Pos> {
    let mut route = VecDeque::new();
    let mut cursor = from;
    while cursor.x != to.x {
        cursor.x += (to.x - cursor.x).signum();
        route.push_back(cursor);
    }
    while cursor.y != to.y {
        cursor.y += (to.y - cursor.y).signum();
        route.push_back(cursor);
    }
    route
}

/// Pick the target nearest to `from` by Manhattan distance. Ties go to the
/// earliest candidate in iteration order, which keeps the choice stable for
/// ordered collections.
#[must_use]
pub fn nearest_by_manhattan<I>(from: Pos, candidates: I) -> Option<Pos>
where
    I: IntoIterator<Item = Pos>,
{
    candidates
        .into_iter()
        .min_by_key(|candidate| from.manhattan(*candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_walks_x_then_y() {
        let route = route_to(Pos::new(0, 0), Pos::new(2, 2));
        let steps: Vec<Pos> = route.into_iter().collect();
        assert_eq!(
            steps,
            vec![
                Pos::new(1, 0),
                Pos::new(2, 0),
                Pos::new(2, 1),
                Pos::new(2, 2),
            ]
        );
    }

    #[test]
    fn route_handles_negative_deltas() {
        let route = route_to(Pos::new(3, 1), Pos::new(1, 0));
        let steps: Vec<Pos> = route.into_iter().collect();
        assert_eq!(
            steps,
            vec![Pos::new(2, 1), Pos::new(1, 1), Pos::new(1, 0)]
        );
    }

    #[test]
    fn route_to_self_is_empty() {
        assert!(route_to(Pos::new(2, 2), Pos::new(2, 2)).is_empty());
    }

    #[test]
    fn route_length_equals_manhattan_distance() {
        let from = Pos::new(0, 4);
        let to = Pos::new(3, 1);
        assert_eq!(route_to(from, to).len() as i32, from.manhattan(to));
    }

    #[test]
    fn nearest_prefers_first_on_ties() {
        let from = Pos::new(0, 0);
        let candidates = [Pos::new(1, 1), Pos::new(2, 0), Pos::new(0, 2)];
        // All three are at distance 2; the first wins.
        assert_eq!(
            nearest_by_manhattan(from, candidates),
            Some(Pos::new(1, 1))
        );
    }

    #[test]
    fn nearest_of_empty_is_none() {
        assert_eq!(nearest_by_manhattan(Pos::ZERO, std::iter::empty()), None);
    }
}
