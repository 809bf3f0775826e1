//! Sigil categories demanded by target cells, and the per-round shuffled
//! assignment of which ward item answers which sigil.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One of the four interchangeable "correct item" categories a target cell
/// can demand. Wire-compatible with the integer codes 1..=4.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum SigilKind {
    Salt,
    Iron,
    Ash,
    Wax,
}

impl SigilKind {
    pub const ALL: [Self; 4] = [Self::Salt, Self::Iron, Self::Ash, Self::Wax];
    pub const COUNT: usize = 4;

    /// Translation key for this sigil.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Salt => "sigil.salt",
            Self::Iron => "sigil.iron",
            Self::Ash => "sigil.ash",
            Self::Wax => "sigil.wax",
        }
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Salt => 1,
            Self::Iron => 2,
            Self::Ash => 3,
            Self::Wax => 4,
        }
    }

    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Salt),
            2 => Some(Self::Iron),
            3 => Some(Self::Ash),
            4 => Some(Self::Wax),
            _ => None,
        }
    }

    /// Array offset for lookup tables.
    #[must_use]
    pub const fn slot(self) -> usize {
        self.code() as usize - 1
    }
}

/// Per-round bijection from a demanded sigil to the ward item that satisfies
/// it. Reshuffled every round so the player cannot memorize the mapping; the
/// validation collaborator consults it when comparing placements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAssignments {
    map: [SigilKind; SigilKind::COUNT],
}

impl Default for ItemAssignments {
    /// Identity mapping until the first shuffle.
    fn default() -> Self {
        Self {
            map: SigilKind::ALL,
        }
    }
}

impl ItemAssignments {
    /// Reassign items to sigils with a fresh shuffle.
    pub fn randomize<R: Rng>(&mut self, rng: &mut R) {
        let mut items = SigilKind::ALL;
        items.shuffle(rng);
        self.map = items;
    }

    /// The ward item that correctly answers `sigil` this round.
    #[must_use]
    pub const fn correct_item_for(&self, sigil: SigilKind) -> SigilKind {
        self.map[sigil.slot()]
    }
}
