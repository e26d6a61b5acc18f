//! Drop-wave formations.
//!
//! A formation is a row template of slots: a color index into a
//! per-wave shuffle of the concrete colors, a gap, or a wildcard. The
//! shuffle means the same formation produces differently-colored waves
//! while keeping its matching structure (slot 0 and slot 2 of
//! `[0, 1, 0]` always agree, whatever color `0` lands on).

use rand::Rng;
use rand::seq::SliceRandom;

use crate::types::TreeColor;

/// Slot value marking a gap in the wave.
const GAP: i32 = -1;
/// Slot value marking a wildcard marker.
const WILD: i32 = -2;

#[derive(Clone, Debug)]
pub struct Formation {
    drops: Vec<i32>,
}

impl Formation {
    pub fn new(drops: Vec<i32>) -> Self {
        debug_assert!(
            drops
                .iter()
                .all(|&d| d == GAP || d == WILD || (0..TreeColor::CONCRETE.len() as i32).contains(&d))
        );
        Self { drops }
    }

    /// The built-in wave shapes.
    pub fn standard_set() -> Vec<Formation> {
        vec![
            Formation::new(vec![0, 1, 0]),
            Formation::new(vec![0, GAP, 0]),
            Formation::new(vec![0, 1, 2]),
            Formation::new(vec![0, GAP, 1]),
            Formation::new(vec![0, WILD, 1]),
            Formation::new(vec![0, WILD, 0]),
        ]
    }

    pub fn len(&self) -> usize {
        self.drops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drops.is_empty()
    }

    /// Instantiates the formation into marker colors for one wave,
    /// shuffling which concrete color each index refers to.
    pub fn colors(&self, rng: &mut impl Rng) -> Vec<TreeColor> {
        let mut palette = TreeColor::CONCRETE;
        palette.shuffle(rng);

        self.drops
            .iter()
            .map(|&d| match d {
                GAP => TreeColor::None,
                WILD => TreeColor::Wildcard,
                i => palette[i as usize],
            })
            .collect()
    }
}
