/// Identifier for a tree in a [`crate::grid::GridOwnership`] arena.
///
/// This is an index into the grid's tree storage, and is only meaningful
/// within the lifetime of a given grid instance. Slots of destroyed
/// trees are tombstoned, so a stale id resolves to nothing rather than
/// to a different tree.
pub type TreeId = usize;

/// Identifier for a branch in a [`crate::tree::Tree`] arena.
pub type BranchId = usize;

/// Color of a tree or a falling marker.
///
/// `Red`, `Green` and `Blue` are concrete colors a committed tree can
/// have. `None` and `Wildcard` are sentinels: `None` marks an empty slot
/// in a drop formation, `Wildcard` marks a marker that adopts a neighbor
/// color on landing. Neither is ever assigned to a committed tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TreeColor {
    Red,
    Green,
    Blue,
    None,
    Wildcard,
}

impl TreeColor {
    /// The colors a committed tree can actually take.
    pub const CONCRETE: [TreeColor; 3] = [TreeColor::Red, TreeColor::Green, TreeColor::Blue];

    /// Returns `true` for `Red`, `Green` and `Blue`.
    pub fn is_concrete(self) -> bool {
        matches!(self, TreeColor::Red | TreeColor::Green | TreeColor::Blue)
    }
}
