use thiserror::Error;

/// Local invariant violations of the growth automaton.
///
/// None of these are recoverable at runtime: the automaton is
/// deterministic given its inputs, so each variant indicates a caller
/// contract breach. They are debug-asserted where they arise and
/// surfaced as defensive early returns in release builds.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum GrowthError {
    /// A coordinate outside the grid bounds reached an entry point.
    /// Bounds are checked before any array access, never clamped.
    #[error("coordinate ({x}, {y}) is outside the grid bounds")]
    InvalidCoordinate { x: i32, y: i32 },

    /// A point add was requested for a cell with no adjacent committed
    /// branch; `check_neighbors` should have gated the call.
    #[error("no branch adjacent to ({x}, {y}) to grow from")]
    NoMatchingNeighbor { x: i32, y: i32 },

    /// A wildcard resolution found zero distinct neighbor colors.
    #[error("wildcard at ({x}, {y}) has no neighbor colors to resolve against")]
    AmbiguousWildcard { x: i32, y: i32 },
}
