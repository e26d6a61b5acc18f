//! Core falling-marker tree growth simulation library.
//!
//! Main components:
//! - [`grid`] — outer cell→tree ownership, merges, and deferred commits.
//! - [`tree`] — per-tree branch growth and staggered deletion.
//! - [`path`] — branch polyline synthesis and reveal/retract animation.
//! - [`stroke`] — ribbon vertex geometry for drawing a branch.
//! - [`counter`] — shared barrier counters gating the animation phases.
//! - [`easing`] — easing curves for marker motion.
//! - [`marker`] / [`formation`] — falling markers and drop-wave shapes.
//! - [`config`] — global configuration for the automaton and geometry.
//! - [`error`] — invariant-violation errors.
//! - [`types`] — shared ids and the color enum.

pub mod config;
pub mod counter;
pub mod easing;
pub mod error;
pub mod formation;
pub mod grid;
pub mod marker;
pub mod path;
pub mod stroke;
pub mod tree;
pub mod types;
