//! Branch path synthesis and animated reveal/retract.
//!
//! A [`BranchPath`] turns a list of grid waypoints into a smooth
//! world-space polyline: straight runs pass through, direction changes
//! become rounded corners of `turn_segments` arc points, and the first
//! and last segments are foreshortened so branches terminate just off
//! the grid intersections. Cumulative arc lengths are kept parallel to
//! the positions so a partial prefix of the path can be cut at any
//! length.
//!
//! Reveal and retract are state machines advanced by [`BranchPath::tick`]
//! once per driver frame. A reveal walks the cumulative lengths forward
//! from the previously-drawn length at `animation_speed`; a retract
//! walks backward from full length between caller-chosen start/end
//! times. Nothing here blocks: a retract that has not reached its start
//! time simply reports nothing to draw yet.

use glam::{IVec2, Vec2};
use tracing::trace;

use crate::config::Config;
use crate::counter::BarrierCounter;

/// Squared tolerance for matching synthesized positions.
const APPROX_TOLERANCE: f32 = 1e-3;

/// Fallback starting length for a first reveal, so the walk always has
/// a nonzero prefix to interpolate within.
const FIRST_REVEAL_LENGTH: f32 = 0.1;

#[derive(Debug)]
enum AnimPhase {
    Idle,
    Reveal,
    Retract,
}

/// Result of advancing a path's animation by one tick.
#[derive(Debug)]
pub enum PathTick {
    /// Nothing changed this tick.
    Idle,
    /// Animation in flight; draw this partial outline.
    Partial { positions: Vec<Vec2>, widths: Vec<f32> },
    /// The reveal finished this tick; draw the full outline.
    Revealed,
    /// The retract finished this tick; the branch should be discarded.
    Removed,
}

#[derive(Debug)]
pub struct BranchPath {
    waypoints: Vec<IVec2>,
    positions: Vec<Vec2>,
    cumulative_lengths: Vec<f32>,
    widths: Vec<f32>,

    phase: AnimPhase,
    /// Arc length already on screen when the current animation began.
    starting_length: f32,
    /// Index of the position bracket the animation walk is currently in.
    current_index: usize,
    anim_start: f32,
    anim_total: f32,
    speed: f32,
    /// +1 while revealing, -1 while retracting.
    anim_dir: f32,

    barrier: Option<BarrierCounter>,
    /// Number of barrier decrements owed when the reveal completes. Each
    /// reshape owes exactly one; reshaping mid-reveal accrues rather
    /// than overwrites, so increments and decrements always balance.
    reveal_debt: u32,
}

impl Default for BranchPath {
    fn default() -> Self {
        Self::new()
    }
}

impl BranchPath {
    pub fn new() -> Self {
        Self {
            waypoints: Vec::new(),
            positions: Vec::new(),
            cumulative_lengths: Vec::new(),
            widths: Vec::new(),
            phase: AnimPhase::Idle,
            starting_length: 0.0,
            current_index: 0,
            anim_start: 0.0,
            anim_total: 0.0,
            speed: 0.0,
            anim_dir: 1.0,
            barrier: None,
            reveal_debt: 0,
        }
    }

    pub fn waypoints(&self) -> &[IVec2] {
        &self.waypoints
    }

    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    pub fn widths(&self) -> &[f32] {
        &self.widths
    }

    pub fn cumulative_lengths(&self) -> &[f32] {
        &self.cumulative_lengths
    }

    /// Total arc length of the synthesized path.
    pub fn total_length(&self) -> f32 {
        self.cumulative_lengths.last().copied().unwrap_or(0.0)
    }

    pub fn last_waypoint(&self) -> Option<IVec2> {
        self.waypoints.last().copied()
    }

    pub fn contains_waypoint(&self, p: IVec2) -> bool {
        self.waypoints.contains(&p)
    }

    pub fn waypoint_index(&self, p: IVec2) -> Option<usize> {
        self.waypoints.iter().position(|&w| w == p)
    }

    pub fn is_animating(&self) -> bool {
        !matches!(self.phase, AnimPhase::Idle)
    }

    /// Start and end time of the scheduled retraction, if one is
    /// pending or in flight.
    pub fn retract_window(&self) -> Option<(f32, f32)> {
        match self.phase {
            AnimPhase::Retract => Some((self.anim_start, self.anim_start + self.anim_total)),
            _ => None,
        }
    }

    /// Whether any synthesized position lies within tolerance of `p`.
    pub fn approx_contains(&self, p: Vec2) -> bool {
        self.approx_index_of(p).is_some()
    }

    /// Index of the first synthesized position within tolerance of `p`.
    pub fn approx_index_of(&self, p: Vec2) -> Option<usize> {
        self.positions
            .iter()
            .position(|&q| (p - q).length_squared() < APPROX_TOLERANCE)
    }

    /// Replaces the waypoint list, resynthesizes the polyline, and
    /// starts (or extends) the reveal animation from the length that was
    /// previously drawn.
    ///
    /// The `barrier` is decremented once per reshape when the reveal
    /// completes; reshaping while a reveal is still in flight adds to
    /// the debt instead of restarting it.
    pub fn reshape(&mut self, waypoints: Vec<IVec2>, cfg: &Config, barrier: &BarrierCounter, now: f32) {
        debug_assert!(waypoints.len() >= 2, "a path needs at least two waypoints");

        let positions = synthesize(&waypoints, cfg);
        let widths = vec![cfg.branch_width; positions.len()];

        let mut starting_length = FIRST_REVEAL_LENGTH;
        if let Some(&prior_total) = self.cumulative_lengths.last() {
            starting_length = prior_total;
        }

        self.cumulative_lengths = cumulative_lengths(&positions);
        self.current_index = self.positions.len().saturating_sub(2);
        self.positions = positions;
        self.widths = widths;
        self.waypoints = waypoints;

        self.starting_length = starting_length;
        self.speed = cfg.animation_speed;
        self.anim_dir = 1.0;
        self.anim_start = now;
        self.anim_total = (self.total_length() - starting_length) / cfg.animation_speed;

        self.phase = AnimPhase::Reveal;
        if self.reveal_debt == 0 {
            self.barrier = Some(barrier.clone());
        }
        self.reveal_debt += 1;
    }

    /// Schedules the retract walk from full length down to zero, running
    /// between `start_time` and `end_time`. Until `start_time` the path
    /// keeps drawing in full.
    pub fn delete(&mut self, start_time: f32, end_time: f32) {
        let total = self.total_length();

        self.speed = total / (end_time - start_time);
        self.anim_dir = -1.0;
        self.starting_length = total;
        self.anim_total = end_time - start_time;
        self.anim_start = start_time;
        self.current_index = self.positions.len().saturating_sub(2);
        self.phase = AnimPhase::Retract;

        // A reveal cut short by deletion never completes; settle its
        // debt here so the barrier still balances.
        self.settle_reveal_debt();
    }

    /// Advances the animation to wall-clock time `now`.
    pub fn tick(&mut self, now: f32) -> PathTick {
        match self.phase {
            AnimPhase::Idle => PathTick::Idle,
            AnimPhase::Reveal => {
                let elapsed = now - self.anim_start;
                if elapsed < self.anim_total {
                    let (positions, widths) = self.partial_at(elapsed);
                    PathTick::Partial { positions, widths }
                } else {
                    self.phase = AnimPhase::Idle;
                    trace!(len = self.total_length(), "reveal complete");
                    self.settle_reveal_debt();
                    PathTick::Revealed
                }
            }
            AnimPhase::Retract => {
                if now < self.anim_start {
                    // Stagger delay has not elapsed yet.
                    return PathTick::Idle;
                }
                let elapsed = now - self.anim_start;
                if elapsed < self.anim_total {
                    let (positions, widths) = self.partial_at(elapsed);
                    PathTick::Partial { positions, widths }
                } else {
                    self.phase = AnimPhase::Idle;
                    trace!("retract complete");
                    PathTick::Removed
                }
            }
        }
    }

    fn settle_reveal_debt(&mut self) {
        if self.reveal_debt > 0
            && let Some(barrier) = self.barrier.take()
        {
            barrier.decrement_by(self.reveal_debt as i32);
        }
        self.reveal_debt = 0;
    }

    /// Cuts the path at the arc length reached after `elapsed` seconds
    /// and returns the partial polyline up to the interpolated terminal
    /// point.
    fn partial_at(&mut self, elapsed: f32) -> (Vec<Vec2>, Vec<f32>) {
        let cum = &self.cumulative_lengths;
        let current_length = self.starting_length + self.anim_dir * elapsed * self.speed;
        let mut dist = current_length - cum[self.current_index];

        if self.anim_dir > 0.0 {
            while self.current_index < cum.len() - 2
                && dist > cum[self.current_index + 1] - cum[self.current_index]
            {
                self.current_index += 1;
                dist = current_length - cum[self.current_index];
            }
        } else {
            while self.current_index > 0 && dist < 0.0 {
                self.current_index -= 1;
                dist = current_length - cum[self.current_index];
            }
        }

        let i = self.current_index;
        let bracket = (cum[i + 1] - cum[i]).max(f32::EPSILON);
        let last_point = self.positions[i].lerp(self.positions[i + 1], (dist / bracket).clamp(0.0, 1.0));

        let mut partial: Vec<Vec2> = self.positions[..=i].to_vec();
        if partial.len() == 1 {
            // The stroke ribbon needs an interior point to orient its
            // first miter.
            partial.push((partial[0] + last_point) / 2.0);
        }
        partial.push(last_point);

        let mut widths = self.widths[..partial.len().min(self.widths.len())].to_vec();
        while widths.len() < partial.len() {
            widths.push(self.widths.last().copied().unwrap_or(0.0));
        }

        (partial, widths)
    }
}

/// Converts a waypoint list into the smooth world-space polyline.
fn synthesize(waypoints: &[IVec2], cfg: &Config) -> Vec<Vec2> {
    let spacing = cfg.grid_spacing;
    let mut positions = Vec::with_capacity(waypoints.len() + cfg.turn_segments * waypoints.len());

    let mut direction = (waypoints[1] - waypoints[0]).as_vec2();
    positions.push(grid_to_world(waypoints[0], spacing) + cfg.start_offset * spacing * direction);

    for i in 1..waypoints.len() - 1 {
        let new_direction = (waypoints[i + 1] - waypoints[i]).as_vec2();
        if new_direction == direction {
            positions.push(grid_to_world(waypoints[i], spacing));
        } else {
            // Quarter-circle corner between the incoming and outgoing
            // directions, centered so both tangents are honored.
            let corner = grid_to_world(waypoints[i], spacing);
            let start = corner - direction * cfg.turn_radius;
            let end = corner + new_direction * cfg.turn_radius;
            let turn_center = start + new_direction * cfg.turn_radius;
            let max1 = start - turn_center;
            let max2 = end - turn_center;

            for j in 0..cfg.turn_segments {
                let theta = std::f32::consts::PI * j as f32 / 2.0 / cfg.turn_segments as f32;
                positions.push(turn_center + max1 * theta.cos() + max2 * theta.sin());
            }
            positions.push(end);
        }
        direction = new_direction;
    }

    let last = waypoints[waypoints.len() - 1];
    positions.push(grid_to_world(last, spacing) - cfg.end_offset * spacing * direction);

    positions
}

fn grid_to_world(p: IVec2, spacing: f32) -> Vec2 {
    p.as_vec2() * spacing
}

fn cumulative_lengths(positions: &[Vec2]) -> Vec<f32> {
    let mut lengths = Vec::with_capacity(positions.len());
    lengths.push(0.0);
    for i in 1..positions.len() {
        lengths.push(lengths[i - 1] + (positions[i] - positions[i - 1]).length());
    }
    lengths
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            grid_spacing: 1.0,
            turn_radius: 0.25,
            turn_segments: 4,
            start_offset: 0.25,
            end_offset: 0.25,
            animation_speed: 2.0,
            ..Config::default()
        }
    }

    fn straight_waypoints() -> Vec<IVec2> {
        vec![IVec2::new(0, -1), IVec2::new(0, 0), IVec2::new(0, 1)]
    }

    #[test]
    fn straight_path_passes_through_interior_waypoints() {
        let cfg = test_config();
        let barrier = BarrierCounter::new(1);
        let mut path = BranchPath::new();
        path.reshape(straight_waypoints(), &cfg, &barrier, 0.0);

        // Foreshortened start, exact interior, foreshortened end.
        assert_eq!(path.positions().len(), 3);
        assert_eq!(path.positions()[0], Vec2::new(0.0, -0.75));
        assert_eq!(path.positions()[1], Vec2::new(0.0, 0.0));
        assert_eq!(path.positions()[2], Vec2::new(0.0, 0.75));
    }

    #[test]
    fn turn_inserts_arc_segments() {
        let cfg = test_config();
        let barrier = BarrierCounter::new(1);
        let mut path = BranchPath::new();
        path.reshape(
            vec![IVec2::new(0, 0), IVec2::new(0, 1), IVec2::new(1, 1)],
            &cfg,
            &barrier,
            0.0,
        );

        // start + turn_segments arc points + arc end + foreshortened end.
        assert_eq!(path.positions().len(), 2 + cfg.turn_segments + 1);

        // The arc starts turn_radius before the corner and ends
        // turn_radius after it.
        assert!((path.positions()[1] - Vec2::new(0.0, 0.75)).length() < 1e-5);
        let arc_end = path.positions()[1 + cfg.turn_segments];
        assert!((arc_end - Vec2::new(0.25, 1.0)).length() < 1e-5);
    }

    #[test]
    fn cumulative_lengths_are_monotonic_and_parallel() {
        let cfg = test_config();
        let barrier = BarrierCounter::new(1);
        let mut path = BranchPath::new();
        path.reshape(
            vec![
                IVec2::new(0, 0),
                IVec2::new(0, 1),
                IVec2::new(1, 1),
                IVec2::new(1, 2),
            ],
            &cfg,
            &barrier,
            0.0,
        );

        let cum = path.cumulative_lengths();
        assert_eq!(cum.len(), path.positions().len());
        assert_eq!(cum[0], 0.0);
        for pair in cum.windows(2) {
            assert!(pair[1] > pair[0], "lengths must strictly increase");
        }
    }

    #[test]
    fn reveal_walks_to_completion_and_decrements_barrier() {
        let cfg = test_config();
        let barrier = BarrierCounter::new(1);
        let mut path = BranchPath::new();
        path.reshape(straight_waypoints(), &cfg, &barrier, 0.0);

        // Mid-animation: a partial polyline shorter than the total.
        match path.tick(0.1) {
            PathTick::Partial { positions, widths } => {
                assert!(positions.len() >= 2);
                assert_eq!(positions.len(), widths.len());
                let drawn = positions
                    .windows(2)
                    .map(|w| (w[1] - w[0]).length())
                    .sum::<f32>();
                assert!(drawn < path.total_length());
            }
            other => panic!("expected partial frame, got {:?}", other),
        }

        // Past the end: the reveal completes exactly once.
        match path.tick(100.0) {
            PathTick::Revealed => {}
            other => panic!("expected reveal completion, got {:?}", other),
        }
        assert_eq!(barrier.value(), 0);

        // Settled: further ticks are idle and do not decrement again.
        assert!(matches!(path.tick(101.0), PathTick::Idle));
        assert_eq!(barrier.value(), 0);
    }

    #[test]
    fn reshape_mid_reveal_accrues_debt_not_leaks() {
        let cfg = test_config();
        let barrier = BarrierCounter::new(0);
        let mut path = BranchPath::new();

        barrier.increment();
        path.reshape(straight_waypoints(), &cfg, &barrier, 0.0);

        // Extend the branch before the first reveal finished.
        barrier.increment();
        let mut extended = straight_waypoints();
        extended.push(IVec2::new(0, 2));
        path.reshape(extended, &cfg, &barrier, 0.05);

        assert_eq!(barrier.value(), 2);
        match path.tick(100.0) {
            PathTick::Revealed => {}
            other => panic!("expected reveal completion, got {:?}", other),
        }
        assert_eq!(barrier.value(), 0, "both reshape debts must be repaid");
    }

    #[test]
    fn retract_waits_for_start_then_removes() {
        let cfg = test_config();
        let barrier = BarrierCounter::new(1);
        let mut path = BranchPath::new();
        path.reshape(straight_waypoints(), &cfg, &barrier, 0.0);
        assert!(matches!(path.tick(100.0), PathTick::Revealed));

        path.delete(200.0, 201.0);

        // Before the staggered start nothing happens.
        assert!(matches!(path.tick(199.0), PathTick::Idle));

        // Mid-retract: partial frame, shrinking.
        match path.tick(200.5) {
            PathTick::Partial { positions, .. } => {
                let drawn = positions
                    .windows(2)
                    .map(|w| (w[1] - w[0]).length())
                    .sum::<f32>();
                assert!(drawn < path.total_length());
            }
            other => panic!("expected partial frame, got {:?}", other),
        }

        // Past the end time the branch reports removal.
        assert!(matches!(path.tick(201.1), PathTick::Removed));
    }

    #[test]
    fn delete_mid_reveal_settles_outstanding_debt() {
        let cfg = test_config();
        let barrier = BarrierCounter::new(1);
        let mut path = BranchPath::new();
        path.reshape(straight_waypoints(), &cfg, &barrier, 0.0);

        // Deletion preempts the unfinished reveal.
        path.delete(0.1, 1.1);
        assert_eq!(barrier.value(), 0, "preempted reveal must settle its debt");

        assert!(matches!(path.tick(2.0), PathTick::Removed));
    }

    #[test]
    fn reveal_resumes_from_previous_length_after_extension() {
        let cfg = test_config();
        let barrier = BarrierCounter::new(2);
        let mut path = BranchPath::new();
        path.reshape(straight_waypoints(), &cfg, &barrier, 0.0);
        let first_total = path.total_length();
        assert!(matches!(path.tick(100.0), PathTick::Revealed));

        let mut extended = straight_waypoints();
        extended.push(IVec2::new(0, 2));
        path.reshape(extended, &cfg, &barrier, 100.0);

        // The second reveal only animates the newly added length.
        let expected = (path.total_length() - first_total) / cfg.animation_speed;
        assert!((path.anim_total - expected).abs() < 1e-5);
    }
}
