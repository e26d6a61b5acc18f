//! Per-tree growth and deletion automaton.
//!
//! A [`Tree`] owns its branches in an arena of tombstoned slots and a
//! local cell→branch ownership grid. Growth always targets the tree's
//! local coordinate space (the outer grid translates before calling
//! in). A new cell either extends the branch whose last waypoint it is
//! adjacent to, or forks a new branch off the side of an existing one;
//! the fork geometry prefers hooking through a previously-visited
//! diagonal cell and falls back to reaching two cells backward, which
//! keeps forks visually anchored instead of sprouting dense stubs.
//!
//! Deletion retracts every branch at once in wall-clock terms, but each
//! branch's start is delayed by its distance from the maximum depth, so
//! the retraction wavefront starts at the most distal tips and
//! converges on the root.

use glam::IVec2;
use tracing::debug;

use crate::config::Config;
use crate::counter::BarrierCounter;
use crate::error::GrowthError;
use crate::path::{BranchPath, PathTick};
use crate::stroke::StrokeGeometry;
use crate::types::{BranchId, TreeColor};

#[derive(Debug)]
pub struct Branch {
    pub path: BranchPath,
    pub stroke: StrokeGeometry,
    /// Arc-length distance from this branch's attachment point back to
    /// the tree's root, measured along the branch tree.
    pub depth_offset: f32,
}

impl Branch {
    /// Geodesic distance from this branch's tip back to the root.
    pub fn depth(&self) -> f32 {
        self.path.total_length() + self.depth_offset
    }
}

#[derive(Debug)]
enum DeleteState {
    Alive,
    /// `remove` was called; retraction is scheduled on the next tick.
    Scheduled { completion: BarrierCounter },
    /// Branches are retracting; the tree destroys itself at `end_time`.
    Waiting { completion: BarrierCounter, end_time: f32 },
    Done,
}

/// Result of advancing a tree by one tick.
#[derive(Debug, PartialEq, Eq)]
pub enum TreeTick {
    Alive,
    /// The retraction finished; the owner should drop this tree and its
    /// grid cells.
    Destroyed,
}

#[derive(Debug)]
pub struct Tree {
    pub color: TreeColor,
    /// Column of the outer grid this tree was seeded in.
    pub root_column: i32,
    grid_size: i32,
    /// Local cell→branch ownership, `grid_size * grid_size`, row-major.
    cells: Vec<Option<BranchId>>,
    branches: Vec<Option<Branch>>,
    state: DeleteState,
}

impl Tree {
    /// Creates a tree with its root branch running from just below the
    /// ground row up through local row 1, and starts the root's reveal.
    pub fn new(
        color: TreeColor,
        root_column: i32,
        cfg: &Config,
        barrier: &BarrierCounter,
        now: f32,
    ) -> Self {
        let grid_size = cfg.local_grid_size();
        let mut tree = Self {
            color,
            root_column,
            grid_size,
            cells: vec![None; (grid_size * grid_size) as usize],
            branches: Vec::new(),
            state: DeleteState::Alive,
        };

        let c = grid_size / 2;
        tree.make_branch(
            vec![IVec2::new(c, -1), IVec2::new(c, 0), IVec2::new(c, 1)],
            cfg,
            barrier,
            now,
        );
        tree
    }

    pub fn is_deleting(&self) -> bool {
        !matches!(self.state, DeleteState::Alive)
    }

    pub fn branch(&self, id: BranchId) -> Option<&Branch> {
        self.branches.get(id).and_then(|slot| slot.as_ref())
    }

    /// Live branches with their arena ids.
    pub fn branches(&self) -> impl Iterator<Item = (BranchId, &Branch)> {
        self.branches
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|b| (id, b)))
    }

    /// Owning branch of a local cell, if any.
    pub fn branch_at(&self, x: i32, y: i32) -> Option<BranchId> {
        if !self.is_valid_coord(x, y) {
            return None;
        }
        self.cells[(y * self.grid_size + x) as usize]
    }

    /// Grows the tree into local cell `point`.
    ///
    /// The cell must be adjacent (left, right or below) to a cell owned
    /// by one of this tree's branches; the outer grid's neighbor check
    /// guarantees that before routing the call here.
    pub fn add_point(
        &mut self,
        point: IVec2,
        cfg: &Config,
        barrier: &BarrierCounter,
        now: f32,
    ) -> Result<BranchId, GrowthError> {
        let (x, y) = (point.x, point.y);

        if let Some(left) = self.branch_at(x - 1, y) {
            if self.is_last_point(left, IVec2::new(x - 1, y)) {
                return Ok(self.extend_branch(left, point, cfg, barrier, now));
            }
            // Fork off the left branch's side: hook through the lower
            // diagonal it already visited, else reach two cells back.
            let diagonal = IVec2::new(x - 1, y - 1);
            let waypoints = if self.is_valid_coord(diagonal.x, diagonal.y)
                && self.branch_contains(left, diagonal)
            {
                vec![diagonal, IVec2::new(x - 1, y), point]
            } else {
                vec![IVec2::new(x - 2, y), IVec2::new(x - 1, y), point]
            };
            return Ok(self.make_branch(waypoints, cfg, barrier, now));
        }

        if let Some(right) = self.branch_at(x + 1, y) {
            if self.is_last_point(right, IVec2::new(x + 1, y)) {
                return Ok(self.extend_branch(right, point, cfg, barrier, now));
            }
            let diagonal = IVec2::new(x + 1, y - 1);
            let waypoints = if self.is_valid_coord(diagonal.x, diagonal.y)
                && self.branch_contains(right, diagonal)
            {
                vec![diagonal, IVec2::new(x + 1, y), point]
            } else {
                vec![IVec2::new(x + 2, y), IVec2::new(x + 1, y), point]
            };
            return Ok(self.make_branch(waypoints, cfg, barrier, now));
        }

        if let Some(below) = self.branch_at(x, y - 1) {
            if self.is_last_point(below, IVec2::new(x, y - 1)) {
                return Ok(self.extend_branch(below, point, cfg, barrier, now));
            }
            // The below fork only hooks sideways when the below branch
            // runs through BOTH lower diagonals; the hook then bends
            // against the below branch's own travel direction. This is
            // deliberately stricter than the left/right cases.
            let dl = IVec2::new(x - 1, y - 1);
            let dr = IVec2::new(x + 1, y - 1);
            if self.is_valid_coord(dl.x, dl.y)
                && self.branch_contains(below, dl)
                && self.is_valid_coord(dr.x, dr.y)
                && self.branch_contains(below, dr)
                && let Some(branch) = self.branch(below)
                && let Some(ind) = branch.path.waypoint_index(IVec2::new(x, y - 1))
                && ind + 1 < branch.path.waypoints().len()
            {
                let dir = if branch.path.waypoints()[ind + 1] == dr {
                    -1
                } else {
                    1
                };
                let waypoints = vec![IVec2::new(x + dir, y - 1), IVec2::new(x, y - 1), point];
                return Ok(self.make_branch(waypoints, cfg, barrier, now));
            }
            let waypoints = vec![IVec2::new(x, y - 2), IVec2::new(x, y - 1), point];
            return Ok(self.make_branch(waypoints, cfg, barrier, now));
        }

        debug_assert!(false, "add_point on a cell with no adjacent branch");
        Err(GrowthError::NoMatchingNeighbor { x, y })
    }

    /// Schedules this tree's retraction. The `completion` barrier is
    /// decremented exactly once, when the last branch has finished.
    pub fn remove(&mut self, completion: &BarrierCounter) {
        if self.is_deleting() {
            return;
        }
        debug!(color = ?self.color, root = self.root_column, "tree retraction scheduled");
        self.state = DeleteState::Scheduled {
            completion: completion.clone(),
        };
    }

    /// Advances all branch animations and the deletion sequence.
    pub fn tick(&mut self, cfg: &Config, now: f32) -> TreeTick {
        for slot in &mut self.branches {
            if let Some(branch) = slot {
                match branch.path.tick(now) {
                    PathTick::Partial { positions, widths } => {
                        branch.stroke.reshape(&positions, &widths);
                    }
                    PathTick::Revealed => {
                        let Branch { path, stroke, .. } = branch;
                        stroke.reshape(path.positions(), path.widths());
                    }
                    PathTick::Removed => {
                        *slot = None;
                    }
                    PathTick::Idle => {}
                }
            }
        }

        match std::mem::replace(&mut self.state, DeleteState::Done) {
            DeleteState::Alive => {
                self.state = DeleteState::Alive;
                TreeTick::Alive
            }
            DeleteState::Scheduled { completion } => {
                let end_time = self.schedule_retraction(cfg, now);
                self.state = DeleteState::Waiting {
                    completion,
                    end_time,
                };
                TreeTick::Alive
            }
            DeleteState::Waiting {
                completion,
                end_time,
            } => {
                if now > end_time {
                    completion.decrement();
                    debug!(color = ?self.color, root = self.root_column, "tree retraction finished");
                    self.state = DeleteState::Done;
                    TreeTick::Destroyed
                } else {
                    self.state = DeleteState::Waiting {
                        completion,
                        end_time,
                    };
                    TreeTick::Alive
                }
            }
            DeleteState::Done => TreeTick::Destroyed,
        }
    }

    /// Starts every branch's retract walk, delayed so the deepest tips
    /// begin first, and returns the time the whole tree finishes.
    fn schedule_retraction(&mut self, cfg: &Config, now: f32) -> f32 {
        let max_depth = self
            .branches()
            .map(|(_, b)| b.depth())
            .fold(0.0_f32, f32::max);

        let mut end_time = 0.0_f32;
        for slot in &mut self.branches {
            if let Some(branch) = slot {
                let depth = branch.path.total_length() + branch.depth_offset;
                let start = now + (max_depth - depth) / cfg.delete_speed;
                let end = start + branch.path.total_length() / cfg.delete_speed;
                branch.path.delete(start, end);
                end_time = end_time.max(end);
            }
        }
        end_time
    }

    fn extend_branch(
        &mut self,
        id: BranchId,
        point: IVec2,
        cfg: &Config,
        barrier: &BarrierCounter,
        now: f32,
    ) -> BranchId {
        if let Some(branch) = self.branches[id].as_mut() {
            let mut waypoints = branch.path.waypoints().to_vec();
            waypoints.push(point);
            branch.path.reshape(waypoints, cfg, barrier, now);
        }
        self.claim_cell(point, id);
        id
    }

    fn make_branch(
        &mut self,
        waypoints: Vec<IVec2>,
        cfg: &Config,
        barrier: &BarrierCounter,
        now: f32,
    ) -> BranchId {
        let mut path = BranchPath::new();
        path.reshape(waypoints, cfg, barrier, now);

        // The new branch attaches along the branch that owns its second
        // waypoint; its depth is the base branch's arc length at the
        // attachment point plus the base's own depth.
        let mut depth_offset = 0.0;
        let base_cell = path.waypoints()[1];
        if let Some(base_id) = self.branch_at(base_cell.x, base_cell.y)
            && let Some(base) = self.branch(base_id)
        {
            let positions = path.positions();
            let mut i = positions.len() - 1;
            while i > 0 && !base.path.approx_contains(positions[i]) {
                i -= 1;
            }

            let mut intersection = positions[i];
            let mut offseted = 0.0;
            if i == 0 {
                // The walk fell off the path start: the attachment sits
                // inside the first corner arc, one turn radius to either
                // side of the second position.
                i = 1;
                offseted = cfg.turn_radius;
                let offset =
                    (path.waypoints()[1] - path.waypoints()[0]).as_vec2() * cfg.turn_radius;
                intersection = positions[1] - offset;
                if !base.path.approx_contains(intersection) {
                    offseted = -cfg.turn_radius;
                    intersection = positions[1] + offset;
                }
            }

            if let Some(j) = base.path.approx_index_of(intersection) {
                let depth =
                    base.path.cumulative_lengths()[j] - path.cumulative_lengths()[i] + offseted;
                depth_offset = depth + base.depth_offset;
            } else {
                debug_assert!(false, "fork attachment not found on base branch");
            }
        }

        let id = self.branches.len();
        let claims: Vec<IVec2> = path.waypoints().to_vec();
        self.branches.push(Some(Branch {
            path,
            stroke: StrokeGeometry::new(cfg.stroke_segments, cfg.terminator_length),
            depth_offset,
        }));

        for point in claims {
            if self.is_valid_coord(point.x, point.y) && self.branch_at(point.x, point.y).is_none() {
                self.claim_cell(point, id);
            }
        }

        id
    }

    fn claim_cell(&mut self, point: IVec2, id: BranchId) {
        if self.is_valid_coord(point.x, point.y) {
            self.cells[(point.y * self.grid_size + point.x) as usize] = Some(id);
        }
    }

    fn is_valid_coord(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.grid_size && y >= 0 && y < self.grid_size
    }

    fn is_last_point(&self, id: BranchId, point: IVec2) -> bool {
        self.branch(id)
            .and_then(|b| b.path.last_waypoint())
            .is_some_and(|last| last == point)
    }

    fn branch_contains(&self, id: BranchId, point: IVec2) -> bool {
        self.branch(id).is_some_and(|b| b.path.contains_waypoint(point))
    }
}
