//! Outer grid ownership and the growth/merge/delete automaton.
//!
//! [`GridOwnership`] maps committed grid cells to the trees that own
//! them and decides what a landing marker does: connect to a neighbor
//! tree, collide with a different color, or keep falling. Ownership
//! changes are never visible mid-cycle — connects are buffered in a
//! pending table and only copied into the committed map by
//! [`GridOwnership::update_grid`], the single atomic boundary between
//! growth cycles.
//!
//! A cell bridging two or more trees of one resolved color is a
//! merge-collision: every participant draws the shared waypoint, then
//! the whole set retracts. The retraction is sequenced without any
//! callback scheduler: a removal group inherits the marker's hold on
//! the global animation barrier, waits (polled once per tick, throttled)
//! until the barrier drops back to the held baseline, tells each tree to
//! retract against a shared completion barrier, and releases its hold
//! once that completion barrier returns to zero.

use std::collections::HashMap;

use glam::IVec2;
use rand::Rng;
use tracing::{debug, warn};

use crate::config::Config;
use crate::counter::BarrierCounter;
use crate::error::GrowthError;
use crate::tree::{Tree, TreeTick};
use crate::types::{TreeColor, TreeId};

/// Verdict for a marker crossing a grid row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropCheck {
    /// The cell attached to a tree (or seeded one); the marker is done.
    Connect,
    /// The cell collided with a different-color tree below, or a
    /// wildcard reached the ground row; the marker dies without growth.
    Conflict,
    /// Nothing to attach to here; keep falling.
    Empty,
}

#[derive(Debug)]
struct PendingAdd {
    tree: TreeId,
    cell: IVec2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GroupState {
    /// Created but not yet armed by `delayed_remove`.
    Scheduled,
    /// Waiting for the global barrier to drop to the held baseline.
    WaitingSettle,
    /// Trees are retracting; waiting for the completion barrier.
    WaitingFinish,
}

/// One merge-collision event and the trees it will take down.
#[derive(Debug)]
struct RemovalGroup {
    trees: Vec<TreeId>,
    completion: BarrierCounter,
    state: GroupState,
    /// Marker increments this event inherited from the global barrier:
    /// one from the collision that created it, one more per chained
    /// collision that joined it. Released when the group finishes.
    held: i32,
}

/// A wildcard connect whose waypoint commit waits for the color-settle
/// pause. The color and tree set are decided synchronously at check
/// time; only the commit is deferred.
#[derive(Debug)]
struct PendingWildcard {
    cell: IVec2,
    trees: Vec<TreeId>,
    color: TreeColor,
    deadline: f32,
}

pub struct GridOwnership {
    cfg: Config,
    /// Committed cell→tree ownership, `width * height`, row-major.
    committed: Vec<Option<TreeId>>,
    trees: Vec<Option<Tree>>,
    /// Root column per tree, recorded when its row-0 cell commits; used
    /// to translate outer cells into tree-local coordinates.
    roots: HashMap<TreeId, i32>,
    pending_adds: Vec<PendingAdd>,
    groups: Vec<RemovalGroup>,
    pending_wildcards: Vec<PendingWildcard>,
    /// Global any-animation-in-flight barrier, shared with the caller.
    anim: BarrierCounter,
    last_poll: f32,
    /// Whether `delayed_remove` already armed this growth cycle; groups
    /// born later in the cycle (wildcard commits) arm themselves.
    armed: bool,
}

impl GridOwnership {
    pub fn new(cfg: Config, anim: &BarrierCounter) -> Self {
        let cells = (cfg.width * cfg.height) as usize;
        Self {
            cfg,
            committed: vec![None; cells],
            trees: Vec::new(),
            roots: HashMap::new(),
            pending_adds: Vec::new(),
            groups: Vec::new(),
            pending_wildcards: Vec::new(),
            anim: anim.clone(),
            last_poll: f32::MIN,
            armed: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn tree(&self, id: TreeId) -> Option<&Tree> {
        self.trees.get(id).and_then(|slot| slot.as_ref())
    }

    /// Live trees with their ids.
    pub fn trees(&self) -> impl Iterator<Item = (TreeId, &Tree)> {
        self.trees
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|t| (id, t)))
    }

    /// Committed owner of a cell; destroyed trees read as unowned.
    pub fn owner_at(&self, x: i32, y: i32) -> Option<TreeId> {
        if !self.in_bounds(x, y) {
            return None;
        }
        self.committed[(y * self.cfg.width + x) as usize].filter(|&id| self.tree(id).is_some())
    }

    /// Wildcards waiting out their color-settle pause, for display.
    pub fn pending_wildcards(&self) -> impl Iterator<Item = (IVec2, TreeColor)> {
        self.pending_wildcards.iter().map(|w| (w.cell, w.color))
    }

    /// Whether any merge-collision is still unresolved.
    pub fn has_pending_removals(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Decides what a marker crossing `point` does.
    ///
    /// On the ground row any concrete color seeds a new tree; a
    /// wildcard cannot seed and conflicts. Above ground, the three
    /// committed neighbors (left, right, below) are consulted: at least
    /// one match connects and performs the add, a different-color tree
    /// directly below conflicts, anything else is empty air.
    ///
    /// The `rng` is only drawn from when a wildcard resolves its color.
    pub fn check_neighbors(
        &mut self,
        point: IVec2,
        color: TreeColor,
        rng: &mut impl Rng,
        now: f32,
    ) -> Result<DropCheck, GrowthError> {
        let (x, y) = (point.x, point.y);
        if !self.in_bounds(x, y) {
            debug_assert!(false, "check_neighbors out of bounds at ({x}, {y})");
            return Err(GrowthError::InvalidCoordinate { x, y });
        }
        debug_assert!(
            color.is_concrete() || color == TreeColor::Wildcard,
            "markers carry a concrete color or a wildcard"
        );

        if y == 0 {
            // A wildcard has nothing to resolve against at the ground.
            if color == TreeColor::Wildcard {
                return Ok(DropCheck::Conflict);
            }
            self.make_tree(x, color, now);
            return Ok(DropCheck::Connect);
        }

        if self.can_add(x - 1, y, color)
            || self.can_add(x + 1, y, color)
            || self.can_add(x, y - 1, color)
        {
            self.add_point(point, color, rng, now)?;
            Ok(DropCheck::Connect)
        } else if self
            .owner_at(x, y - 1)
            .and_then(|id| self.tree(id))
            .is_some_and(|tree| tree.color != color)
        {
            Ok(DropCheck::Conflict)
        } else {
            Ok(DropCheck::Empty)
        }
    }

    /// Copies every pending add into committed ownership, recording
    /// root columns from row-0 cells, then drops references to trees
    /// that have been destroyed and clears the resolved bookkeeping.
    ///
    /// This is the only place ownership becomes visible: lookups during
    /// a growth cycle never see a half-grown tree.
    pub fn update_grid(&mut self) {
        for PendingAdd { tree, cell } in std::mem::take(&mut self.pending_adds) {
            if self.tree(tree).is_some() {
                if cell.y == 0 {
                    self.roots.insert(tree, cell.x);
                }
                self.committed[(cell.y * self.cfg.width + cell.x) as usize] = Some(tree);
            }
        }

        for slot in &mut self.committed {
            if let Some(id) = *slot
                && self.trees.get(id).is_none_or(|t| t.is_none())
            {
                *slot = None;
            }
        }
        let trees = &self.trees;
        self.roots
            .retain(|&id, _| trees.get(id).is_some_and(|t| t.is_some()));

        self.armed = false;
    }

    /// Arms the deferred-deletion watcher for every collision scheduled
    /// this cycle. Call once per growth cycle, after the cycle's markers
    /// have resolved; idempotent.
    pub fn delayed_remove(&mut self) {
        self.armed = true;
        for group in &mut self.groups {
            if group.state == GroupState::Scheduled {
                debug!(trees = ?group.trees, "removal watcher armed");
                group.state = GroupState::WaitingSettle;
            }
        }
    }

    /// Advances every animation and watcher to wall-clock time `now`.
    /// This is the single driver entry point, called once per frame.
    pub fn tick(&mut self, now: f32) {
        // Animations advance every frame.
        let cfg = self.cfg;
        let mut reaped = Vec::new();
        for (id, slot) in self.trees.iter_mut().enumerate() {
            if let Some(tree) = slot
                && tree.tick(&cfg, now) == TreeTick::Destroyed
            {
                *slot = None;
                reaped.push(id);
            }
        }
        for id in reaped {
            self.clear_tree_refs(id);
        }

        // Watchers and timers poll at the configured throttle.
        if now - self.last_poll < self.cfg.poll_interval {
            return;
        }
        self.last_poll = now;

        self.commit_due_wildcards(now);
        self.advance_removal_groups();
    }

    fn commit_due_wildcards(&mut self, now: f32) {
        let pending = std::mem::take(&mut self.pending_wildcards);
        let (due, rest): (Vec<_>, Vec<_>) = pending.into_iter().partition(|w| w.deadline <= now);
        self.pending_wildcards = rest;

        for wildcard in due {
            let alive: Vec<TreeId> = wildcard
                .trees
                .iter()
                .copied()
                .filter(|&id| self.tree(id).is_some())
                .collect();
            if alive.is_empty() {
                // Nothing left to grow; release the marker's hold so
                // the cycle still settles.
                warn!(cell = ?wildcard.cell, "wildcard commit found no live trees");
                self.anim.decrement();
                continue;
            }
            debug!(cell = ?wildcard.cell, color = ?wildcard.color, "wildcard settled");
            self.commit_add(wildcard.cell, &alive, now);
        }
    }

    fn advance_removal_groups(&mut self) {
        let anim_value = self.anim.value();
        let held_total: i32 = self.groups.iter().map(|g| g.held).sum();

        let mut finished = Vec::new();
        for gi in 0..self.groups.len() {
            match self.groups[gi].state {
                GroupState::Scheduled => {}
                GroupState::WaitingSettle => {
                    if anim_value <= held_total {
                        let completion = self.groups[gi].completion.clone();
                        for t in self.groups[gi].trees.clone() {
                            if let Some(tree) = self.trees.get_mut(t).and_then(|s| s.as_mut()) {
                                completion.increment();
                                tree.remove(&completion);
                            }
                        }
                        debug!(trees = ?self.groups[gi].trees, "collision trees retracting");
                        self.groups[gi].state = GroupState::WaitingFinish;
                    }
                }
                GroupState::WaitingFinish => {
                    if self.groups[gi].completion.value() == 0 {
                        debug!(trees = ?self.groups[gi].trees, "collision resolved");
                        self.anim.decrement_by(self.groups[gi].held);
                        finished.push(gi);
                    }
                }
            }
        }
        for gi in finished.into_iter().rev() {
            self.groups.remove(gi);
        }
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.cfg.width && y < self.cfg.height
    }

    /// Whether the committed cell at (x, y) belongs to a live tree this
    /// color can attach to. A wildcard attaches to anything committed.
    fn can_add(&self, x: i32, y: i32, color: TreeColor) -> bool {
        self.owner_at(x, y)
            .and_then(|id| self.tree(id))
            .is_some_and(|tree| tree.color == color || color == TreeColor::Wildcard)
    }

    fn make_tree(&mut self, x: i32, color: TreeColor, now: f32) {
        debug_assert!(self.owner_at(x, 0).is_none(), "ground cell already owned");

        let id = self.trees.len();
        debug!(id, ?color, column = x, "tree seeded");
        self.trees
            .push(Some(Tree::new(color, x, &self.cfg, &self.anim, now)));

        // The root branch spans the ground cell and the one above it.
        self.pending_adds.push(PendingAdd {
            tree: id,
            cell: IVec2::new(x, 0),
        });
        if self.cfg.height > 1 {
            self.pending_adds.push(PendingAdd {
                tree: id,
                cell: IVec2::new(x, 1),
            });
        }
    }

    /// Distinct trees among the three committed neighbors this color
    /// can attach to.
    fn matching_neighbors(&self, point: IVec2, color: TreeColor) -> Vec<TreeId> {
        let (x, y) = (point.x, point.y);
        let mut matching = Vec::with_capacity(3);
        for (nx, ny) in [(x - 1, y), (x + 1, y), (x, y - 1)] {
            if self.can_add(nx, ny, color)
                && let Some(id) = self.owner_at(nx, ny)
                && !matching.contains(&id)
            {
                matching.push(id);
            }
        }
        matching
    }

    fn add_point(
        &mut self,
        point: IVec2,
        color: TreeColor,
        rng: &mut impl Rng,
        now: f32,
    ) -> Result<(), GrowthError> {
        let matching = self.matching_neighbors(point, color);
        if matching.is_empty() {
            debug_assert!(false, "add_point with no matching neighbor");
            return Err(GrowthError::NoMatchingNeighbor {
                x: point.x,
                y: point.y,
            });
        }

        if color == TreeColor::Wildcard {
            // Resolve the color now — uniformly over the DISTINCT colors
            // present among matching trees, not over the trees — but
            // defer the waypoint commit until the settle pause elapses.
            let mut colors: Vec<TreeColor> = Vec::with_capacity(3);
            for &id in &matching {
                if let Some(tree) = self.tree(id)
                    && !colors.contains(&tree.color)
                {
                    colors.push(tree.color);
                }
            }
            if colors.is_empty() {
                debug_assert!(false, "wildcard resolution with no neighbor colors");
                return Err(GrowthError::AmbiguousWildcard {
                    x: point.x,
                    y: point.y,
                });
            }
            let resolved = colors[rng.random_range(0..colors.len())];
            let trees: Vec<TreeId> = matching
                .into_iter()
                .filter(|&id| self.tree(id).is_some_and(|t| t.color == resolved))
                .collect();
            debug!(cell = ?point, ?resolved, ?trees, "wildcard resolved");

            self.pending_wildcards.push(PendingWildcard {
                cell: point,
                trees,
                color: resolved,
                deadline: now + self.cfg.wildcard_settle,
            });
            return Ok(());
        }

        self.commit_add(point, &matching, now);
        Ok(())
    }

    /// Routes a resolved connect to its tree set: a single match extends
    /// that tree in place, several matches are a merge-collision.
    fn commit_add(&mut self, cell: IVec2, matching: &[TreeId], now: f32) {
        if let [single] = matching {
            self.grow_tree(*single, cell, now);
            return;
        }

        // Merge-collision. Trees already falling with an earlier
        // collision are left alone; the rest draw the shared waypoint
        // and are scheduled. A collision touching an in-flight group
        // joins it and reuses its completion barrier (merges chain).
        let existing = self
            .groups
            .iter()
            .position(|g| matching.iter().any(|id| g.trees.contains(id)));
        let fresh: Vec<TreeId> = matching
            .iter()
            .copied()
            .filter(|id| !self.groups.iter().any(|g| g.trees.contains(id)))
            .collect();

        self.anim.increment_by(fresh.len() as i32);
        for &id in &fresh {
            self.grow_tree(id, cell, now);
        }

        match existing {
            Some(gi) => {
                debug!(cell = ?cell, joining = ?fresh, "collision chained onto existing group");
                self.groups[gi].held += 1;
                self.groups[gi].trees.extend(fresh);
            }
            None => {
                debug!(cell = ?cell, trees = ?fresh, "merge-collision scheduled");
                self.groups.push(RemovalGroup {
                    trees: fresh,
                    completion: BarrierCounter::new(0),
                    state: if self.armed {
                        GroupState::WaitingSettle
                    } else {
                        GroupState::Scheduled
                    },
                    held: 1,
                });
            }
        }
    }

    /// Adds `cell` to one tree (waypoint immediately, so the branch can
    /// start revealing; grid ownership only as a pending add).
    fn grow_tree(&mut self, id: TreeId, cell: IVec2, now: f32) {
        let local = self.grid_to_tree_coords(cell, id);
        let cfg = self.cfg;
        let anim = self.anim.clone();
        if let Some(tree) = self.trees.get_mut(id).and_then(|s| s.as_mut())
            && let Err(err) = tree.add_point(local, &cfg, &anim, now)
        {
            warn!(%err, ?cell, "tree rejected a gated add");
            return;
        }
        self.pending_adds.push(PendingAdd { tree: id, cell });
    }

    /// Translates an outer grid cell into a tree's local grid space.
    fn grid_to_tree_coords(&self, cell: IVec2, id: TreeId) -> IVec2 {
        let root = self
            .roots
            .get(&id)
            .copied()
            .or_else(|| self.tree(id).map(|t| t.root_column))
            .unwrap_or(0);
        IVec2::new(cell.x - root + self.cfg.local_grid_size() / 2, cell.y)
    }

    fn clear_tree_refs(&mut self, id: TreeId) {
        for slot in &mut self.committed {
            if *slot == Some(id) {
                *slot = None;
            }
        }
        self.roots.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn test_config() -> Config {
        Config {
            width: 3,
            height: 4,
            ..Config::default()
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    /// Runs ticks until the barrier settles back to `baseline` or the
    /// frame budget runs out.
    fn run_until_settled(grid: &mut GridOwnership, anim: &BarrierCounter, from: f32) -> f32 {
        let mut t = from;
        for _ in 0..100_000 {
            t += 0.016;
            grid.tick(t);
            if anim.value() == 0 && !grid.has_pending_removals() {
                return t;
            }
        }
        panic!("simulation did not settle: barrier = {}", anim.value());
    }

    #[test]
    fn ground_row_seeds_a_tree_and_commits_on_update() {
        let anim = BarrierCounter::new(0);
        let mut grid = GridOwnership::new(test_config(), &anim);
        let mut rng = rng();

        anim.increment(); // the falling marker
        let check = grid
            .check_neighbors(IVec2::new(0, 0), TreeColor::Red, &mut rng, 0.0)
            .unwrap();
        assert_eq!(check, DropCheck::Connect);

        // Deferred commit: nothing visible until update_grid.
        assert_eq!(grid.owner_at(0, 0), None);
        grid.update_grid();
        let id = grid.owner_at(0, 0).expect("ground cell committed");
        assert_eq!(grid.owner_at(0, 1), Some(id));
        assert_eq!(grid.tree(id).unwrap().color, TreeColor::Red);
        assert_eq!(grid.tree(id).unwrap().root_column, 0);

        // The root reveal consumes the marker's barrier hold.
        grid.tick(100.0);
        assert_eq!(anim.value(), 0);
    }

    #[test]
    fn wildcard_on_ground_row_always_conflicts() {
        let anim = BarrierCounter::new(0);
        let mut grid = GridOwnership::new(test_config(), &anim);
        let mut rng = rng();

        for x in 0..3 {
            let check = grid
                .check_neighbors(IVec2::new(x, 0), TreeColor::Wildcard, &mut rng, 0.0)
                .unwrap();
            assert_eq!(check, DropCheck::Conflict);
        }
        assert_eq!(grid.trees().count(), 0);
    }

    #[test]
    fn out_of_bounds_coordinate_is_reported() {
        let anim = BarrierCounter::new(0);
        let mut grid = GridOwnership::new(test_config(), &anim);
        let mut rng = rng();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            grid.check_neighbors(IVec2::new(5, 1), TreeColor::Red, &mut rng, 0.0)
        }));
        // Debug builds assert; release builds return the error.
        if let Ok(inner) = result {
            assert_eq!(inner, Err(GrowthError::InvalidCoordinate { x: 5, y: 1 }));
        }
    }

    #[test]
    fn falling_marker_extends_the_tree_it_lands_on() {
        let anim = BarrierCounter::new(0);
        let mut grid = GridOwnership::new(test_config(), &anim);
        let mut rng = rng();

        anim.increment();
        grid.check_neighbors(IVec2::new(0, 0), TreeColor::Red, &mut rng, 0.0)
            .unwrap();
        grid.update_grid();
        grid.tick(10.0);
        assert_eq!(anim.value(), 0);

        // Second marker falls down column 0: rows 3 and 2 are empty
        // air until it reaches the cell above the committed (0, 1).
        anim.increment();
        let c3 = grid
            .check_neighbors(IVec2::new(0, 3), TreeColor::Red, &mut rng, 10.0)
            .unwrap();
        assert_eq!(c3, DropCheck::Empty);
        let c2 = grid
            .check_neighbors(IVec2::new(0, 2), TreeColor::Red, &mut rng, 10.0)
            .unwrap();
        assert_eq!(c2, DropCheck::Connect);

        grid.update_grid();
        grid.tick(20.0);
        assert_eq!(anim.value(), 0);

        let id = grid.owner_at(0, 2).expect("extension committed");
        let tree = grid.tree(id).unwrap();
        assert_eq!(
            tree.branches().count(),
            1,
            "straight growth must extend, not fork"
        );
    }

    #[test]
    fn committed_cells_match_tree_waypoints_after_growth() {
        let cfg = test_config();
        let anim = BarrierCounter::new(0);
        let mut grid = GridOwnership::new(cfg, &anim);
        let mut rng = rng();

        anim.increment();
        grid.check_neighbors(IVec2::new(1, 0), TreeColor::Green, &mut rng, 0.0)
            .unwrap();
        grid.update_grid();
        grid.tick(10.0);

        anim.increment();
        grid.check_neighbors(IVec2::new(1, 2), TreeColor::Green, &mut rng, 10.0)
            .unwrap();
        grid.update_grid();
        grid.tick(20.0);

        let id = grid.owner_at(1, 0).unwrap();
        let tree = grid.tree(id).unwrap();

        // Every committed cell of this tree corresponds to exactly one
        // waypoint of exactly one branch, translated to local space.
        let half = cfg.local_grid_size() / 2;
        for y in 0..cfg.height {
            for x in 0..cfg.width {
                let local = IVec2::new(x - 1 + half, y);
                let owned = grid.owner_at(x, y) == Some(id);
                let claimed = tree
                    .branches()
                    .filter(|(_, b)| b.path.contains_waypoint(local))
                    .count();
                if owned {
                    assert_eq!(claimed, 1, "cell ({x},{y}) must map to one waypoint");
                } else {
                    assert_eq!(claimed, 0, "cell ({x},{y}) is not owned");
                }
            }
        }
    }

    #[test]
    fn different_color_beside_a_tree_is_empty_air() {
        let anim = BarrierCounter::new(0);
        let mut grid = GridOwnership::new(test_config(), &anim);
        let mut rng = rng();

        anim.increment();
        grid.check_neighbors(IVec2::new(0, 0), TreeColor::Red, &mut rng, 0.0)
            .unwrap();
        grid.update_grid();
        grid.tick(10.0);

        // (1, 1): left neighbor (0, 1) is RED, below (1, 0) is empty —
        // a GREEN marker neither connects nor conflicts.
        let check = grid
            .check_neighbors(IVec2::new(1, 1), TreeColor::Green, &mut rng, 10.0)
            .unwrap();
        assert_eq!(check, DropCheck::Empty);
    }

    #[test]
    fn different_color_directly_below_conflicts() {
        let anim = BarrierCounter::new(0);
        let mut grid = GridOwnership::new(test_config(), &anim);
        let mut rng = rng();

        anim.increment();
        grid.check_neighbors(IVec2::new(0, 0), TreeColor::Red, &mut rng, 0.0)
            .unwrap();
        grid.update_grid();
        grid.tick(10.0);

        // (0, 2) sits directly above the tree's committed (0, 1).
        let check = grid
            .check_neighbors(IVec2::new(0, 2), TreeColor::Green, &mut rng, 10.0)
            .unwrap();
        assert_eq!(check, DropCheck::Conflict);
    }

    /// Builds two same-color trees a column apart, settled and
    /// committed, ready to be bridged at (1, 1).
    fn two_red_trees(anim: &BarrierCounter) -> (GridOwnership, StdRng) {
        let mut grid = GridOwnership::new(test_config(), anim);
        let mut rng = rng();

        anim.increment();
        grid.check_neighbors(IVec2::new(0, 0), TreeColor::Red, &mut rng, 0.0)
            .unwrap();
        anim.increment();
        grid.check_neighbors(IVec2::new(2, 0), TreeColor::Red, &mut rng, 0.0)
            .unwrap();
        grid.update_grid();
        grid.tick(10.0);
        assert_eq!(anim.value(), 0);

        (grid, rng)
    }

    #[test]
    fn bridging_cell_schedules_both_trees_and_holds_the_barrier() {
        let anim = BarrierCounter::new(0);
        let (mut grid, mut rng) = two_red_trees(&anim);

        // The bridging marker: (1, 1) touches both trees' committed
        // row-1 cells.
        anim.increment();
        let check = grid
            .check_neighbors(IVec2::new(1, 1), TreeColor::Red, &mut rng, 10.0)
            .unwrap();
        assert_eq!(check, DropCheck::Connect);

        // Marker hold + one reveal per participating tree.
        assert_eq!(anim.value(), 3);
        assert!(grid.has_pending_removals());

        grid.delayed_remove();

        // Both trees retract and die; the event releases its hold.
        let settled = run_until_settled(&mut grid, &anim, 10.0);
        assert_eq!(grid.trees().count(), 0);
        assert!(settled > 10.0);

        // All ownership is gone after the commit boundary.
        grid.update_grid();
        for y in 0..4 {
            for x in 0..3 {
                assert_eq!(grid.owner_at(x, y), None);
            }
        }
    }

    #[test]
    fn removal_does_not_start_while_reveals_are_in_flight() {
        let anim = BarrierCounter::new(0);
        let (mut grid, mut rng) = two_red_trees(&anim);

        anim.increment();
        grid.check_neighbors(IVec2::new(1, 1), TreeColor::Red, &mut rng, 10.0)
            .unwrap();
        grid.delayed_remove();

        // Immediately after the bridge, the final-segment reveals are
        // still animating: the watcher must hold off.
        grid.tick(10.02);
        assert!(
            grid.trees().all(|(_, t)| !t.is_deleting()),
            "retraction must wait for the reveal barrier"
        );

        // Once reveals finish, retraction begins.
        grid.tick(20.0);
        grid.tick(20.02);
        assert!(grid.trees().all(|(_, t)| t.is_deleting()));
    }

    #[test]
    fn wildcard_resolution_is_uniform_over_distinct_colors() {
        // Neighbors: RED on both sides of (1, 1) plus GREEN below it —
        // colors {RED, GREEN}, so each should win about half the time
        // even though RED has two trees.
        let mut red_wins = 0;
        let trials = 400;
        for seed in 0..trials {
            let anim = BarrierCounter::new(0);
            let mut grid = GridOwnership::new(test_config(), &anim);
            let mut rng = StdRng::seed_from_u64(seed);

            for (x, color) in [(0, TreeColor::Red), (2, TreeColor::Red), (1, TreeColor::Green)] {
                anim.increment();
                grid.check_neighbors(IVec2::new(x, 0), color, &mut rng, 0.0)
                    .unwrap();
            }
            grid.update_grid();
            grid.tick(10.0);
            assert_eq!(anim.value(), 0);

            // (1, 1): left and right neighbors are the two RED trees,
            // below is the GREEN one.
            anim.increment();
            let check = grid
                .check_neighbors(IVec2::new(1, 1), TreeColor::Wildcard, &mut rng, 10.0)
                .unwrap();
            assert_eq!(check, DropCheck::Connect);

            let (_, resolved) = grid.pending_wildcards().next().expect("wildcard pending");
            if resolved == TreeColor::Red {
                red_wins += 1;
            }
        }

        let ratio = red_wins as f64 / trials as f64;
        assert!(
            (0.4..=0.6).contains(&ratio),
            "expected ~0.5 red, got {ratio}"
        );
    }

    #[test]
    fn wildcard_commit_waits_for_the_settle_pause() {
        let anim = BarrierCounter::new(0);
        let (mut grid, mut rng) = two_red_trees(&anim);

        anim.increment();
        grid.check_neighbors(IVec2::new(1, 1), TreeColor::Wildcard, &mut rng, 10.0)
            .unwrap();

        // Resolution is synchronous, the commit is not: no reveals have
        // started and no collision is scheduled yet.
        assert_eq!(anim.value(), 1);
        assert!(!grid.has_pending_removals());
        assert_eq!(grid.pending_wildcards().count(), 1);

        // Before the settle deadline nothing changes.
        grid.tick(10.1);
        assert!(!grid.has_pending_removals());

        // After the pause the bridge commits: both RED trees are
        // scheduled and draw their final segment.
        grid.delayed_remove();
        let settle = 10.0 + grid.config().wildcard_settle;
        grid.tick(settle + 0.02);
        assert!(grid.has_pending_removals());
        assert_eq!(anim.value(), 3);

        let settled = run_until_settled(&mut grid, &anim, settle + 0.02);
        assert!(settled > settle);
        assert_eq!(grid.trees().count(), 0);
    }

    #[test]
    fn single_tree_wildcard_extends_after_settle() {
        let anim = BarrierCounter::new(0);
        let mut grid = GridOwnership::new(test_config(), &anim);
        let mut rng = rng();

        anim.increment();
        grid.check_neighbors(IVec2::new(0, 0), TreeColor::Blue, &mut rng, 0.0)
            .unwrap();
        grid.update_grid();
        grid.tick(10.0);

        anim.increment();
        let check = grid
            .check_neighbors(IVec2::new(0, 2), TreeColor::Wildcard, &mut rng, 10.0)
            .unwrap();
        assert_eq!(check, DropCheck::Connect);

        let settle = 10.0 + grid.config().wildcard_settle;
        grid.tick(settle + 0.02);
        grid.tick(settle + 10.0);
        assert_eq!(anim.value(), 0, "reveal consumed the marker hold");

        grid.update_grid();
        let id = grid.owner_at(0, 2).expect("wildcard cell committed");
        assert_eq!(grid.tree(id).unwrap().color, TreeColor::Blue);
    }

    #[test]
    fn growth_is_invisible_until_update_grid() {
        let anim = BarrierCounter::new(0);
        let mut grid = GridOwnership::new(test_config(), &anim);
        let mut rng = rng();

        anim.increment();
        grid.check_neighbors(IVec2::new(0, 0), TreeColor::Red, &mut rng, 0.0)
            .unwrap();

        // Mid-cycle lookups see nothing; a RED marker beside the
        // pending cells still reads empty air.
        let check = grid
            .check_neighbors(IVec2::new(1, 1), TreeColor::Red, &mut rng, 0.0)
            .unwrap();
        assert_eq!(check, DropCheck::Empty);

        grid.update_grid();
        let check = grid
            .check_neighbors(IVec2::new(1, 1), TreeColor::Red, &mut rng, 0.0)
            .unwrap();
        assert_eq!(check, DropCheck::Connect);
    }
}
