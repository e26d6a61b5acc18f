#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Outer grid width in cells.
    pub width: i32,
    /// Outer grid height in cells.
    pub height: i32,
    /// World-space distance between adjacent grid cells.
    pub grid_spacing: f32,
    /// World-space radius of the rounded corner at a direction change.
    pub turn_radius: f32,
    /// Number of interpolated points per quarter-turn corner.
    pub turn_segments: usize,
    /// Ribbon width of a branch stroke.
    pub branch_width: f32,
    /// First-segment foreshortening, as a fraction of `grid_spacing`.
    pub start_offset: f32,
    /// Last-segment foreshortening, as a fraction of `grid_spacing`.
    pub end_offset: f32,
    /// Reveal speed in arc-length units per second.
    pub animation_speed: f32,
    /// Retraction speed in arc-length units per second; also scales the
    /// per-branch stagger delay during tree deletion.
    pub delete_speed: f32,
    /// Pause between a wildcard resolving its color and the waypoint
    /// commit, in seconds.
    pub wildcard_settle: f32,
    /// Barrier poll throttle for deferred-removal watchers, in seconds.
    pub poll_interval: f32,
    /// Vertex-pair budget of a stroke ribbon.
    pub stroke_segments: usize,
    /// World-space length of the tapered terminator cap.
    pub terminator_length: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width: 9,
            height: 12,
            grid_spacing: 1.0,
            turn_radius: 0.25,
            turn_segments: 4,
            branch_width: 0.12,
            start_offset: 0.25,
            end_offset: 0.25,
            animation_speed: 4.0,
            delete_speed: 6.0,
            wildcard_settle: 0.4,
            poll_interval: 0.01,
            stroke_segments: 96,
            terminator_length: 0.3,
        }
    }
}

impl Config {
    /// Side length of a tree's local grid, sized so any branch of a tree
    /// rooted anywhere on the outer grid stays addressable.
    pub fn local_grid_size(&self) -> i32 {
        self.width.max(self.height) * 2
    }
}
