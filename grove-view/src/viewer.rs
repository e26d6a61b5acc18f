//! Interactive falling-marker tree growth viewer built with eframe/egui.
//!
//! This module defines [`Viewer`], which owns the simulation state
//! (grid automaton, barrier counter, the current marker wave) and
//! implements [`eframe::App`] to render and drive the game. The viewer
//! plays the role of every external collaborator the core expects:
//! it polls input, moves and drops markers, calls `check_neighbors`
//! once per row a falling marker crosses, ticks the grid every frame,
//! and arms `update_grid`/`delayed_remove` at the wave boundaries.

use eframe::App;
use glam::{IVec2, Vec2};
use rand::Rng;
use grove_core::{
    config::Config,
    counter::BarrierCounter,
    easing::EasingCurve,
    formation::Formation,
    grid::{DropCheck, GridOwnership},
    marker::Marker,
    types::TreeColor,
};

/// Seconds a sideways wave move takes to settle.
const MOVE_ANIM_TIME: f32 = 0.12;

/// A marker that has been dropped and is falling down its column.
struct FallingMarker {
    marker: Marker,
    column: i32,
    /// Next integer row to run the neighbor check against.
    next_row: i32,
    /// Current world-space height in grid rows.
    height: f32,
}

/// Overshooting lateral move of the whole pending wave.
struct MoveAnim {
    from: f32,
    start: f32,
}

/// Main application state for the interactive viewer.
///
/// The per-frame update is:
/// 1. `grid.tick(now)` — advance every branch animation and watcher.
/// 2. Advance falling markers and feed row crossings to the automaton.
/// 3. When the wave has fully resolved, arm the deferred removal; when
///    the barrier settles, commit the grid and spawn the next wave.
/// 4. Handle input and render.
pub struct Viewer {
    grid: GridOwnership,
    anim: BarrierCounter,
    rng: rand::rngs::ThreadRng,
    formations: Vec<Formation>,

    /// Markers waiting for input, `None` slots are formation gaps.
    pending_wave: Option<Vec<Option<Marker>>>,
    falling: Vec<FallingMarker>,
    current_x: i32,
    move_anim: Option<MoveAnim>,
    /// Whether `delayed_remove` has been called for the dropped wave.
    wave_armed: bool,

    drop_speed: f32,
    move_delay: f32,
    rate_after_delay: f32,
    last_press_time: f32,
    next_move_time: f32,
    valid_press: bool,

    zoom: f32,
    pan: egui::Vec2,

    move_curve: EasingCurve,
    pulse_curve: EasingCurve,
}

impl Viewer {
    pub fn new() -> Self {
        let cfg = Config::default();
        let anim = BarrierCounter::new(0);
        Self {
            grid: GridOwnership::new(cfg, &anim),
            anim,
            rng: rand::rng(),
            formations: Formation::standard_set(),
            pending_wave: None,
            falling: Vec::new(),
            current_x: cfg.width / 2,
            move_anim: None,
            wave_armed: true,
            drop_speed: 14.0,
            move_delay: 0.25,
            rate_after_delay: 12.0,
            last_press_time: 0.0,
            next_move_time: 0.0,
            valid_press: false,
            zoom: 48.0,
            pan: egui::vec2(0.0, 0.0),
            move_curve: EasingCurve::overshoot(0.7, 0.15),
            pulse_curve: EasingCurve::bounce_once(0.5, 0.35),
        }
    }

    fn config(&self) -> &Config {
        self.grid.config()
    }

    /// Resets the whole game while keeping camera and tuning.
    fn reset(&mut self) {
        let cfg = *self.config();
        self.anim = BarrierCounter::new(0);
        self.grid = GridOwnership::new(cfg, &self.anim);
        self.pending_wave = None;
        self.falling.clear();
        self.current_x = cfg.width / 2;
        self.move_anim = None;
        self.wave_armed = true;
    }

    /// Advances the simulation to time `now` with frame delta `dt`.
    /// Separate from the egui pass so tests can drive it directly.
    fn advance(&mut self, now: f32, dt: f32) {
        self.grid.tick(now);

        // Falling markers: each integer row crossed gets one check.
        let mut i = 0;
        while i < self.falling.len() {
            let faller = &mut self.falling[i];
            faller.height -= self.drop_speed * dt;

            let mut resolved = false;
            while !resolved && faller.height <= faller.next_row as f32 {
                let cell = IVec2::new(faller.column, faller.next_row);
                match self
                    .grid
                    .check_neighbors(cell, faller.marker.drop_color(), &mut self.rng, now)
                {
                    Ok(DropCheck::Connect) => resolved = true,
                    Ok(DropCheck::Conflict) => {
                        // The marker dies without growing anything, so
                        // its barrier hold is released here.
                        self.anim.decrement();
                        resolved = true;
                    }
                    Ok(DropCheck::Empty) => faller.next_row -= 1,
                    Err(err) => {
                        tracing::warn!(%err, "marker fell out of bounds");
                        self.anim.decrement();
                        resolved = true;
                    }
                }
            }

            if resolved {
                self.falling.swap_remove(i);
            } else {
                i += 1;
            }
        }

        // The wave has fully resolved: arm the deferred-removal watcher
        // exactly once.
        if self.falling.is_empty() && self.pending_wave.is_none() && !self.wave_armed {
            self.grid.delayed_remove();
            self.wave_armed = true;
        }

        // Everything settled: commit ownership and deal the next wave.
        if self.anim.value() == 0
            && self.wave_armed
            && self.falling.is_empty()
            && self.pending_wave.is_none()
            && !self.grid.has_pending_removals()
        {
            self.grid.update_grid();
            self.spawn_wave();
        }
    }

    fn spawn_wave(&mut self) {
        let idx = self.rng.random_range(0..self.formations.len());
        let formation = &self.formations[idx];
        let wave: Vec<Option<Marker>> = formation
            .colors(&mut self.rng)
            .into_iter()
            .map(|color| match color {
                TreeColor::None => None,
                TreeColor::Wildcard => Some(Marker::wildcard()),
                concrete => Some(Marker::solid(concrete)),
            })
            .collect();

        self.current_x = self.config().width / 2;
        self.move_anim = None;
        self.pending_wave = Some(wave);
    }

    /// Column of the wave's slot `i` for a given wave center.
    fn slot_column(&self, center: i32, i: usize, len: usize) -> i32 {
        center + i as i32 - (len as f32 * 0.5).floor() as i32
    }

    /// Moves the pending wave sideways, clamped so every marker stays
    /// on the grid.
    fn move_wave(&mut self, dir: i32, now: f32) {
        let Some(wave) = &self.pending_wave else {
            return;
        };
        let len = wave.len();
        let target = self.current_x + dir;
        for (i, slot) in wave.iter().enumerate() {
            if slot.is_some() {
                let column = self.slot_column(target, i, len);
                if column < 0 || column >= self.config().width {
                    return;
                }
            }
        }

        let from = self.display_center(now);
        self.current_x = target;
        self.move_anim = Some(MoveAnim { from, start: now });
    }

    /// Wave center with the overshoot move animation applied.
    fn display_center(&self, now: f32) -> f32 {
        match &self.move_anim {
            Some(anim) if now - anim.start < MOVE_ANIM_TIME => self.move_curve.lerp(
                anim.from,
                self.current_x as f32,
                now - anim.start,
                MOVE_ANIM_TIME,
            ),
            _ => self.current_x as f32,
        }
    }

    /// Drops the pending wave: every marker takes one hold on the
    /// animation barrier and starts falling above the grid.
    fn drop_wave(&mut self) {
        let Some(wave) = self.pending_wave.take() else {
            return;
        };
        let len = wave.len();
        for (i, slot) in wave.into_iter().enumerate() {
            if let Some(marker) = slot {
                self.anim.increment();
                self.falling.push(FallingMarker {
                    marker,
                    column: self.slot_column(self.current_x, i, len),
                    next_row: self.config().height - 1,
                    height: self.config().height as f32,
                });
            }
        }
        self.wave_armed = false;
    }

    /// Input handling with the hold-to-repeat scheme: one move per
    /// press, then, after `move_delay`, `rate_after_delay` moves per
    /// second while held.
    fn handle_input(&mut self, ctx: &egui::Context, now: f32) {
        if self.anim.value() != 0 || self.pending_wave.is_none() {
            self.valid_press = false;
            return;
        }

        let (left_down, right_down, left_pressed, right_pressed, space) = ctx.input(|i| {
            (
                i.key_down(egui::Key::ArrowLeft),
                i.key_down(egui::Key::ArrowRight),
                i.key_pressed(egui::Key::ArrowLeft),
                i.key_pressed(egui::Key::ArrowRight),
                i.key_pressed(egui::Key::Space),
            )
        });

        if left_pressed || right_pressed {
            self.move_wave(if left_pressed { -1 } else { 1 }, now);
            self.last_press_time = now;
            self.next_move_time = now + self.move_delay;
            self.valid_press = true;
        } else if (left_down || right_down)
            && now - self.last_press_time > self.move_delay
            && now > self.next_move_time
        {
            let dir = if left_down { -1 } else { 1 };
            if self.valid_press {
                self.next_move_time += 1.0 / self.rate_after_delay;
                self.move_wave(dir, now);
            } else {
                self.move_wave(dir, now);
                self.last_press_time = now;
                self.next_move_time = now + self.move_delay;
                self.valid_press = true;
            }
        }

        if space {
            self.drop_wave();
        }
    }

    /// Converts a world-space position (grid units) to screen-space.
    fn world_to_screen(&self, p: Vec2, rect: egui::Rect) -> egui::Pos2 {
        let center = rect.center();
        egui::pos2(
            center.x + p.x * self.zoom + self.pan.x,
            center.y - p.y * self.zoom + self.pan.y,
        )
    }

    /// World-space position of an outer grid cell, centered on x.
    fn cell_to_world(&self, x: f32, y: f32) -> Vec2 {
        let cfg = self.config();
        Vec2::new(
            (x - (cfg.width - 1) as f32 / 2.0) * cfg.grid_spacing,
            y * cfg.grid_spacing,
        )
    }

    fn color32(color: TreeColor) -> egui::Color32 {
        match color {
            TreeColor::Red => egui::Color32::from_rgb(229, 57, 53),
            TreeColor::Green => egui::Color32::from_rgb(67, 160, 71),
            TreeColor::Blue => egui::Color32::from_rgb(30, 136, 229),
            TreeColor::Wildcard => egui::Color32::from_rgb(255, 213, 79),
            TreeColor::None => egui::Color32::GRAY,
        }
    }

    /// Draws every tree's branch ribbons as egui meshes.
    fn draw_trees(&self, painter: &egui::Painter, rect: egui::Rect) {
        let cfg = self.config();
        let half = cfg.local_grid_size() / 2;

        for (_, tree) in self.grid.trees() {
            // Branch geometry lives in tree-local world space; shift it
            // to the tree's root column.
            let offset = Vec2::new(
                ((tree.root_column - half) as f32 - (cfg.width - 1) as f32 / 2.0)
                    * cfg.grid_spacing,
                0.0,
            );
            let color = Self::color32(tree.color);

            for (_, branch) in tree.branches() {
                let mut mesh = egui::Mesh::default();
                for &v in &branch.stroke.vertices {
                    mesh.vertices.push(egui::epaint::Vertex {
                        pos: self.world_to_screen(v + offset, rect),
                        uv: egui::epaint::WHITE_UV,
                        color,
                    });
                }
                mesh.indices = branch.stroke.indices.clone();
                painter.add(egui::Shape::mesh(mesh));
            }
        }
    }

    /// Draws the pending wave, falling markers, and settling wildcards.
    fn draw_markers(&self, painter: &egui::Painter, rect: egui::Rect, now: f32) {
        let cfg = self.config();
        let radius = 0.35 * cfg.grid_spacing * self.zoom;

        if let Some(wave) = &self.pending_wave {
            let center = self.display_center(now);
            let len = wave.len();
            for (i, slot) in wave.iter().enumerate() {
                if let Some(marker) = slot {
                    let x = center + i as f32 - (len as f32 * 0.5).floor();
                    let world = self.cell_to_world(x, cfg.height as f32);
                    painter.circle_filled(
                        self.world_to_screen(world, rect),
                        radius,
                        Self::color32(marker.display_color()),
                    );
                }
            }
        }

        for faller in &self.falling {
            let world = self.cell_to_world(faller.column as f32, faller.height);
            painter.circle_filled(
                self.world_to_screen(world, rect),
                radius,
                Self::color32(faller.marker.display_color()),
            );
        }

        // Wildcards waiting out their settle pause pulse at the cell
        // they will commit to.
        for (cell, color) in self.grid.pending_wildcards() {
            let t = (now * 2.0).fract();
            let pulse = 0.6 + 0.4 * self.pulse_curve.ease(t);
            let world = self.cell_to_world(cell.x as f32, cell.y as f32);
            painter.circle_stroke(
                self.world_to_screen(world, rect),
                radius * pulse,
                egui::Stroke::new(2.0, Self::color32(color)),
            );
        }
    }

    /// Faint dots marking the grid intersections.
    fn draw_grid(&self, painter: &egui::Painter, rect: egui::Rect) {
        let cfg = self.config();
        for y in 0..cfg.height {
            for x in 0..cfg.width {
                let world = self.cell_to_world(x as f32, y as f32);
                painter.circle_filled(
                    self.world_to_screen(world, rect),
                    1.5,
                    egui::Color32::from_gray(70),
                );
            }
        }
    }

    fn ui_top_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Reset").clicked() {
                    self.reset();
                }
                ui.separator();
                ui.label("← → move, space drops");
                ui.separator();
                ui.add(egui::Slider::new(&mut self.zoom, 8.0..=120.0).text("Zoom"));
            });
        });
    }

    fn ui_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(format!("barrier = {}", self.anim.value()));
                ui.separator();
                ui.label(format!("trees = {}", self.grid.trees().count()));
                ui.label(format!("falling = {}", self.falling.len()));
                if self.grid.has_pending_removals() {
                    ui.separator();
                    ui.label("collision resolving…");
                }
            });
        });
    }

    fn ui_config_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("config_panel")
            .resizable(true)
            .default_width(220.0)
            .show(ctx, |ui| {
                ui.heading("Tuning");

                ui.separator();
                ui.label("Marker motion");
                ui.horizontal(|ui| {
                    ui.label("drop speed:");
                    ui.add(
                        egui::DragValue::new(&mut self.drop_speed)
                            .range(1.0..=60.0)
                            .speed(0.5),
                    );
                });
                ui.horizontal(|ui| {
                    ui.label("move delay:");
                    ui.add(
                        egui::DragValue::new(&mut self.move_delay)
                            .range(0.05..=1.0)
                            .speed(0.01),
                    );
                });
                ui.horizontal(|ui| {
                    ui.label("repeat rate:");
                    ui.add(
                        egui::DragValue::new(&mut self.rate_after_delay)
                            .range(1.0..=30.0)
                            .speed(0.5),
                    );
                });

                ui.separator();
                ui.label("Automaton");
                let cfg = self.config();
                ui.label(format!("grid = {}×{}", cfg.width, cfg.height));
                ui.label(format!("reveal speed = {}", cfg.animation_speed));
                ui.label(format!("delete speed = {}", cfg.delete_speed));
                ui.label(format!("wildcard settle = {} s", cfg.wildcard_settle));
            });
    }

    fn ui_central_panel(&mut self, ctx: &egui::Context, now: f32) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let response = ui.allocate_response(ui.available_size(), egui::Sense::click_and_drag());
            let rect = response.rect;
            let painter = ui.painter_at(rect);

            if response.dragged() {
                self.pan += response.drag_delta();
            }

            self.draw_grid(&painter, rect);
            self.draw_trees(&painter, rect);
            self.draw_markers(&painter, rect, now);
        });
    }
}

impl Default for Viewer {
    fn default() -> Self {
        Self::new()
    }
}

impl App for Viewer {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = ctx.input(|i| i.time) as f32;
        let dt = ctx.input(|i| i.stable_dt).min(0.1);

        self.advance(now, dt);
        self.handle_input(ctx, now);

        self.ui_top_panel(ctx);
        self.ui_status_bar(ctx);
        self.ui_config_panel(ctx);
        self.ui_central_panel(ctx, now);

        // Animations progress in wall-clock time, so keep painting.
        ctx.request_repaint();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settled_viewer() -> Viewer {
        let mut viewer = Viewer::new();
        // First advance deals the opening wave.
        viewer.advance(0.0, 0.016);
        assert!(viewer.pending_wave.is_some());
        viewer
    }

    #[test]
    fn world_to_screen_is_consistent_with_pan_and_zoom() {
        let mut viewer = Viewer::new();
        viewer.zoom = 2.0;
        viewer.pan = egui::vec2(15.0, -7.0);
        let rect = egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(800.0, 600.0));

        let a = viewer.world_to_screen(Vec2::new(0.0, 0.0), rect);
        let b = viewer.world_to_screen(Vec2::new(1.0, 0.0), rect);
        let c = viewer.world_to_screen(Vec2::new(0.0, 1.0), rect);

        // One world unit maps to `zoom` pixels, +y goes up the screen.
        assert!((b.x - a.x - 2.0).abs() < 1e-5);
        assert!((c.y - a.y + 2.0).abs() < 1e-5);
    }

    #[test]
    fn first_advance_deals_a_wave() {
        let viewer = settled_viewer();
        let wave = viewer.pending_wave.as_ref().unwrap();
        assert!(!wave.is_empty());
        assert!(wave.iter().any(|slot| slot.is_some()));
    }

    #[test]
    fn dropping_a_wave_takes_one_barrier_hold_per_marker() {
        let mut viewer = settled_viewer();
        let markers = viewer
            .pending_wave
            .as_ref()
            .unwrap()
            .iter()
            .flatten()
            .count();

        viewer.drop_wave();
        assert_eq!(viewer.anim.value(), markers as i32);
        assert_eq!(viewer.falling.len(), markers);
        assert!(viewer.pending_wave.is_none());
    }

    #[test]
    fn falling_wave_resolves_and_the_next_wave_spawns() {
        let mut viewer = settled_viewer();
        viewer.drop_wave();

        let mut t = 0.0;
        let mut respawned = false;
        for _ in 0..100_000 {
            t += 0.016;
            viewer.advance(t, 0.016);
            if viewer.pending_wave.is_some() {
                respawned = true;
                break;
            }
        }
        assert!(respawned, "wave must resolve and the next one spawn");
        assert_eq!(viewer.anim.value(), 0);
        assert!(viewer.falling.is_empty());
        assert!(
            viewer.grid.trees().count() > 0,
            "ground-row markers must have seeded trees"
        );
    }

    #[test]
    fn wave_movement_is_clamped_to_the_grid() {
        let mut viewer = settled_viewer();
        let width = viewer.config().width;

        // Push far off the left edge; the wave must stop inside.
        for _ in 0..width * 3 {
            viewer.move_wave(-1, 0.0);
        }
        let wave = viewer.pending_wave.as_ref().unwrap();
        let len = wave.len();
        for (i, slot) in wave.iter().enumerate() {
            if slot.is_some() {
                let column = viewer.slot_column(viewer.current_x, i, len);
                assert!((0..width).contains(&column));
            }
        }
    }

    #[test]
    fn reset_clears_the_field() {
        let mut viewer = settled_viewer();
        viewer.drop_wave();
        let mut t = 0.0;
        for _ in 0..2_000 {
            t += 0.016;
            viewer.advance(t, 0.016);
        }

        viewer.reset();
        assert_eq!(viewer.grid.trees().count(), 0);
        assert!(viewer.falling.is_empty());
        assert_eq!(viewer.anim.value(), 0);
    }
}
