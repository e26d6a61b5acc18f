//! Stroke ribbon geometry for branch outlines.
//!
//! A [`StrokeGeometry`] holds a fixed-size vertex buffer (two vertices
//! per segment slot) whose triangle indices never change; reshaping only
//! rewrites vertex positions. Polylines shorter than the budget collapse
//! the leading vertex pairs onto the first point, so a growing branch
//! animates without reallocating. The ribbon ends in a tapered
//! terminator cap that narrows over a fixed number of trailing pairs.

use glam::Vec2;
use tracing::warn;

/// Width factors of the trailing terminator vertex pairs.
const TERMINATOR_TAPER: [f32; 3] = [0.8, 0.5, 0.05];

#[derive(Debug)]
pub struct StrokeGeometry {
    segments: usize,
    terminator_length: f32,
    /// Flat vertex positions, two per segment slot plus the seed pair.
    pub vertices: Vec<Vec2>,
    /// Triangle indices into `vertices`; built once, never rewritten.
    pub indices: Vec<u32>,
}

impl StrokeGeometry {
    pub fn new(segments: usize, terminator_length: f32) -> Self {
        debug_assert!(segments > TERMINATOR_TAPER.len() + 1);

        let vertices = vec![Vec2::ZERO; (segments + 1) * 2];
        let mut indices = Vec::with_capacity(segments * 6);
        for i in 0..segments as u32 {
            indices.extend_from_slice(&[
                2 * i + 1,
                2 * i + 2,
                2 * i,
                2 * i + 3,
                2 * i + 2,
                2 * i + 1,
            ]);
        }

        Self {
            segments,
            terminator_length,
            vertices,
            indices,
        }
    }

    /// Rewrites the vertex buffer to ribbon the given polyline.
    ///
    /// `positions` and `widths` run parallel; at least two points are
    /// required, and the polyline must fit the segment budget.
    pub fn reshape(&mut self, positions: &[Vec2], widths: &[f32]) {
        debug_assert!(positions.len() >= 2);
        debug_assert!(positions.len() <= widths.len());

        let taper_len = TERMINATOR_TAPER.len();
        let Some(buffer) = (self.segments + 1).checked_sub(positions.len() + taper_len) else {
            warn!(
                points = positions.len(),
                budget = self.segments,
                "polyline exceeds stroke segment budget; skipping reshape"
            );
            return;
        };
        if positions.len() < 2 {
            return;
        }

        // Leading degenerate pairs collapse onto the start point.
        let start_dir = (positions[1] - positions[0]).normalize_or_zero();
        let start_disp = Vec2::new(-start_dir.y, start_dir.x) * widths[0] / 2.0;
        for i in 0..=buffer {
            self.vertices[2 * i] = positions[0] - start_disp;
            self.vertices[2 * i + 1] = positions[0] + start_disp;
        }

        // Interior pairs displaced along the miter bisector, kept on a
        // consistent side of the path.
        let mut width_disp = start_disp;
        for i in 1..positions.len() - 1 {
            let v1 = positions[i] - positions[i - 1];
            let v2 = positions[i + 1] - positions[i];
            let mut bisector = (v1.normalize_or_zero() - v2.normalize_or_zero()).normalize_or_zero();
            if bisector.length_squared() < f32::EPSILON {
                bisector = Vec2::new(v1.y, -v1.x).normalize_or_zero();
            }
            if bisector.dot(width_disp) < 0.0 {
                bisector = -bisector;
            }
            width_disp = bisector * widths[i] / 2.0;

            self.vertices[2 * (buffer + i)] = positions[i] - width_disp;
            self.vertices[2 * (buffer + i) + 1] = positions[i] + width_disp;
        }

        // Final full-width pair, perpendicular to the last segment.
        let last = positions.len() - 1;
        let end_dir = (positions[last] - positions[last - 1]).normalize_or_zero();
        let mut end_disp = Vec2::new(-end_dir.y, end_dir.x) * widths[last] / 2.0;
        if end_disp.dot(width_disp) < 0.0 {
            end_disp = -end_disp;
        }
        let n = self.vertices.len();
        self.vertices[n - 2 - 2 * taper_len] = positions[last] - end_disp;
        self.vertices[n - 1 - 2 * taper_len] = positions[last] + end_disp;

        // Tapered terminator cap extending past the last point.
        for (i, &taper) in TERMINATOR_TAPER.iter().enumerate() {
            let j = n - 2 * (taper_len - i);
            let tip = positions[last]
                + end_dir * (self.terminator_length / taper_len as f32) * (i + 1) as f32;
            self.vertices[j] = tip - end_disp * taper;
            self.vertices[j + 1] = tip + end_disp * taper;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_buffer_covers_every_segment_slot() {
        let stroke = StrokeGeometry::new(8, 0.3);

        assert_eq!(stroke.vertices.len(), 18);
        assert_eq!(stroke.indices.len(), 8 * 6);

        // Every index must address a valid vertex.
        let max = *stroke.indices.iter().max().unwrap();
        assert!((max as usize) < stroke.vertices.len());
    }

    #[test]
    fn straight_ribbon_has_parallel_edges() {
        let mut stroke = StrokeGeometry::new(16, 0.3);
        let positions = [
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(0.0, 2.0),
        ];
        let widths = [0.2, 0.2, 0.2];

        stroke.reshape(&positions, &widths);

        // Interior pair at the midpoint: displaced half a width to each
        // side, perpendicular to +y.
        let taper_len = TERMINATOR_TAPER.len();
        let buffer = 16 + 1 - positions.len() - taper_len;
        let left = stroke.vertices[2 * (buffer + 1)];
        let right = stroke.vertices[2 * (buffer + 1) + 1];
        assert!((left - Vec2::new(0.1, 1.0)).length() < 1e-5);
        assert!((right - Vec2::new(-0.1, 1.0)).length() < 1e-5);
    }

    #[test]
    fn leading_pairs_collapse_onto_the_start() {
        let mut stroke = StrokeGeometry::new(16, 0.3);
        let positions = [Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0)];
        let widths = [0.2, 0.2];

        stroke.reshape(&positions, &widths);

        let taper_len = TERMINATOR_TAPER.len();
        let buffer = 16 + 1 - positions.len() - taper_len;
        for i in 0..=buffer {
            let mid = (stroke.vertices[2 * i] + stroke.vertices[2 * i + 1]) / 2.0;
            assert!((mid - positions[0]).length() < 1e-5);
        }
    }

    #[test]
    fn terminator_extends_and_tapers() {
        let mut stroke = StrokeGeometry::new(16, 0.3);
        let positions = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)];
        let widths = [0.2, 0.2];

        stroke.reshape(&positions, &widths);

        let n = stroke.vertices.len();
        let taper_len = TERMINATOR_TAPER.len();

        // The final pair sits terminator_length past the last point and
        // is nearly closed.
        let tip_a = stroke.vertices[n - 2];
        let tip_b = stroke.vertices[n - 1];
        let tip_mid = (tip_a + tip_b) / 2.0;
        assert!((tip_mid - Vec2::new(1.3, 0.0)).length() < 1e-5);
        assert!((tip_a - tip_b).length() < 0.2 * TERMINATOR_TAPER[taper_len - 1] + 1e-5);

        // Pair widths shrink along the cap.
        let mut prev_width = f32::MAX;
        for i in 0..taper_len {
            let j = n - 2 * (taper_len - i);
            let w = (stroke.vertices[j] - stroke.vertices[j + 1]).length();
            assert!(w < prev_width);
            prev_width = w;
        }
    }

    #[test]
    fn oversized_polyline_is_rejected_without_panic() {
        let mut stroke = StrokeGeometry::new(6, 0.3);
        let positions: Vec<Vec2> = (0..10).map(|i| Vec2::new(i as f32, 0.0)).collect();
        let widths = vec![0.2; 10];

        let before = stroke.vertices.clone();
        stroke.reshape(&positions, &widths);
        assert_eq!(stroke.vertices, before, "reshape should be a no-op");
    }
}
