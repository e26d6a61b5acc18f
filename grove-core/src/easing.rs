//! Easing curves for marker motion polish.
//!
//! Each variant precomputes its polynomial coefficients at construction
//! so that [`EasingCurve::ease`] is a plain evaluation. Curves map
//! `t ∈ [0, 1]` to a progress value that starts at 0 and ends at 1;
//! `Overshoot` exceeds 1 in between, `BounceOnce` dips once below it.

/// A one-dimensional easing curve.
#[derive(Clone, Copy, Debug)]
pub enum EasingCurve {
    /// Quartic that overshoots the target and settles back.
    Overshoot { a: f32, b: f32, c: f32 },
    /// Linear rise until `bounce_start`, then a single parabolic bounce.
    BounceOnce { bounce_start: f32, a: f32 },
}

impl EasingCurve {
    /// Builds an overshoot curve that peaks at `overshoot_time` (in
    /// normalized time) reaching `1 + overshoot_amount`.
    pub fn overshoot(overshoot_time: f32, overshoot_amount: f32) -> Self {
        let p = overshoot_time;
        let d = overshoot_amount;
        let p2 = p * p;
        let p3 = p2 * p;
        let p4 = p3 * p;
        let q = (p - 1.0) * (p - 1.0);

        let a = -((-3.0 * d - p4 + 4.0 * d * p + 4.0 * p - 3.0) / (q * p2));
        let b = -((2.0 * (d + p4 - 2.0 * d * p2 - 2.0 * p2 + 1.0)) / (q * p3));
        let c = -((-2.0 * d - p3 + 3.0 * d * p + 3.0 * p - 2.0) / (q * p3));

        Self::Overshoot { a, b, c }
    }

    /// Builds a curve that rises linearly until `bounce_start`, then
    /// bounces once with depth `bounce_amount` before settling at 1.
    pub fn bounce_once(bounce_start: f32, bounce_amount: f32) -> Self {
        let span = 1.0 - bounce_start;
        Self::BounceOnce {
            bounce_start,
            a: 4.0 * bounce_amount / (span * span),
        }
    }

    /// Evaluates the curve at `t ∈ [0, 1]`.
    pub fn ease(&self, t: f32) -> f32 {
        match *self {
            Self::Overshoot { a, b, c } => {
                let t2 = t * t;
                a * t2 + b * t2 * t + c * t2 * t2
            }
            Self::BounceOnce { bounce_start, a } => {
                if t < bounce_start {
                    t / bounce_start
                } else {
                    let t2 = t - bounce_start;
                    1.0 - a * t2 * (1.0 - bounce_start - t2)
                }
            }
        }
    }

    /// Eased interpolation from `start` to `end`, where `t` is elapsed
    /// time out of `total_time`.
    pub fn lerp(&self, start: f32, end: f32, t: f32, total_time: f32) -> f32 {
        start + (end - start) * self.ease(t / total_time)
    }
}
