//! Optional alternate single-point tracking mode: instead of predicting a locked pair,
//! tow a circle center behind the tracked centroid so the reported point always sits on
//! a fixed-radius circle around it.
//!
//! Not part of the default module sequence (see [`crate::driver`]); kept available for
//! configurations that prefer a towed circle over the predictive dual-IR tracker.

use crate::frame::{Checkpoint, Frame, PipelineModule, Vec3};

pub struct TowedCircleStage {
    pub radius: f64,
    /// Width/height ratio of the tracking surface, used to keep the towed circle
    /// visually round even though x/y units aren't equal-scale.
    pub aspect_ratio: f64,
    valid_circle: bool,
    circle_center: Vec3,
}

impl Default for TowedCircleStage {
    fn default() -> Self {
        TowedCircleStage {
            radius: 0.005,
            aspect_ratio: 1024.0 / 768.0,
            valid_circle: false,
            circle_center: Vec3::ZERO,
        }
    }
}

impl TowedCircleStage {
    fn scaled_delta(&self, from: Vec3, to: Vec3) -> Vec3 {
        Vec3::new(to.x - from.x, (to.y - from.y) * self.aspect_ratio, 0.0)
    }
}

impl PipelineModule for TowedCircleStage {
    fn process(&mut self, prev: &Frame) -> Frame {
        let mut out = Frame::copied_from(prev);

        if self.radius <= 0.0 || prev.n_valid_ir == 0 {
            self.valid_circle = false;
            out.n_valid_ir = 0;
            return out;
        }

        let centroid = Vec3::mean(&prev.dots[..prev.n_valid_ir as usize]);

        if !self.valid_circle {
            self.circle_center = centroid;
            self.valid_circle = true;
        } else {
            let radius = self.radius * 1024.0;
            let delta = self.scaled_delta(self.circle_center, centroid);
            let dist = delta.len();
            if dist > radius {
                let excess = dist - radius;
                let direction = delta.scaled(1.0 / dist);
                let correction = Vec3::new(direction.x, direction.y / self.aspect_ratio, 0.0);
                self.circle_center = self.circle_center + correction.scaled(excess);
            }
        }

        out.dots[0] = self.circle_center;
        out.n_valid_ir = 1;

        let mut history = prev.history.clone();
        history.insert(Checkpoint::LastLeftRight, std::rc::Rc::new(prev.clone()));
        out.history = history;

        out
    }
}
