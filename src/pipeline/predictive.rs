//! Disambiguates which emitter a single observed IR spot represents once the pair has
//! merged into one point, by tracking a locked inter-spot distance and a Bayesian
//! log-likelihood over "this spot is the left emitter / the right emitter / their
//! center".

use crate::frame::{Checkpoint, Frame, PipelineModule, Vec3};

const SQRT_2PI: f64 = 2.506_628_274_631_000_2;

/// Measurement noise standard deviation, in sensor units, used by [`log_normal_2d`].
const MEASURE_STD: Vec3 = Vec3 { x: 15.0, y: 15.0, z: 0.0 };

fn log_normal_2d(point: Vec3, std: Vec3) -> f64 {
    let x = point.x / std.x;
    let y = point.y / std.y;
    (-0.5 * (x * x + y * y)) - (SQRT_2PI + std.x + std.y)
}

pub struct PredictiveDualIrStage {
    locked_distance: f64,
    left: Vec3,
    right: Vec3,
    center: Vec3,
    log_l_left: f64,
    log_l_right: f64,
    log_l_center: f64,
}

impl Default for PredictiveDualIrStage {
    fn default() -> Self {
        PredictiveDualIrStage {
            locked_distance: -1.0,
            left: Vec3::ZERO,
            right: Vec3::ZERO,
            center: Vec3::ZERO,
            log_l_left: 0.0,
            log_l_right: 0.0,
            log_l_center: 0.0,
        }
    }
}

impl PipelineModule for PredictiveDualIrStage {
    fn process(&mut self, prev: &Frame) -> Frame {
        let mut out = Frame::copied_from(prev);

        let cluster = prev
            .history
            .get(&Checkpoint::Cluster)
            .expect("cluster stage must run before the predictive tracker");

        let mut cluster_n_valid = cluster.n_valid_ir;
        if cluster_n_valid == 2 && cluster.dots[0] == cluster.dots[1] {
            cluster_n_valid = 1;
        }

        match cluster_n_valid {
            2 => {
                self.left = out.dots[0];
                self.right = out.dots[1];
                self.center = Vec3::mean(&[out.dots[0], out.dots[1]]);
                self.log_l_left = 0.0;
                self.log_l_right = 0.0;
                self.log_l_center = 0.0;
                self.locked_distance = (self.left - self.right).len();
            }
            1 => {
                if self.locked_distance < 0.0 {
                    return out;
                }

                let new_point = Vec3::mean(&[out.dots[0], out.dots[1]]);

                self.log_l_left += log_normal_2d(new_point - self.left, MEASURE_STD);
                self.log_l_right += log_normal_2d(new_point - self.right, MEASURE_STD);
                self.log_l_center += log_normal_2d(new_point - self.center, MEASURE_STD);

                let max_l = self.log_l_left.max(self.log_l_right).max(self.log_l_center);
                self.log_l_left = (self.log_l_left - max_l).max(-100_000.0);
                self.log_l_right = (self.log_l_right - max_l).max(-100_000.0);
                self.log_l_center = (self.log_l_center - max_l).max(-100_000.0);

                let w_left = self.log_l_left.exp();
                let w_right = self.log_l_right.exp();
                let w_center = self.log_l_center.exp();
                let normalization = w_left + w_right + w_center;

                let mut pred_point = (self.left.scaled(w_left)
                    + self.right.scaled(w_right)
                    + self.center.scaled(w_center))
                .scaled(1.0 / normalization);

                let offset = new_point - pred_point;
                self.left = self.left + offset;
                self.right = self.right + offset;
                self.center = self.center + offset;
                pred_point = pred_point + offset;

                out.n_valid_ir = 2;
                if self.log_l_left >= 0.0 {
                    out.dots[0] = pred_point;
                    out.dots[1] = pred_point + Vec3::new(self.locked_distance, 0.0, 0.0);
                } else if self.log_l_right >= 0.0 {
                    out.dots[0] = pred_point - Vec3::new(self.locked_distance, 0.0, 0.0);
                    out.dots[1] = pred_point;
                } else {
                    let half = Vec3::new(self.locked_distance / 2.0, 0.0, 0.0);
                    out.dots[0] = pred_point - half;
                    out.dots[1] = pred_point + half;
                }

                self.left = out.dots[0];
                self.right = out.dots[1];
                self.center = Vec3::mean(&[out.dots[0], out.dots[1]]);
            }
            _ => {
                self.locked_distance = -1.0;
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::rc::Rc;

    fn cluster_frame(n_valid: u8, dots: [Vec3; 2]) -> Frame {
        let mut f = Frame::default();
        f.n_valid_ir = n_valid;
        f.dots[0] = dots[0];
        f.dots[1] = dots[1];
        f
    }

    fn with_cluster_checkpoint(mut frame: Frame, cluster: Frame) -> Frame {
        let mut history = HashMap::new();
        history.insert(Checkpoint::Cluster, Rc::new(cluster));
        frame.history = history;
        frame
    }

    #[test]
    fn locking_captures_current_separation() {
        let mut stage = PredictiveDualIrStage::default();
        let left = Vec3::new(500.0, 400.0, 0.0);
        let right = Vec3::new(700.0, 400.0, 0.0);
        let cluster = cluster_frame(2, [left, right]);
        let input = with_cluster_checkpoint(cluster_frame(2, [left, right]), cluster);
        let _ = stage.process(&input);
        assert!((stage.locked_distance - 200.0).abs() < 1e-9);
    }

    #[test]
    fn zero_valid_unlocks() {
        let mut stage = PredictiveDualIrStage::default();
        let left = Vec3::new(500.0, 400.0, 0.0);
        let right = Vec3::new(700.0, 400.0, 0.0);
        let cluster = cluster_frame(2, [left, right]);
        let locking_input = with_cluster_checkpoint(cluster_frame(2, [left, right]), cluster);
        let _ = stage.process(&locking_input);

        let empty_cluster = cluster_frame(0, [Vec3::ZERO, Vec3::ZERO]);
        let next = with_cluster_checkpoint(cluster_frame(0, [Vec3::ZERO, Vec3::ZERO]), empty_cluster);
        let _ = stage.process(&next);
        assert!(stage.locked_distance < 0.0);
    }

    #[test]
    fn merged_single_point_is_reconstructed_near_locked_pair() {
        let mut stage = PredictiveDualIrStage::default();
        let left = Vec3::new(500.0, 400.0, 0.0);
        let right = Vec3::new(700.0, 400.0, 0.0);
        let lock_cluster = cluster_frame(2, [left, right]);
        let lock_input = with_cluster_checkpoint(cluster_frame(2, [left, right]), lock_cluster);
        let _ = stage.process(&lock_input);

        // Spots merge at the midpoint for several ticks.
        let mid = Vec3::new(600.0, 400.0, 0.0);
        let mut out = Frame::default();
        for _ in 0..10 {
            let merged_cluster = cluster_frame(1, [mid, mid]);
            let input = with_cluster_checkpoint(cluster_frame(1, [mid, mid]), merged_cluster);
            out = stage.process(&input);
        }

        assert_eq!(out.n_valid_ir, 2);
        let predicted_mid = Vec3::mean(&[out.dots[0], out.dots[1]]);
        assert!((predicted_mid.x - mid.x).abs() < 30.0);
        assert!((predicted_mid.y - mid.y).abs() < 30.0);
        assert!((out.dots[1] - out.dots[0]).len() - 200.0 < 1e-6);
    }
}
