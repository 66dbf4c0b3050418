//! IR spot clustering: reduce up to four noisy IR candidates to an ordered `(left,
//! right)` pair.
//!
//! Runs exactly two iterations of 2-means seeded from the previous tick's result, with
//! empty-cluster recovery, then optionally collapses the pair into a single point when
//! they're closer together than half the configured default distance.

use std::collections::HashMap;
use std::rc::Rc;

use crate::frame::{Checkpoint, Frame, PipelineModule, Vec3};

/// Two-iteration seeded k-means over up to four IR points, carrying its centroid seeds
/// across ticks.
pub struct ClusterStage {
    /// Whether the point-collapse step is active. Disabled during calibration, since
    /// calibration wants to see the true cluster separation.
    pub enable_point_collapse: bool,
    /// Distance below which a separated pair collapses into a single tracked point.
    pub default_distance: f64,
    left_seed: Vec3,
    right_seed: Vec3,
}

impl Default for ClusterStage {
    fn default() -> Self {
        ClusterStage {
            enable_point_collapse: true,
            default_distance: 100.0,
            left_seed: Vec3::ZERO,
            right_seed: Vec3::ZERO,
        }
    }
}

impl ClusterStage {
    fn k_means(&self, points: &[Vec3]) -> (Vec3, Vec3) {
        let mut centroids = [self.left_seed, self.right_seed];
        if centroids[0] == centroids[1] {
            centroids[1] = centroids[1] + Vec3::new(1.0, 0.0, 0.0);
        }

        for _ in 0..2 {
            let mut sums = [Vec3::ZERO; 2];
            let mut counts = [0usize; 2];

            for p in points {
                // Nearest centroid; a strictly smaller distance is required to move
                // off centroid 0, matching a left-to-right scan.
                let mut closest = 0usize;
                let d1 = (*p - centroids[1]).len();
                if d1 < (*p - centroids[0]).len() {
                    closest = 1;
                }

                sums[closest] = sums[closest] + *p;
                counts[closest] += 1;
            }

            for i in 0..2 {
                if counts[i] > 0 {
                    centroids[i] = sums[i].scaled(1.0 / counts[i] as f64);
                }
            }

            if counts[0] == 0 {
                centroids[0] = centroids[1];
                counts[0] = counts[1];
                counts[1] = 0;
            }
            if counts[1] == 0 {
                let mut max_d = 0.0f64;
                let mut max_idx = 0usize;
                for (i, p) in points.iter().enumerate() {
                    let d = (*p - centroids[0]).len();
                    if d > max_d {
                        max_d = d;
                        max_idx = i;
                    }
                }
                if !points.is_empty() {
                    centroids[1] = points[max_idx];
                }
            }
        }

        (centroids[0], centroids[1])
    }
}

impl PipelineModule for ClusterStage {
    fn process(&mut self, prev: &Frame) -> Frame {
        let mut out = Frame::copied_from(prev);

        let valid: Vec<Vec3> =
            (0..prev.n_valid_ir as usize).map(|i| prev.dots[i]).collect();

        match valid.len() {
            0 => {
                out.n_valid_ir = 0;
            }
            1 => {
                out.n_valid_ir = 1;
                out.dots[0] = valid[0];
                out.dots[1] = valid[0];
                self.left_seed = valid[0];
                self.right_seed = valid[0];
            }
            _ => {
                let (left, right) = self.k_means(&valid);
                self.left_seed = left;
                self.right_seed = right;

                out.n_valid_ir = 2;
                out.dots[0] = left;
                out.dots[1] = right;

                if self.enable_point_collapse {
                    let threshold = 0.5 * self.default_distance;
                    if (out.dots[0] - out.dots[1]).len() < threshold {
                        let mid = Vec3::mean(&[out.dots[0], out.dots[1]]);
                        out.n_valid_ir = 1;
                        out.dots[0] = mid;
                        out.dots[1] = mid;
                    }
                }
            }
        }

        let mut history: HashMap<Checkpoint, Rc<Frame>> = prev.history.clone();
        history.insert(Checkpoint::Cluster, Rc::new(out.clone()));
        out.history = history;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage() -> ClusterStage {
        ClusterStage::default()
    }

    fn frame_with_dots(dots: &[Vec3]) -> Frame {
        let mut f = Frame::default();
        f.n_valid_ir = dots.len() as u8;
        for (i, d) in dots.iter().enumerate() {
            f.dots[i] = *d;
        }
        f
    }

    #[test]
    fn single_point_collapses_to_itself() {
        let mut stage = stage();
        let p = Vec3::new(400.0, 300.0, 0.0);
        let out = stage.process(&frame_with_dots(&[p]));
        assert_eq!(out.n_valid_ir, 1);
        assert_eq!(out.dots[0], p);
        assert_eq!(out.dots[1], p);
    }

    #[test]
    fn two_separated_points_are_recovered_as_a_set() {
        let mut stage = stage();
        let p = Vec3::new(400.0, 300.0, 0.0);
        let q = Vec3::new(700.0, 300.0, 0.0);
        let out = stage.process(&frame_with_dots(&[p, q]));
        assert_eq!(out.n_valid_ir, 2);
        let got = [out.dots[0], out.dots[1]];
        assert!(got.contains(&p));
        assert!(got.contains(&q));
    }

    #[test]
    fn close_pair_collapses_below_threshold() {
        let mut stage = stage();
        stage.default_distance = 100.0;
        let p = Vec3::new(400.0, 300.0, 0.0);
        let q = Vec3::new(420.0, 300.0, 0.0); // 20 < 0.5*100
        let out = stage.process(&frame_with_dots(&[p, q]));
        assert_eq!(out.n_valid_ir, 1);
    }

    #[test]
    fn far_pair_does_not_collapse() {
        let mut stage = stage();
        stage.default_distance = 100.0;
        let p = Vec3::new(400.0, 300.0, 0.0);
        let q = Vec3::new(700.0, 300.0, 0.0);
        let out = stage.process(&frame_with_dots(&[p, q]));
        assert_eq!(out.n_valid_ir, 2);
    }

    #[test]
    fn four_points_as_two_tight_pairs_separate() {
        let mut stage = stage();
        let a1 = Vec3::new(400.0, 300.0, 0.0);
        let a2 = Vec3::new(405.0, 300.0, 0.0);
        let b1 = Vec3::new(700.0, 300.0, 0.0);
        let b2 = Vec3::new(705.0, 300.0, 0.0);
        let out = stage.process(&frame_with_dots(&[a1, b1, a2, b2]));
        assert_eq!(out.n_valid_ir, 2);
        let lo = out.dots[0].x.min(out.dots[1].x);
        let hi = out.dots[0].x.max(out.dots[1].x);
        assert!(lo < 410.0);
        assert!(hi > 695.0);
    }
}
