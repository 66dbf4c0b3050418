//! Removes wrist-roll from the tracking pair using gravity and inter-spot geometry.
//!
//! Two passes: an accelerometer-derived rotation, then (if two dots survive) a
//! dual-point-derived rotation from the unit vector between them. Left/right ordering
//! is re-asserted after each pass since a rotation can flip which dot is which.

use crate::frame::{Frame, PipelineModule, Vec3};

/// The Wii Remote's IR camera resolution; un-rotation pivots around its center.
const IR_SENSOR_WIDTH: f64 = 1024.0;
const IR_SENSOR_HEIGHT: f64 = 768.0;

#[derive(Default)]
pub struct UnrotateStage;

impl UnrotateStage {
    fn half_res() -> Vec3 {
        Vec3::new(IR_SENSOR_WIDTH / 2.0, IR_SENSOR_HEIGHT / 2.0, 0.0)
    }

    fn apply_rotation(frame: &mut Frame, unrotate_x: Vec3, unrotate_y: Vec3) {
        let half_res = Self::half_res();
        for i in 0..frame.n_valid_ir as usize {
            let dot = frame.dots[i] - half_res;
            let rotated = Vec3::new(dot.dot(unrotate_x), dot.dot(unrotate_y), 0.0);
            frame.dots[i] = rotated + half_res;
        }
    }

    fn unrotate_using_accel(frame: &mut Frame) {
        let mut norm_accel = frame.accel;
        norm_accel.y = 0.0;
        if norm_accel.len() <= 0.01 {
            return;
        }
        norm_accel = norm_accel.scaled(1.0 / norm_accel.len());

        let unrotate_x = Vec3::new(norm_accel.z, norm_accel.x, 0.0);
        let unrotate_y = Vec3::new(-norm_accel.x, norm_accel.z, 0.0);
        Self::apply_rotation(frame, unrotate_x, unrotate_y);
    }

    fn unrotate_using_dual_point(frame: &mut Frame) {
        if frame.n_valid_ir != 2 {
            return;
        }
        let mut horizontal = frame.dots[1] - frame.dots[0];
        if horizontal.len() <= 0.01 {
            return;
        }
        horizontal = horizontal.scaled(1.0 / horizontal.len());

        let unrotate_x = Vec3::new(horizontal.x, horizontal.y, 0.0);
        let unrotate_y = Vec3::new(-horizontal.y, horizontal.x, 0.0);
        Self::apply_rotation(frame, unrotate_x, unrotate_y);
    }

    fn assign_left_right(frame: &mut Frame) {
        if frame.n_valid_ir != 2 {
            return;
        }
        if frame.dots[1].x < frame.dots[0].x {
            frame.dots.swap(0, 1);
        }
    }
}

impl PipelineModule for UnrotateStage {
    fn process(&mut self, prev: &Frame) -> Frame {
        let mut out = Frame::copied_from(prev);
        Self::unrotate_using_accel(&mut out);
        Self::assign_left_right(&mut out);
        Self::unrotate_using_dual_point(&mut out);
        Self::assign_left_right(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(accel: Vec3, dots: &[Vec3]) -> Frame {
        let mut f = Frame::default();
        f.accel = accel;
        f.n_valid_ir = dots.len() as u8;
        for (i, d) in dots.iter().enumerate() {
            f.dots[i] = *d;
        }
        f
    }

    #[test]
    fn left_right_order_holds_after_processing() {
        let mut stage = UnrotateStage;
        let f = frame_with(
            Vec3::new(0.0, 0.0, 256.0),
            &[Vec3::new(700.0, 400.0, 0.0), Vec3::new(400.0, 400.0, 0.0)],
        );
        let out = stage.process(&f);
        assert!(out.dots[0].x <= out.dots[1].x);
    }

    #[test]
    fn near_zero_accel_and_degenerate_pair_is_a_no_op() {
        let mut stage = UnrotateStage;
        let f = frame_with(Vec3::new(0.0, 5.0, 0.0), &[Vec3::new(500.0, 400.0, 0.0)]);
        let out = stage.process(&f);
        assert_eq!(out.dots[0], f.dots[0]);
    }

    #[test]
    fn accel_unrotation_is_invariant_to_accel_magnitude() {
        let mut a = UnrotateStage;
        let mut b = UnrotateStage;
        let dots = [Vec3::new(700.0, 400.0, 0.0), Vec3::new(400.0, 400.0, 0.0)];
        let fa = frame_with(Vec3::new(0.2, 0.0, 1.0), &dots);
        let fb = frame_with(Vec3::new(2.0, 0.0, 10.0), &dots);
        let oa = a.process(&fa);
        let ob = b.process(&fb);
        assert!((oa.dots[0].x - ob.dots[0].x).abs() < 1e-9);
        assert!((oa.dots[0].y - ob.dots[0].y).abs() < 1e-9);
    }
}
