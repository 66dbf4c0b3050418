//! Temporal smoothing with a click-triggered freeze-then-blend schedule.
//!
//! Plain position/accelerometer exponential smoothing would let the motion of
//! pressing a physical button leak into the cursor position right when a click lands.
//! This stage freezes the position briefly after a click starts, then blends back to
//! the normal smoothing factor over `blend_delay` seconds.

use crate::frame::keys::{BTN_LEFT, BTN_MIDDLE, BTN_RIGHT};
use crate::frame::{ButtonNamespace, Frame, HostKey, PipelineModule, Vec3};

pub struct SmootherStage {
    pub enabled: bool,

    /// Retention fraction after 1 second, while no click button is held.
    pub pos_mix: f64,
    /// Retention fraction after 1 second, while a click button is held.
    pub pos_mix_clicked: f64,
    pub accel_mix: f64,
    pub accel_mix_clicked: f64,
    /// Seconds spent linearly blending from frozen back to steady-state after a click.
    pub blend_delay: f64,
    /// Seconds the position stays fully frozen right after a click starts.
    pub freeze_delay: f64,

    has_accel: bool,
    last_accel: Vec3,
    has_position: bool,
    last_positions: [Vec3; 4],
    button_was_pressed: bool,
    click_release_timer: f64,
}

impl Default for SmootherStage {
    fn default() -> Self {
        SmootherStage {
            enabled: true,
            pos_mix: 0.00001,
            pos_mix_clicked: 0.1,
            accel_mix: 0.0,
            accel_mix_clicked: 0.0,
            blend_delay: 0.25,
            freeze_delay: 0.1,
            has_accel: false,
            last_accel: Vec3::ZERO,
            has_position: false,
            last_positions: [Vec3::ZERO; 4],
            button_was_pressed: false,
            click_release_timer: 0.0,
        }
    }
}

impl PipelineModule for SmootherStage {
    fn process(&mut self, prev: &Frame) -> Frame {
        let mut out = Frame::copied_from(prev);

        if prev.n_valid_ir == 0 {
            self.has_position = false;
        }

        let button_is_pressed = out.is_button_pressed(ButtonNamespace::HostKey, BTN_LEFT.0 as u32)
            || out.is_button_pressed(ButtonNamespace::HostKey, BTN_RIGHT.0 as u32)
            || out.is_button_pressed(ButtonNamespace::HostKey, BTN_MIDDLE.0 as u32);

        let dt = out.delta_t_ms as f64 / 1000.0;
        self.click_release_timer = (self.click_release_timer - dt).max(0.0);

        let accel_mix;
        if button_is_pressed {
            accel_mix = self.accel_mix_clicked.powf(dt);
            if !self.button_was_pressed {
                self.click_release_timer = self.blend_delay + self.freeze_delay;
            }
            self.click_release_timer = self.click_release_timer.max(self.blend_delay);
        } else {
            accel_mix = self.accel_mix.powf(dt);
            self.click_release_timer = self.click_release_timer.min(self.blend_delay);
        }
        self.button_was_pressed = button_is_pressed;

        let mut pos_mix;
        if self.click_release_timer <= 0.0 {
            pos_mix = self.pos_mix;
        } else if self.freeze_delay > 0.0 && self.click_release_timer > self.blend_delay {
            pos_mix = 1.0;
        } else if self.blend_delay <= 0.0 {
            pos_mix = if button_is_pressed { self.pos_mix_clicked } else { self.pos_mix };
        } else {
            let m = self.click_release_timer / self.blend_delay;
            pos_mix = self.pos_mix * (1.0 - m) + self.pos_mix_clicked * m;
        }
        pos_mix = pos_mix.powf(dt);

        if self.has_position && self.enabled {
            for i in 0..4 {
                let blended = out.dots[i].scaled(1.0 - pos_mix) + self.last_positions[i].scaled(pos_mix);
                out.dots[i] = blended;
                self.last_positions[i] = blended;
            }
        }

        if self.has_accel && self.enabled {
            let blended = out.accel.scaled(1.0 - accel_mix) + self.last_accel.scaled(accel_mix);
            out.accel = blended;
            self.last_accel = blended;
        }

        if !self.has_accel {
            self.last_accel = prev.accel;
            self.has_accel = true;
        }
        if !self.has_position && prev.n_valid_ir > 0 {
            self.last_positions = prev.dots;
            self.has_position = true;
        }

        out
    }
}
