//! The facade tying the pipeline stages together into a runnable device: owns
//! calibration state, the fixed module sequence, the remote lifecycle state machine,
//! and the final projection from filtered tracking dots to virtual-pointer writes.

use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::RemoteError;
use crate::frame::{keys, ButtonNamespace, Checkpoint, Frame, HostKey, PipelineModule, RemoteButton, Vec3};
use crate::pipeline::{
    ButtonMapperStage, ClusterStage, PredictiveDualIrStage, SmootherStage, UnrotateStage,
};
use crate::remote::{RemoteMonitor, RemoteReport, RemoteSource};
use crate::vpointer::VirtualPointer;

/// Time without a remote before the driver falls back to [`RemoteState::NoRemote`].
const ACCEL_TIMEOUT: Duration = Duration::from_millis(500);
/// How often [`Driver::poll_for_remote`] checks the monitor while disconnected.
const MONITOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Where the driver currently stands with respect to a physical remote.
pub enum RemoteState {
    NoRemote { last_poll: Instant },
    Running { source: Box<dyn RemoteSource>, last_event: Instant },
}

/// Clamped top-left/bottom-right rectangle within the `[0, 10000]` normalized
/// projection space.
#[derive(Debug, Clone, Copy)]
pub struct ScreenArea {
    pub top_left: Vec3,
    pub bottom_right: Vec3,
}

impl Default for ScreenArea {
    fn default() -> Self {
        ScreenArea {
            top_left: Vec3::new(0.0, 0.0, 0.0),
            bottom_right: Vec3::new(10000.0, 10000.0, 0.0),
        }
    }
}

fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo.min(hi)).min(lo.max(hi))
}

pub struct Driver {
    monitor: Box<dyn RemoteMonitor>,
    remote: RemoteState,
    vpointer: Box<dyn VirtualPointer>,

    pub mouse_enabled: bool,

    cal_x: Vec3,
    cal_y: Vec3,
    screen_area: ScreenArea,
    mouse_mat_x: Vec3,
    mouse_mat_y: Vec3,

    cluster: ClusterStage,
    buttons: ButtonMapperStage,
    unrotate: UnrotateStage,
    predictive: PredictiveDualIrStage,
    smoother: SmootherStage,

    last_tick: Instant,
    last_frame: Frame,
}

impl Driver {
    pub fn new(monitor: Box<dyn RemoteMonitor>, vpointer: Box<dyn VirtualPointer>) -> Self {
        let mut buttons = ButtonMapperStage::default();
        buttons.add_mapping(RemoteButton::A, true, vec![keys::BTN_LEFT]);
        buttons.add_mapping(RemoteButton::B, true, vec![keys::BTN_RIGHT]);

        let mut driver = Driver {
            monitor,
            remote: RemoteState::NoRemote { last_poll: Instant::now() },
            vpointer,
            mouse_enabled: true,
            cal_x: Vec3::new(-10000.0 / 1024.0, 0.0, 10000.0),
            cal_y: Vec3::new(0.0, 10000.0 / 1024.0, 0.0),
            screen_area: ScreenArea::default(),
            mouse_mat_x: Vec3::ZERO,
            mouse_mat_y: Vec3::ZERO,
            cluster: ClusterStage::default(),
            buttons,
            unrotate: UnrotateStage,
            predictive: PredictiveDualIrStage::default(),
            smoother: SmootherStage::default(),
            last_tick: Instant::now(),
            last_frame: Frame::default(),
        };
        driver.compute_mouse_mat();
        driver
    }

    fn compute_mouse_mat(&mut self) {
        let size_x = self.screen_area.bottom_right.x - self.screen_area.top_left.x;
        let size_y = self.screen_area.bottom_right.y - self.screen_area.top_left.y;

        let mut mat_x = self.cal_x.scaled(size_x / 10000.0);
        let mut mat_y = self.cal_y.scaled(size_y / 10000.0);
        mat_x.z += self.screen_area.top_left.x;
        mat_y.z += self.screen_area.top_left.y;

        self.mouse_mat_x = mat_x;
        self.mouse_mat_y = mat_y;
    }

    pub fn calibration_vectors(&self) -> (Vec3, Vec3) {
        (self.cal_x, self.cal_y)
    }

    pub fn set_calibration_vectors(&mut self, x: Vec3, y: Vec3) {
        self.cal_x = x;
        self.cal_y = y;
        self.compute_mouse_mat();
        info!(?x, ?y, "calibration vectors updated");
    }

    pub fn screen_area(&self) -> ScreenArea {
        self.screen_area
    }

    pub fn set_screen_area(&mut self, left: f64, top: f64, right: f64, bottom: f64) {
        let top_left = Vec3::new(
            clamp(left.min(right), 0.0, 10000.0),
            clamp(top.min(bottom), 0.0, 10000.0),
            0.0,
        );
        let bottom_right = Vec3::new(
            clamp(left.max(right), 0.0, 10000.0),
            clamp(top.max(bottom), 0.0, 10000.0),
            0.0,
        );
        self.screen_area = ScreenArea { top_left, bottom_right };
        self.compute_mouse_mat();
        info!(?top_left, ?bottom_right, "screen area updated");
    }

    pub fn set_calibration_mode(&mut self, on: bool) {
        self.cluster.enable_point_collapse = !on;
        self.smoother.enabled = !on;
    }

    pub fn default_ir_distance(&self) -> f64 {
        self.cluster.default_distance
    }

    pub fn set_default_ir_distance(&mut self, distance: f64) {
        self.cluster.default_distance = distance;
    }

    pub fn smoothing_factors(&self) -> (f64, f64, f64) {
        (
            self.smoother.pos_mix_clicked,
            self.smoother.pos_mix,
            self.smoother.freeze_delay,
        )
    }

    pub fn set_smoothing_factors(&mut self, clicked: f64, released: f64, freeze: f64) {
        self.smoother.pos_mix_clicked = clicked;
        self.smoother.pos_mix = released;
        self.smoother.freeze_delay = freeze;
    }

    pub fn map_button(&mut self, button: RemoteButton, ir_visible: bool, key: Option<HostKey>) {
        match key {
            Some(k) => self.buttons.add_mapping(button, ir_visible, vec![k]),
            None => self.buttons.clear_mapping(button, ir_visible),
        }
    }

    pub fn mapped_keys(&self, button: RemoteButton, ir_visible: bool) -> &[HostKey] {
        self.buttons.mapped_keys(button, ir_visible)
    }

    /// The clustering stage's own pair, for the `lr:`/`lr:invalid` broadcast.
    pub fn cluster_left_right(&self) -> Option<(Vec3, Vec3)> {
        let cluster = self.last_frame.history.get(&Checkpoint::Cluster)?;
        if cluster.n_valid_ir < 1 {
            return None;
        }
        Some((cluster.dots[0], cluster.dots[1]))
    }

    /// The final, post-pipeline pair, for the `flr:`/`flr:invalid` broadcast.
    pub fn filtered_left_right(&self) -> Option<(Vec3, Vec3)> {
        if self.last_frame.n_valid_ir == 0 {
            return None;
        }
        let left = self.last_frame.dots[0];
        let right = if self.last_frame.n_valid_ir >= 2 { self.last_frame.dots[1] } else { left };
        Some((left, right))
    }

    pub fn ir_spot(&self, index: usize) -> Option<Vec3> {
        let cluster = self.last_frame.history.get(&Checkpoint::Cluster)?;
        if index >= cluster.n_valid_ir as usize {
            return None;
        }
        Some(cluster.dots[index])
    }

    /// Whether a remote is currently attached (vs. waiting for one to be paired).
    pub fn is_connected(&self) -> bool {
        matches!(self.remote, RemoteState::Running { .. })
    }

    pub fn pressed_remote_buttons(&self) -> Vec<RemoteButton> {
        RemoteButton::ALL
            .into_iter()
            .filter(|b| self.last_frame.is_button_pressed(ButtonNamespace::Remote, b.as_id()))
            .collect()
    }

    fn run_pipeline(&mut self, source: Frame) -> Frame {
        let cluster_out = self.cluster.process(&source);
        let buttons_out = self.buttons.process(&cluster_out);
        let unrotate_out = self.unrotate.process(&buttons_out);
        let predictive_out = self.predictive.process(&unrotate_out);
        self.smoother.process(&predictive_out)
    }

    fn source_frame(report: &RemoteReport, delta_t_ms: u32) -> Frame {
        let mut frame = Frame::default();
        frame.delta_t_ms = delta_t_ms;
        frame.accel = report.accel;
        frame.n_valid_ir = report.ir_spots.len().min(4) as u8;
        for (i, p) in report.ir_spots.iter().take(4).enumerate() {
            frame.dots[i] = *p;
        }

        let mut builder = crate::frame::ButtonEdgesBuilder::default();
        for button in RemoteButton::ALL {
            if report.buttons[button.as_id() as usize] {
                builder.push(crate::frame::ButtonEdge::remote(button, true));
            }
        }
        frame.buttons = builder.build();

        let mut history: HashMap<Checkpoint, Rc<Frame>> = HashMap::new();
        history.insert(Checkpoint::Cluster, Rc::new(frame.clone()));
        frame.history = history;
        frame
    }

    fn project_and_emit(&mut self, frame: &Frame) {
        for edge in frame.buttons.iter() {
            if edge.ns == ButtonNamespace::HostKey {
                self.vpointer.set_button(HostKey(edge.id as u16), edge.pressed && self.mouse_enabled);
            }
        }

        if self.mouse_enabled && frame.n_valid_ir > 0 {
            let mut mid = Vec3::mean(&frame.dots[..frame.n_valid_ir as usize]);
            mid.z = 1.0;

            let x = clamp(
                mid.dot(self.mouse_mat_x),
                self.screen_area.top_left.x,
                self.screen_area.bottom_right.x,
            );
            let y = clamp(
                mid.dot(self.mouse_mat_y),
                self.screen_area.top_left.y,
                self.screen_area.bottom_right.y,
            );
            self.vpointer.move_to(x.round() as u16, y.round() as u16);
        }
    }

    /// Poll the monitor for a new device while disconnected; transition to
    /// [`RemoteState::Running`] on success.
    fn poll_for_remote(&mut self) {
        let paths = self.monitor.poll();
        for path in paths {
            match self.monitor.open(path) {
                Ok(source) => {
                    info!("remote connected");
                    self.remote = RemoteState::Running { source, last_event: Instant::now() };
                    return;
                }
                Err(err) => warn!(%err, "failed to open remote"),
            }
        }
    }

    /// Run one tick: poll the remote (or the monitor, if disconnected), run the
    /// pipeline, and write the result to the virtual pointer.
    pub fn tick(&mut self) {
        let now = Instant::now();
        let delta_t_ms = now.duration_since(self.last_tick).as_millis().min(u32::MAX as u128) as u32;
        self.last_tick = now;

        match &mut self.remote {
            RemoteState::NoRemote { last_poll } => {
                if now.duration_since(*last_poll) >= MONITOR_POLL_INTERVAL {
                    *last_poll = now;
                    self.poll_for_remote();
                }
            }
            RemoteState::Running { source, last_event } => {
                match source.poll() {
                    Ok(report) => {
                        *last_event = now;
                        let source_frame = Self::source_frame(&report, delta_t_ms);
                        let out = self.run_pipeline(source_frame);
                        self.project_and_emit(&out);
                        self.last_frame = out;
                    }
                    Err(RemoteError::Gone) => {
                        warn!("remote disappeared");
                        self.remote = RemoteState::NoRemote { last_poll: now };
                    }
                    Err(err) => {
                        debug!(%err, "transient remote read error");
                    }
                }

                if let RemoteState::Running { last_event, .. } = &self.remote {
                    if now.duration_since(*last_event) >= ACCEL_TIMEOUT {
                        warn!("no accelerometer event for 500ms, treating remote as gone");
                        self.remote = RemoteState::NoRemote { last_poll: now };
                    }
                }
            }
        }
    }
}
