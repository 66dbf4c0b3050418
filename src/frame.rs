//! The per-tick pipeline state object and the module contract that operates on it.
//!
//! Every [`PipelineModule`] reads a previous [`Frame`] and produces its own. Modules
//! never mutate the frame they were handed; they copy it (see [`Frame::copied_from`])
//! and overwrite only the fields their stage is responsible for.

use std::collections::HashMap;
use std::rc::Rc;

/// Maximum number of simultaneous button edges a single frame can carry.
pub const MAX_BUTTONS: usize = 32;

/// A 3-component vector used for tracking dots and the accelerometer reading.
///
/// The third component is unused by most stages; clustering sets it to `1` to make
/// points homogeneous for the projection stage's affine dot products.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn len(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn dot(self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn scaled(self, s: f64) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }

    /// Divide by `n`, treating `n <= 0` as a no-op (callers never hit this legitimately;
    /// it exists so a stray empty-cluster division can't panic mid-tick).
    pub fn mean(points: &[Vec3]) -> Vec3 {
        if points.is_empty() {
            return Vec3::ZERO;
        }
        let sum = points.iter().fold(Vec3::ZERO, |a, b| a + *b);
        sum.scaled(1.0 / points.len() as f64)
    }
}

impl std::ops::Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Vec3::ZERO
    }
}

/// The 11 physical buttons a Wii Remote reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RemoteButton {
    A,
    B,
    Plus,
    Minus,
    Home,
    One,
    Two,
    Up,
    Down,
    Left,
    Right,
}

impl RemoteButton {
    pub const ALL: [RemoteButton; 11] = [
        RemoteButton::A,
        RemoteButton::B,
        RemoteButton::Plus,
        RemoteButton::Minus,
        RemoteButton::Home,
        RemoteButton::One,
        RemoteButton::Two,
        RemoteButton::Up,
        RemoteButton::Down,
        RemoteButton::Left,
        RemoteButton::Right,
    ];

    /// Single-character protocol name used on the control socket (`b:` broadcasts).
    pub fn protocol_name(self) -> &'static str {
        match self {
            RemoteButton::A => "a",
            RemoteButton::B => "b",
            RemoteButton::Plus => "+",
            RemoteButton::Minus => "-",
            RemoteButton::Home => "h",
            RemoteButton::One => "1",
            RemoteButton::Two => "2",
            RemoteButton::Up => "u",
            RemoteButton::Down => "d",
            RemoteButton::Left => "l",
            RemoteButton::Right => "r",
        }
    }

    /// Human-readable name used in configuration keys (`button_<name>`).
    pub fn readable_name(self) -> &'static str {
        match self {
            RemoteButton::A => "A",
            RemoteButton::B => "B",
            RemoteButton::Plus => "Plus",
            RemoteButton::Minus => "Minus",
            RemoteButton::Home => "Home",
            RemoteButton::One => "One",
            RemoteButton::Two => "Two",
            RemoteButton::Up => "Up",
            RemoteButton::Down => "Down",
            RemoteButton::Left => "Left",
            RemoteButton::Right => "Right",
        }
    }

    pub fn from_readable_name(name: &str) -> Option<RemoteButton> {
        RemoteButton::ALL
            .into_iter()
            .find(|b| b.readable_name().eq_ignore_ascii_case(name))
    }

    /// Lowercased `button_<name>[_offscreen]` configuration key.
    pub fn config_key(self, ir_visible: bool) -> String {
        let suffix = if ir_visible { "" } else { "_offscreen" };
        format!("button_{}{}", self.readable_name().to_lowercase(), suffix)
    }

    /// As used by the internal button-edge list (`ButtonNamespace::Remote` ids).
    pub fn as_id(self) -> u32 {
        RemoteButton::ALL.iter().position(|b| *b == self).unwrap() as u32
    }

    pub fn from_id(id: u32) -> Option<RemoteButton> {
        RemoteButton::ALL.get(id as usize).copied()
    }
}

/// An opaque host keycode (mirrors a Linux `evdev` `KEY_`/`BTN_` code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostKey(pub u16);

/// Which id-space a button edge belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonNamespace {
    /// Sentinel used to terminate the bounded button-edge list.
    None,
    /// Raw remote buttons, id is [`RemoteButton::as_id`].
    Remote,
    /// Host keycodes, id is a [`HostKey`].
    HostKey,
}

/// One entry in the per-frame bounded button-edge sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonEdge {
    pub ns: ButtonNamespace,
    pub id: u32,
    pub pressed: bool,
}

impl ButtonEdge {
    pub const NONE: ButtonEdge = ButtonEdge { ns: ButtonNamespace::None, id: 0, pressed: false };

    pub fn remote(button: RemoteButton, pressed: bool) -> Self {
        ButtonEdge { ns: ButtonNamespace::Remote, id: button.as_id(), pressed }
    }

    pub fn host_key(key: HostKey, pressed: bool) -> Self {
        ButtonEdge { ns: ButtonNamespace::HostKey, id: key.0 as u32, pressed }
    }

    fn matches(&self, ns: ButtonNamespace, id: u32) -> bool {
        self.ns == ns && self.id == id
    }
}

/// A fixed-capacity, sentinel-terminated sequence of button edges.
///
/// Mirrors the original's `pressedButtons[MAX_BUTTONS]` array: at most one entry per
/// `(namespace, id)` pair, and anything after the first [`ButtonEdge::NONE`] is
/// considered unset.
#[derive(Debug, Clone, Copy)]
pub struct ButtonEdges {
    entries: [ButtonEdge; MAX_BUTTONS],
}

impl Default for ButtonEdges {
    fn default() -> Self {
        ButtonEdges { entries: [ButtonEdge::NONE; MAX_BUTTONS] }
    }
}

impl ButtonEdges {
    pub fn iter(&self) -> impl Iterator<Item = &ButtonEdge> {
        self.entries.iter().take_while(|e| e.ns != ButtonNamespace::None)
    }

    pub fn is_pressed(&self, ns: ButtonNamespace, id: u32) -> bool {
        self.iter().find(|e| e.matches(ns, id)).map(|e| e.pressed).unwrap_or(false)
    }

    /// A builder that appends edges in order, silently dropping overflow past
    /// [`MAX_BUTTONS`] (the original driver's behavior: `if (assignedButtons >=
    /// MAX_BUTTONS) break;`).
    pub fn builder() -> ButtonEdgesBuilder {
        ButtonEdgesBuilder::default()
    }
}

#[derive(Default)]
pub struct ButtonEdgesBuilder {
    entries: Vec<ButtonEdge>,
}

impl ButtonEdgesBuilder {
    pub fn push(&mut self, edge: ButtonEdge) -> &mut Self {
        if self.entries.len() < MAX_BUTTONS {
            self.entries.push(edge);
        }
        self
    }

    pub fn build(self) -> ButtonEdges {
        let mut out = ButtonEdges::default();
        for (slot, edge) in out.entries.iter_mut().zip(self.entries.into_iter()) {
            *slot = edge;
        }
        out
    }
}

/// Named checkpoints earlier stages can publish so later stages can look back
/// without every module knowing about every other module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Checkpoint {
    /// Published by the clustering stage.
    Cluster,
    /// Published by the (optional) towed-circle stage.
    LastLeftRight,
}

/// The pipeline's shared per-tick state. Produced by one stage, consumed by the next.
#[derive(Debug, Clone)]
pub struct Frame {
    pub delta_t_ms: u32,
    pub accel: Vec3,
    pub n_valid_ir: u8,
    pub dots: [Vec3; 4],
    pub buttons: ButtonEdges,
    pub history: HashMap<Checkpoint, Rc<Frame>>,
}

impl Default for Frame {
    fn default() -> Self {
        Frame {
            delta_t_ms: 0,
            accel: Vec3::ZERO,
            n_valid_ir: 0,
            dots: [Vec3::ZERO; 4],
            buttons: ButtonEdges::default(),
            history: HashMap::new(),
        }
    }
}

impl Frame {
    /// `ir_visible` as used by the button mapper and config keys: any tracking dot
    /// currently valid.
    pub fn ir_visible(&self) -> bool {
        self.n_valid_ir > 0
    }

    pub fn is_button_pressed(&self, ns: ButtonNamespace, id: u32) -> bool {
        self.buttons.is_pressed(ns, id)
    }

    /// Starting point for a stage's own frame: clone everything, then overwrite only
    /// the fields the stage transforms. Equivalent to the original's `copyFromPrev`.
    pub fn copied_from(prev: &Frame) -> Frame {
        prev.clone()
    }
}

/// Contract shared by every stage in the pipeline.
pub trait PipelineModule {
    /// Consume the previous stage's frame and produce this stage's own.
    fn process(&mut self, prev: &Frame) -> Frame;
}

/// Linux `evdev` keycodes referenced by more than one module (the click-detection
/// heuristic in the smoother, the driver's default button bindings, and the virtual
/// pointer's advertised keycode table all need the same numbers).
pub mod keys {
    use super::HostKey;

    pub const BTN_LEFT: HostKey = HostKey(0x110);
    pub const BTN_RIGHT: HostKey = HostKey(0x111);
    pub const BTN_MIDDLE: HostKey = HostKey(0x112);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_edges_cap_at_max_buttons() {
        let mut b = ButtonEdges::builder();
        for i in 0..(MAX_BUTTONS + 5) {
            b.push(ButtonEdge::host_key(HostKey(i as u16), true));
        }
        let edges = b.build();
        assert_eq!(edges.iter().count(), MAX_BUTTONS);
    }

    #[test]
    fn remote_button_round_trips_through_id() {
        for b in RemoteButton::ALL {
            assert_eq!(RemoteButton::from_id(b.as_id()), Some(b));
        }
    }

    #[test]
    fn config_key_uses_offscreen_suffix() {
        assert_eq!(RemoteButton::A.config_key(true), "button_a");
        assert_eq!(RemoteButton::A.config_key(false), "button_a_offscreen");
    }

    #[test]
    fn vec3_mean_of_empty_is_zero() {
        assert_eq!(Vec3::mean(&[]), Vec3::ZERO);
    }
}
