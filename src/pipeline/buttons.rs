//! Maps physical remote buttons to host key edges, with a separate mapping depending
//! on whether the remote currently has an IR fix.
//!
//! Each tick starts from the host keys asserted by *this stage's own* previous output,
//! derives a fresh set of assertions from the remote buttons held this tick, and emits
//! release edges for anything held last tick that isn't re-asserted this tick. A host
//! key held down by two different remote buttons at once only releases once neither is
//! held. The previous output has to be a field on the stage itself, not read back off
//! `prev` — `prev` is the frame handed down from the stage before this one in the
//! pipeline (cluster output), which never carries `HostKey` edges at all.

use std::collections::HashMap;

use crate::frame::{ButtonEdge, ButtonNamespace, Frame, HostKey, PipelineModule, RemoteButton};

#[derive(Default)]
pub struct ButtonMapperStage {
    mapping: HashMap<(RemoteButton, bool), Vec<HostKey>>,
    last_output: Vec<HostKey>,
}

impl ButtonMapperStage {
    pub fn add_mapping(&mut self, button: RemoteButton, ir_visible: bool, keys: Vec<HostKey>) {
        self.mapping.insert((button, ir_visible), keys);
    }

    pub fn clear_mapping(&mut self, button: RemoteButton, ir_visible: bool) {
        self.mapping.remove(&(button, ir_visible));
    }

    pub fn clear_button_assignments(&mut self, button: RemoteButton) {
        self.mapping.remove(&(button, true));
        self.mapping.remove(&(button, false));
    }

    pub fn mapped_keys(&self, button: RemoteButton, ir_visible: bool) -> &[HostKey] {
        self.mapping
            .get(&(button, ir_visible))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

impl PipelineModule for ButtonMapperStage {
    fn process(&mut self, prev: &Frame) -> Frame {
        let mut out = Frame::copied_from(prev);

        let mut previously_held: Vec<HostKey> = self.last_output.clone();

        let mut newly_held: Vec<HostKey> = Vec::new();
        for button in RemoteButton::ALL {
            if prev.is_button_pressed(ButtonNamespace::Remote, button.as_id()) {
                for key in self.mapped_keys(button, prev.ir_visible()) {
                    if !newly_held.contains(key) {
                        newly_held.push(*key);
                    }
                }
            }
        }

        let mut builder = crate::frame::ButtonEdgesBuilder::default();
        for key in &newly_held {
            builder.push(ButtonEdge::host_key(*key, true));
        }
        previously_held.retain(|k| !newly_held.contains(k));
        for key in &previously_held {
            builder.push(ButtonEdge::host_key(*key, false));
        }

        out.buttons = builder.build();
        self.last_output = newly_held;
        out
    }
}
