//! `wiimote-mouse-driver`: a user-space mouse driver that turns a Wii Remote's IR
//! camera and accelerometer into an absolute on-screen pointer.
//!
//! The pipeline reads raw IR dots and acceleration from a [`remote::RemoteSource`],
//! runs them through a fixed sequence of [`frame::PipelineModule`] stages —
//! clustering, button mapping, wrist-roll un-rotation, predictive dual-IR tracking,
//! and exponential smoothing — and projects the result onto a [`vpointer::VirtualPointer`].
//! A [`driver::Driver`] owns this whole lifecycle, including reconnecting when the
//! remote goes away.
//!
//! # Modules
//! - [`frame`] — the `Frame`/`PipelineModule` contract shared by every stage
//! - [`pipeline`] — the individual stages (clustering, un-rotation, prediction, smoothing, buttons)
//! - [`driver`] — ties the stages together into a runnable device
//! - [`remote`] — reading a physical remote (`xwiimote-backend` feature)
//! - [`vpointer`] — writing to a virtual pointer device (`uinput-backend` feature)
//! - [`control_socket`] — the UNIX domain socket control protocol
//! - [`commands`] — command dispatch against a live [`driver::Driver`]
//! - [`config`] — the on-disk configuration store
//! - [`cli`] — command-line argument parsing
//!
//! # Feature flags
//! - **`xwiimote-backend`** — reads from a real Wii Remote via `xwiimote-sys`.
//! - **`uinput-backend`** — writes to a virtual input device via `evdev`'s uinput support.
//!
//! Neither feature is required to use the pipeline itself: [`remote::RemoteSource`]
//! and [`vpointer::VirtualPointer`] are plain traits, so tests and alternative
//! backends can implement them directly.
//!
//! ## Threading
//! [`driver::Driver`] is driven by a single tick loop on one thread (see the
//! `driver` binary). The control socket runs its acceptor and per-connection
//! readers on separate threads, synchronized through a mutex-guarded command
//! queue; [`control_socket::ControlSocket::process_events`] drains that queue back
//! on the driver's thread once per tick.

pub mod cli;
pub mod commands;
pub mod config;
pub mod control_socket;
pub mod driver;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod remote;
pub mod vpointer;

pub use error::{CommandError, ConfigError, RemoteError, SocketError};
pub use frame::{Frame, PipelineModule};

/// A small prelude for downstream crates embedding the pipeline directly.
pub mod prelude {
    pub use crate::driver::Driver;
    pub use crate::frame::{Frame, HostKey, PipelineModule, RemoteButton, Vec3};
    pub use crate::remote::{RemoteMonitor, RemoteReport, RemoteSource};
    pub use crate::vpointer::VirtualPointer;
}
