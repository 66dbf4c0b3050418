//! Narrow interfaces to the physical remote: discover a device path, open it, and
//! drain its queued events once per tick.
//!
//! Mirrors the split the pipeline's own [`crate::frame::PipelineModule`] trait uses: a
//! small required contract (`poll`) that hides everything about *how* events arrive,
//! so the pipeline and driver can be exercised in tests against a fake without ever
//! touching real hardware.

use std::fmt;

use crate::error::RemoteError;
use crate::frame::Vec3;

/// The 11 remote buttons, indexed by [`crate::frame::RemoteButton::as_id`].
pub const BUTTON_COUNT: usize = 11;

/// One drained tick's worth of remote state.
#[derive(Debug, Clone)]
pub struct RemoteReport {
    pub accel: Vec3,
    /// Up to four valid IR points (already filtered for validity and non-zero length).
    pub ir_spots: Vec<Vec3>,
    /// Indexed by `RemoteButton::as_id()`.
    pub buttons: [bool; BUTTON_COUNT],
}

impl Default for RemoteReport {
    fn default() -> Self {
        RemoteReport { accel: Vec3::ZERO, ir_spots: Vec::new(), buttons: [false; BUTTON_COUNT] }
    }
}

/// A filesystem-backed address for a discovered remote (e.g.
/// `/sys/bus/hid/devices/0005:057E:0306.0001`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath(pub String);

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An open connection to one remote. `poll` drains every queued event and returns the
/// accumulated state; it never blocks.
pub trait RemoteSource {
    fn poll(&mut self) -> Result<RemoteReport, RemoteError>;
}

/// Discovers remote device paths and opens connections to them.
pub trait RemoteMonitor {
    /// Newly observed device paths since the last call. May return duplicates; callers
    /// are expected to dedupe against devices they've already opened.
    fn poll(&mut self) -> Vec<RemotePath>;

    fn open(&mut self, path: RemotePath) -> Result<Box<dyn RemoteSource>, RemoteError>;
}

#[cfg(feature = "xwiimote-backend")]
pub mod xwiimote_backend {
    //! A [`RemoteSource`]/[`RemoteMonitor`] pair backed by `xwiimote-sys`'s raw FFI
    //! bindings to `libxwiimote`, performing the same non-blocking
    //! dispatch-until-`EAGAIN` loop and 500ms accelerometer watchdog as the reference
    //! userspace driver this crate's wire protocol was modeled on.

    use std::ffi::CString;
    use std::path::Path;
    use std::time::{Duration, Instant};

    use xwiimote_sys::{
        xwii_event, xwii_iface, xwii_iface_close, xwii_iface_dispatch, xwii_iface_new,
        xwii_iface_open, xwii_iface_unref, xwii_monitor, xwii_monitor_new, xwii_monitor_poll,
        xwii_monitor_unref, XWII_EVENT_ACCEL, XWII_EVENT_IR, XWII_EVENT_KEY, XWII_IFACE_ACCEL,
        XWII_IFACE_CORE, XWII_IFACE_IR,
    };

    use super::{RemoteMonitor, RemoteReport, RemoteSource, BUTTON_COUNT};
    use crate::error::RemoteError;
    use crate::frame::{RemoteButton, Vec3};

    const ACCEL_WATCHDOG: Duration = Duration::from_millis(500);

    /// Maps an `xwii_event_key`'s raw code to our button ordering.
    fn button_for_code(code: u32) -> Option<RemoteButton> {
        use xwiimote_sys::{
            XWII_KEY_A, XWII_KEY_B, XWII_KEY_DOWN, XWII_KEY_HOME, XWII_KEY_LEFT, XWII_KEY_MINUS,
            XWII_KEY_ONE, XWII_KEY_PLUS, XWII_KEY_RIGHT, XWII_KEY_TWO, XWII_KEY_UP,
        };
        match code {
            c if c == XWII_KEY_A => Some(RemoteButton::A),
            c if c == XWII_KEY_B => Some(RemoteButton::B),
            c if c == XWII_KEY_PLUS => Some(RemoteButton::Plus),
            c if c == XWII_KEY_MINUS => Some(RemoteButton::Minus),
            c if c == XWII_KEY_HOME => Some(RemoteButton::Home),
            c if c == XWII_KEY_ONE => Some(RemoteButton::One),
            c if c == XWII_KEY_TWO => Some(RemoteButton::Two),
            c if c == XWII_KEY_UP => Some(RemoteButton::Up),
            c if c == XWII_KEY_DOWN => Some(RemoteButton::Down),
            c if c == XWII_KEY_LEFT => Some(RemoteButton::Left),
            c if c == XWII_KEY_RIGHT => Some(RemoteButton::Right),
            _ => None,
        }
    }

    pub struct XwiimoteSource {
        handle: *mut xwii_iface,
        device_path: String,
        last_accel_event: Instant,
        buttons: [bool; BUTTON_COUNT],
        ir: Vec<Vec3>,
        accel: Vec3,
    }

    impl XwiimoteSource {
        pub fn open(device_path: &str) -> Result<Self, RemoteError> {
            let c_path = CString::new(device_path)
                .map_err(|e| RemoteError::OpenFailed(e.to_string()))?;
            let mut handle: *mut xwii_iface = std::ptr::null_mut();
            let rc = unsafe { xwii_iface_new(&mut handle, c_path.as_ptr()) };
            if rc < 0 || handle.is_null() {
                return Err(RemoteError::OpenFailed(format!(
                    "xwii_iface_new failed for {device_path} (rc {rc})"
                )));
            }
            let rc = unsafe { xwii_iface_open(handle, XWII_IFACE_CORE | XWII_IFACE_ACCEL | XWII_IFACE_IR) };
            if rc < 0 {
                unsafe { xwii_iface_unref(handle) };
                return Err(RemoteError::OpenFailed(format!(
                    "xwii_iface_open failed for {device_path} (rc {rc})"
                )));
            }
            Ok(XwiimoteSource {
                handle,
                device_path: device_path.to_string(),
                last_accel_event: Instant::now(),
                buttons: [false; BUTTON_COUNT],
                ir: Vec::new(),
                accel: Vec3::ZERO,
            })
        }
    }

    impl Drop for XwiimoteSource {
        fn drop(&mut self) {
            unsafe {
                xwii_iface_close(self.handle, XWII_IFACE_CORE | XWII_IFACE_ACCEL | XWII_IFACE_IR);
                xwii_iface_unref(self.handle);
            }
        }
    }

    impl RemoteSource for XwiimoteSource {
        fn poll(&mut self) -> Result<RemoteReport, RemoteError> {
            if !Path::new(&self.device_path).exists() {
                return Err(RemoteError::Gone);
            }

            let mut received_accel = false;
            loop {
                let mut ev: xwii_event = unsafe { std::mem::zeroed() };
                let rc = unsafe {
                    xwii_iface_dispatch(self.handle, &mut ev, std::mem::size_of::<xwii_event>())
                };
                if rc != 0 {
                    break;
                }

                match ev.type_ {
                    t if t == XWII_EVENT_ACCEL => {
                        let abs = unsafe { ev.v.abs[0] };
                        self.accel = Vec3::new(abs.x as f64, abs.y as f64, abs.z as f64);
                        received_accel = true;
                    }
                    t if t == XWII_EVENT_IR => {
                        let mut spots = Vec::with_capacity(4);
                        for abs in unsafe { &ev.v.abs[..4] } {
                            let point = Vec3::new(abs.x as f64, abs.y as f64, 0.0);
                            if abs.x != 0 || abs.y != 0 {
                                spots.push(point);
                            }
                        }
                        self.ir = spots;
                    }
                    t if t == XWII_EVENT_KEY => {
                        let key = unsafe { ev.v.key };
                        if let Some(button) = button_for_code(key.code as u32) {
                            self.buttons[button.as_id() as usize] = key.state != 0;
                        }
                    }
                    _ => {}
                }
            }

            let now = Instant::now();
            if received_accel {
                self.last_accel_event = now;
            } else if now.duration_since(self.last_accel_event) > ACCEL_WATCHDOG {
                return Err(RemoteError::Gone);
            }

            Ok(RemoteReport { accel: self.accel, ir_spots: self.ir.clone(), buttons: self.buttons })
        }
    }

    pub struct XwiimoteMonitor {
        handle: *mut xwii_monitor,
        known: Vec<String>,
    }

    impl XwiimoteMonitor {
        pub fn new() -> Self {
            let handle = unsafe { xwii_monitor_new(true, false) };
            XwiimoteMonitor { handle, known: Vec::new() }
        }
    }

    impl Drop for XwiimoteMonitor {
        fn drop(&mut self) {
            unsafe { xwii_monitor_unref(self.handle) };
        }
    }

    impl RemoteMonitor for XwiimoteMonitor {
        fn poll(&mut self) -> Vec<super::RemotePath> {
            let mut found = Vec::new();
            loop {
                let raw = unsafe { xwii_monitor_poll(self.handle) };
                if raw.is_null() {
                    break;
                }
                let path = unsafe { std::ffi::CStr::from_ptr(raw) }.to_string_lossy().into_owned();
                unsafe { libc::free(raw as *mut libc::c_void) };
                if !self.known.contains(&path) {
                    self.known.push(path.clone());
                    found.push(super::RemotePath(path));
                }
            }
            found
        }

        fn open(&mut self, path: super::RemotePath) -> Result<Box<dyn RemoteSource>, RemoteError> {
            Ok(Box::new(XwiimoteSource::open(&path.0)?))
        }
    }
}
