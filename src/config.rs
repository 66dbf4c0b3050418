//! The on-disk configuration store: a line-oriented `key=value` format whose
//! vector-typed values are three `num/den` rationals separated by commas.
//!
//! Grounded on the original driver's `Config` class: unknown keys are dropped with a
//! warning rather than rejected outright, and [`Config::provide_default`] only fills a
//! key in if it wasn't already present (so a first-run default never clobbers a value
//! the user already wrote to disk).

use std::collections::HashMap;

use tracing::warn;

use crate::error::ConfigError;
use crate::frame::{RemoteButton, Vec3};

/// Default on-disk path, matching the reference driver's own default.
pub const DEFAULT_CONFIG_PATH: &str = "./wiimote-mouse.conf";

const VECTOR_KEYS: &[&str] = &[
    "calmatx",
    "calmaty",
    "screen_top_left",
    "screen_bottom_right",
    "smoothing_clicked_released_delay",
];

/// Precision used when serializing a [`Vec3`] back out as `num/den` triples.
const WRITE_DIVISOR: i64 = 1_000_000;

fn is_vector_key(key: &str) -> bool {
    VECTOR_KEYS.contains(&key)
}

fn is_valid_key(key: &str) -> bool {
    const SCALAR_KEYS: &[&str] = &[
        "socket_address",
        "calmatx",
        "calmaty",
        "screen_top_left",
        "screen_bottom_right",
        "default_ir_distance",
        "smoothing_clicked_released_delay",
        "towed_circle_radius",
    ];
    if SCALAR_KEYS.contains(&key) {
        return true;
    }
    RemoteButton::ALL
        .into_iter()
        .any(|b| b.config_key(true) == key || b.config_key(false) == key)
}

/// Parse `"n/d,n/d,n/d"` into a [`Vec3`].
fn parse_vector3(value: &str) -> Option<Vec3> {
    let parts: Vec<&str> = value.trim().split(',').collect();
    if parts.len() != 3 {
        return None;
    }
    let mut out = [0.0f64; 3];
    for (i, part) in parts.iter().enumerate() {
        let (n, d) = part.split_once('/')?;
        let n: f64 = n.trim().parse().ok()?;
        let d: f64 = d.trim().parse().ok()?;
        if d == 0.0 {
            return None;
        }
        out[i] = n / d;
    }
    Some(Vec3::new(out[0], out[1], out[2]))
}

fn vector3_to_string(v: Vec3) -> String {
    format!(
        "{}/{},{}/{},{}/{}",
        (v.x * WRITE_DIVISOR as f64).round() as i64,
        WRITE_DIVISOR,
        (v.y * WRITE_DIVISOR as f64).round() as i64,
        WRITE_DIVISOR,
        (v.z * WRITE_DIVISOR as f64).round() as i64,
        WRITE_DIVISOR,
    )
}

/// The parsed/writable configuration store for one `key=value` file.
#[derive(Debug, Default, Clone)]
pub struct Config {
    path: String,
    pub strings: HashMap<String, String>,
    pub vectors: HashMap<String, Vec3>,
}

impl Config {
    pub fn new(path: impl Into<String>) -> Self {
        Config { path: path.into(), strings: HashMap::new(), vectors: HashMap::new() }
    }

    /// Load from disk, silently starting empty if the file doesn't exist yet (first
    /// run). A malformed vector value drops just that entry and logs a warning;
    /// startup always continues.
    pub fn load(path: impl Into<String>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        let mut config = Config::new(path);
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else { continue };
            let key = key.trim().to_ascii_lowercase();
            if !is_valid_key(&key) {
                warn!(key, "ignoring unrecognized configuration key");
                continue;
            }
            if is_vector_key(&key) {
                match parse_vector3(value) {
                    Some(v) => {
                        config.vectors.insert(key, v);
                    }
                    None => warn!(key, value, "malformed vector value, dropping entry"),
                }
            } else {
                config.strings.insert(key, value.trim().to_string());
            }
        }
        Ok(config)
    }

    /// Fill `key` with `value` only if it isn't already present, used to seed
    /// first-run defaults from the driver's built-in values before persisting.
    pub fn provide_default(&mut self, key: &str, value: &str) {
        let key = key.to_ascii_lowercase();
        if is_vector_key(&key) {
            if !self.vectors.contains_key(&key) {
                if let Some(v) = parse_vector3(value) {
                    self.vectors.insert(key, v);
                }
            }
        } else if !self.strings.contains_key(&key) {
            self.strings.insert(key, value.to_string());
        }
    }

    pub fn set_vector(&mut self, key: &str, value: Vec3) {
        self.vectors.insert(key.to_string(), value);
    }

    pub fn set_string(&mut self, key: &str, value: impl Into<String>) {
        self.strings.insert(key.to_string(), value.into());
    }

    pub fn write(&self) -> Result<(), ConfigError> {
        let mut out = String::new();
        for (key, value) in &self.strings {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        for (key, value) in &self.vectors {
            out.push_str(key);
            out.push('=');
            out.push_str(&vector3_to_string(*value));
            out.push('\n');
        }
        std::fs::write(&self.path, out)
            .map_err(|source| ConfigError::Io { path: self.path.clone(), source })
    }
}
