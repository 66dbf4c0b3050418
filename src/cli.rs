//! Command-line surface, grounded on the original driver's hand-rolled
//! `--flag=value` / `--flag value` option parser: same two flags, same defaults,
//! `--help`/`--version` handled by [`clap`] instead of a bespoke printer.

use clap::Parser;

use crate::config::DEFAULT_CONFIG_PATH;
use crate::control_socket::DEFAULT_SOCKET_ADDR;

#[derive(Debug, Parser)]
#[command(name = "wiimote-mouse-driver", version, about = "User-space mouse driver backed by a Wii Remote")]
pub struct Cli {
    /// Path to the control socket.
    #[arg(long, default_value = DEFAULT_SOCKET_ADDR)]
    pub socket_path: String,

    /// Path to the config file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config_file: String,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_driver_paths() {
        let cli = Cli::parse_from(["wiimote-mouse-driver"]);
        assert_eq!(cli.socket_path, DEFAULT_SOCKET_ADDR);
        assert_eq!(cli.config_file, DEFAULT_CONFIG_PATH);
    }

    #[test]
    fn accepts_both_flag_forms() {
        let cli = Cli::parse_from([
            "wiimote-mouse-driver",
            "--socket-path=/tmp/a.sock",
            "--config-file",
            "/tmp/a.conf",
        ]);
        assert_eq!(cli.socket_path, "/tmp/a.sock");
        assert_eq!(cli.config_file, "/tmp/a.conf");
    }
}
