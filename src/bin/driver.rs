//! Binary entry point: wires the CLI, config store, control socket, remote
//! monitor, and virtual pointer together and drives the ~100Hz tick loop,
//! mirroring `main()` in the original driver.

use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::info;

use wiimote_mouse_driver::cli::Cli;
use wiimote_mouse_driver::commands::{self, apply_device_configuration};
use wiimote_mouse_driver::config::Config;
use wiimote_mouse_driver::control_socket::ControlSocket;
use wiimote_mouse_driver::driver::Driver;
use wiimote_mouse_driver::frame::RemoteButton;
use wiimote_mouse_driver::remote::RemoteMonitor;
use wiimote_mouse_driver::vpointer::VirtualPointer;

const TICK_INTERVAL: Duration = Duration::from_millis(10);

fn build_monitor() -> Box<dyn RemoteMonitor> {
    #[cfg(feature = "xwiimote-backend")]
    {
        Box::new(wiimote_mouse_driver::remote::xwiimote_backend::XwiimoteMonitor::new())
    }
    #[cfg(not(feature = "xwiimote-backend"))]
    {
        compile_error!("at least one remote backend feature (xwiimote-backend) must be enabled");
    }
}

fn build_vpointer() -> std::io::Result<Box<dyn VirtualPointer>> {
    #[cfg(feature = "uinput-backend")]
    {
        Ok(Box::new(wiimote_mouse_driver::vpointer::uinput_backend::UinputPointer::open()?))
    }
    #[cfg(not(feature = "uinput-backend"))]
    {
        compile_error!("at least one virtual pointer backend feature (uinput-backend) must be enabled");
    }
}

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

fn install_signal_handler() {
    // SAFETY: the handler only stores to an AtomicBool, the one signal-safe thing
    // to do from inside a signal handler.
    unsafe {
        libc::signal(libc::SIGINT, handle_sigint as libc::sighandler_t);
    }
}

extern "C" fn handle_sigint(_signum: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(std::io::stdout().is_terminal())
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    install_signal_handler();

    let cli = Cli::parse_args();
    info!(config_file = %cli.config_file, "loading configuration");

    let mut config = Config::load(&cli.config_file)?;
    config.provide_default("socket_address", &cli.socket_path);
    let socket_address = config.strings.get("socket_address").cloned().unwrap_or(cli.socket_path.clone());

    let socket = ControlSocket::bind(&socket_address)?;
    info!(socket_address, "control socket bound");

    let monitor = build_monitor();
    let vpointer = build_vpointer()?;
    let mut driver = Driver::new(monitor, vpointer);
    apply_device_configuration(&mut driver, &mut config);

    let mut was_connected = false;
    let mut last_buttons: Vec<RemoteButton> = Vec::new();

    while !INTERRUPTED.load(Ordering::SeqCst) {
        let tick_start = Instant::now();

        socket.process_events(|name, params| commands::dispatch(&mut driver, &mut config, name, params));
        driver.tick();

        if driver.is_connected() != was_connected {
            was_connected = driver.is_connected();
            if was_connected {
                info!("remote detected, (re-)starting mouse driver");
            } else {
                info!("remote disconnected, waiting for one to be paired");
            }
        }

        broadcast_state(&socket, &driver, &mut last_buttons);

        let elapsed = tick_start.elapsed();
        if elapsed < TICK_INTERVAL {
            std::thread::sleep(TICK_INTERVAL - elapsed);
        }
    }

    info!("mouse driver stopped");
    Ok(())
}

fn broadcast_state(socket: &ControlSocket, driver: &Driver, last_buttons: &mut Vec<RemoteButton>) {
    for i in 0..4 {
        let spot = driver.ir_spot(i);
        let (valid, x, y) = match spot {
            Some(v) => (1, v.x.round() as i64, v.y.round() as i64),
            None => (0, 0, 0),
        };
        socket.broadcast(&format!("ir:{}:{}:{}:{}", i, valid, x, y));
    }

    match (driver.cluster_left_right(), driver.filtered_left_right()) {
        (Some((l, r)), Some((fl, fr))) => {
            socket.broadcast(&format!(
                "lr:{}:{}:{}:{}",
                l.x.round() as i64,
                l.y.round() as i64,
                r.x.round() as i64,
                r.y.round() as i64
            ));
            socket.broadcast(&format!(
                "flr:{}:{}:{}:{}",
                fl.x.round() as i64,
                fl.y.round() as i64,
                fr.x.round() as i64,
                fr.y.round() as i64
            ));
        }
        _ => {
            socket.broadcast("lr:invalid");
            socket.broadcast("flr:invalid");
        }
    }

    let pressed = driver.pressed_remote_buttons();
    if pressed != *last_buttons {
        let names: Vec<&str> = pressed.iter().map(|b| b.protocol_name()).collect();
        socket.broadcast(&format!("b:{}", names.join(":")));
        *last_buttons = pressed;
    }
}
