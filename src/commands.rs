//! Control-socket command dispatch: translates a parsed `name[:arg1[:arg2…]]` line
//! into a call against the live [`Driver`] plus a write-through to the [`Config`]
//! store, and renders the `OK`/`ERROR:<reason>` reply line.
//!
//! Grounded on the giant `command ==` dispatch chain in the original driver's
//! `processEvents` callback; split out of the socket transport itself
//! ([`crate::control_socket`]) the same way the pipeline stages are split from the
//! frame contract that carries them.

use crate::config::Config;
use crate::driver::Driver;
use crate::error::CommandError;
use crate::frame::{HostKey, RemoteButton, Vec3};
use crate::vpointer::{find_button_by_code, find_button_by_name, SUPPORTED_BUTTONS};

/// Dispatch one command, returning the literal reply line (without a trailing
/// newline; [`crate::control_socket::ControlSocket::process_events`] appends one).
pub fn dispatch(driver: &mut Driver, config: &mut Config, name: &str, params: &[String]) -> String {
    let result = match name {
        "mouse" => cmd_mouse(driver, params),
        "cal100" => cmd_cal100(driver, config, params),
        "getscreenarea100" => Ok(cmd_get_screen_area(driver)),
        "screenarea100" => cmd_screen_area(driver, config, params),
        "keycount" => Ok(format!("OK:{}", SUPPORTED_BUTTONS.len())),
        "keyget" => cmd_keyget(params),
        "keymapget" => Ok(cmd_keymapget(driver)),
        "bindkey" => cmd_bindkey(driver, config, params),
        "irdist100" => cmd_irdist100(driver, config, params),
        "calibration" => cmd_calibration(driver, params),
        "getsmoothing100" => Ok(cmd_get_smoothing(driver)),
        "setsmoothing100" => cmd_set_smoothing(driver, config, params),
        _ => Err(CommandError::UnknownCommand),
    };
    match result {
        Ok(reply) => reply,
        Err(err) => err.reply(),
    }
}

fn write_config(config: &Config) -> Result<(), CommandError> {
    config.write().map_err(|e| CommandError::Other(e.to_string()))
}

fn parse_scaled(s: &str, scale: f64) -> Result<f64, CommandError> {
    s.parse::<i64>().map(|v| v as f64 / scale).map_err(|_| CommandError::InvalidParameter)
}

fn parse_remote_button(name: &str) -> Option<RemoteButton> {
    RemoteButton::ALL
        .into_iter()
        .find(|b| b.protocol_name() == name)
        .or_else(|| RemoteButton::from_readable_name(name))
}

fn cmd_mouse(driver: &mut Driver, params: &[String]) -> Result<String, CommandError> {
    if params.len() != 1 {
        return Err(CommandError::InvalidParameterCount);
    }
    match params[0].as_str() {
        "on" => {
            driver.mouse_enabled = true;
            Ok("OK".to_string())
        }
        "off" => {
            driver.mouse_enabled = false;
            Ok("OK".to_string())
        }
        _ => Err(CommandError::InvalidParameter),
    }
}

fn cmd_cal100(driver: &mut Driver, config: &mut Config, params: &[String]) -> Result<String, CommandError> {
    if params.len() != 6 {
        return Err(CommandError::InvalidParameterCount);
    }
    let mut v = [0.0f64; 6];
    for (i, p) in params.iter().enumerate() {
        v[i] = parse_scaled(p, 100.0)?;
    }
    let x = Vec3::new(v[0], v[1], v[2]);
    let y = Vec3::new(v[3], v[4], v[5]);
    driver.set_calibration_vectors(x, y);
    config.set_vector("calmatx", x);
    config.set_vector("calmaty", y);
    write_config(config)?;
    Ok("OK".to_string())
}

fn cmd_get_screen_area(driver: &Driver) -> String {
    let area = driver.screen_area();
    format!(
        "OK:{}:{}:{}:{}",
        (area.top_left.x * 100.0).round() as i64,
        (area.top_left.y * 100.0).round() as i64,
        (area.bottom_right.x * 100.0).round() as i64,
        (area.bottom_right.y * 100.0).round() as i64,
    )
}

fn cmd_screen_area(driver: &mut Driver, config: &mut Config, params: &[String]) -> Result<String, CommandError> {
    if params.len() != 4 {
        return Err(CommandError::InvalidParameterCount);
    }
    let mut v = [0.0f64; 4];
    for (i, p) in params.iter().enumerate() {
        v[i] = parse_scaled(p, 100.0)?;
    }
    driver.set_screen_area(v[0], v[1], v[2], v[3]);
    let area = driver.screen_area();
    config.set_vector("screen_top_left", area.top_left);
    config.set_vector("screen_bottom_right", area.bottom_right);
    write_config(config)?;
    Ok("OK".to_string())
}

fn cmd_keyget(params: &[String]) -> Result<String, CommandError> {
    if params.len() != 1 {
        return Err(CommandError::Other("single key index expected".to_string()));
    }
    let index: usize =
        params[0].parse().map_err(|_| CommandError::Other("invalid index".to_string()))?;
    let key = SUPPORTED_BUTTONS
        .get(index)
        .ok_or_else(|| CommandError::Other("out of bounds".to_string()))?;
    Ok(format!("OK:{}:{}:{}", key.raw_name, key.name, key.category))
}

/// `<btn-proto>:<ir01>:<keyname>:` repeated for every currently-bound
/// `(button, ir_visible)` pair, trailing colon stripped (a join of triples already
/// places colons only between fields).
fn cmd_keymapget(driver: &Driver) -> String {
    let mut parts = vec!["OK".to_string()];
    for button in RemoteButton::ALL {
        for ir_visible in [true, false] {
            let Some(key) = driver.mapped_keys(button, ir_visible).first() else { continue };
            let Some(supported) = find_button_by_code(key.0) else { continue };
            parts.push(button.protocol_name().to_string());
            parts.push(if ir_visible { "1" } else { "0" }.to_string());
            parts.push(supported.raw_name.to_string());
        }
    }
    parts.join(":")
}

fn cmd_bindkey(driver: &mut Driver, config: &mut Config, params: &[String]) -> Result<String, CommandError> {
    if params.len() != 3 {
        return Err(CommandError::InvalidParameterCount);
    }
    let button = parse_remote_button(&params[0])
        .ok_or_else(|| CommandError::Other("invalid wii button".to_string()))?;
    let ir_visible = match params[1].as_str() {
        "0" => false,
        "1" => true,
        _ => return Err(CommandError::Other("invalid ir value".to_string())),
    };
    let key_name = params[2].trim();
    let key = if key_name.is_empty() {
        None
    } else {
        Some(
            find_button_by_name(key_name)
                .ok_or_else(|| CommandError::Other("invalid key binding".to_string()))?
                .code,
        )
    };
    driver.map_button(button, ir_visible, key.map(HostKey));
    config.set_string(button.config_key(ir_visible), key_name);
    write_config(config)?;
    Ok("OK".to_string())
}

fn cmd_irdist100(driver: &mut Driver, config: &mut Config, params: &[String]) -> Result<String, CommandError> {
    if params.len() != 1 {
        return Err(CommandError::InvalidParameterCount);
    }
    let raw: i64 = params[0].parse().map_err(|_| CommandError::InvalidParameter)?;
    if raw < 0 {
        return Err(CommandError::InvalidParameter);
    }
    driver.set_default_ir_distance(raw as f64 / 100.0);
    config.set_string("default_ir_distance", params[0].clone());
    write_config(config)?;
    Ok("OK".to_string())
}

/// Toggles point-collapse and the smoother off for a clean calibration signal. The
/// original driver leaves this command unacknowledged; this crate replies `OK` since
/// every other command in the protocol does.
fn cmd_calibration(driver: &mut Driver, params: &[String]) -> Result<String, CommandError> {
    if params.len() != 1 {
        return Err(CommandError::InvalidParameterCount);
    }
    let on = match params[0].as_str() {
        "on" => true,
        "off" => false,
        _ => return Err(CommandError::InvalidParameter),
    };
    driver.set_calibration_mode(on);
    Ok("OK".to_string())
}

fn cmd_get_smoothing(driver: &Driver) -> String {
    let (clicked, released, freeze) = driver.smoothing_factors();
    format!(
        "OK:{}:{}:{}",
        (clicked.log10() * 100.0).round() as i64,
        (released.log10() * 100.0).round() as i64,
        (freeze * 100_000.0).round() as i64,
    )
}

fn cmd_set_smoothing(driver: &mut Driver, config: &mut Config, params: &[String]) -> Result<String, CommandError> {
    if params.len() != 3 {
        return Err(CommandError::InvalidParameterCount);
    }
    let clicked100: i64 = params[0].parse().map_err(|_| CommandError::InvalidParameter)?;
    let released100: i64 = params[1].parse().map_err(|_| CommandError::InvalidParameter)?;
    let freeze100000: i64 = params[2].parse().map_err(|_| CommandError::InvalidParameter)?;

    if freeze100000 < 0 {
        return Err(CommandError::Other("click freeze negative".to_string()));
    }
    if clicked100 > 0 || released100 > 0 {
        return Err(CommandError::Other("log smoothing factors larger than 0".to_string()));
    }

    let log_clicked = clicked100 as f64 / 100.0;
    let log_released = released100 as f64 / 100.0;
    let freeze = freeze100000 as f64 / 100_000.0;

    driver.set_smoothing_factors(10f64.powf(log_clicked), 10f64.powf(log_released), freeze);
    config.set_vector(
        "smoothing_clicked_released_delay",
        Vec3::new(log_clicked, log_released, freeze),
    );
    write_config(config)?;
    Ok("OK".to_string())
}

/// Seed `config` with the driver's built-in defaults (first run only, via
/// [`Config::provide_default`]), then push whatever ends up in `config` — defaults or
/// values loaded from disk — back onto `driver`. Called once at startup and again
/// every time a remote reconnects, matching the original driver's
/// `applyDeviceConfigurations`.
pub fn apply_device_configuration(driver: &mut Driver, config: &mut Config) {
    let (cal_x, cal_y) = driver.calibration_vectors();
    config.provide_default("calmatx", &format!("{}/1,{}/1,{}/1", cal_x.x as i64, cal_x.y as i64, cal_x.z as i64));
    config.provide_default("calmaty", &format!("{}/1,{}/1,{}/1", cal_y.x as i64, cal_y.y as i64, cal_y.z as i64));
    config.provide_default("screen_top_left", "0/1,0/1,0/1");
    config.provide_default("screen_bottom_right", "10000/1,10000/1,0/1");
    config.provide_default("default_ir_distance", &format!("{}", (driver.default_ir_distance() * 100.0) as i64));

    let (clicked, released, freeze) = driver.smoothing_factors();
    config.provide_default(
        "smoothing_clicked_released_delay",
        &format!("{}/1,{}/1,{}/1", clicked.log10() as i64, released.log10() as i64, freeze as i64),
    );

    for button in RemoteButton::ALL {
        for ir_visible in [true, false] {
            let default_name = driver
                .mapped_keys(button, ir_visible)
                .first()
                .and_then(|k| find_button_by_code(k.0))
                .map(|b| b.raw_name)
                .unwrap_or("");
            config.provide_default(&button.config_key(ir_visible), default_name);
        }
    }

    if let (Some(&cal_x), Some(&cal_y)) = (config.vectors.get("calmatx"), config.vectors.get("calmaty")) {
        driver.set_calibration_vectors(cal_x, cal_y);
    }
    if let (Some(&tl), Some(&br)) =
        (config.vectors.get("screen_top_left"), config.vectors.get("screen_bottom_right"))
    {
        driver.set_screen_area(tl.x, tl.y, br.x, br.y);
    }
    if let Some(&smoothing) = config.vectors.get("smoothing_clicked_released_delay") {
        driver.set_smoothing_factors(
            10f64.powf(smoothing.x),
            10f64.powf(smoothing.y),
            smoothing.z,
        );
    }
    if let Some(raw) = config.strings.get("default_ir_distance") {
        if let Ok(distance) = raw.parse::<i64>() {
            driver.set_default_ir_distance(distance as f64 / 100.0);
        }
    }

    for button in RemoteButton::ALL {
        for ir_visible in [true, false] {
            let Some(key_name) = config.strings.get(&button.config_key(ir_visible)) else { continue };
            if key_name.is_empty() {
                driver.map_button(button, ir_visible, None);
                continue;
            }
            match find_button_by_name(key_name) {
                Some(supported) => driver.map_button(button, ir_visible, Some(HostKey(supported.code))),
                None => tracing::warn!(key_name, "ignoring invalid mapped button in configuration"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Driver;
    use crate::remote::{RemoteMonitor, RemotePath, RemoteSource};
    use crate::vpointer::VirtualPointer;

    struct NullMonitor;
    impl RemoteMonitor for NullMonitor {
        fn poll(&mut self) -> Vec<RemotePath> {
            Vec::new()
        }
        fn open(&mut self, _path: RemotePath) -> Result<Box<dyn RemoteSource>, crate::error::RemoteError> {
            unreachable!()
        }
    }

    struct NullPointer;
    impl VirtualPointer for NullPointer {
        fn move_to(&mut self, _x: u16, _y: u16) {}
        fn set_button(&mut self, _key: HostKey, _pressed: bool) {}
    }

    fn test_driver() -> Driver {
        Driver::new(Box::new(NullMonitor), Box::new(NullPointer))
    }

    #[test]
    fn mouse_command_toggles_enabled_flag() {
        let mut driver = test_driver();
        let mut config = Config::new("unused.conf");
        assert_eq!(dispatch(&mut driver, &mut config, "mouse", &["off".to_string()]), "OK");
        assert!(!driver.mouse_enabled);
        assert_eq!(dispatch(&mut driver, &mut config, "mouse", &["on".to_string()]), "OK");
        assert!(driver.mouse_enabled);
    }

    #[test]
    fn mouse_command_rejects_bad_parameter() {
        let mut driver = test_driver();
        let mut config = Config::new("unused.conf");
        let reply = dispatch(&mut driver, &mut config, "mouse", &["sideways".to_string()]);
        assert_eq!(reply, "ERROR:invalid parameter");
    }

    #[test]
    fn unknown_command_is_an_error() {
        let mut driver = test_driver();
        let mut config = Config::new("unused.conf");
        let reply = dispatch(&mut driver, &mut config, "not-a-command", &[]);
        assert_eq!(reply, "ERROR:unknown command");
    }

    #[test]
    fn keycount_reports_supported_button_count() {
        let mut driver = test_driver();
        let mut config = Config::new("unused.conf");
        let reply = dispatch(&mut driver, &mut config, "keycount", &[]);
        assert_eq!(reply, format!("OK:{}", SUPPORTED_BUTTONS.len()));
    }

    #[test]
    fn bindkey_then_keymapget_round_trips() {
        let mut driver = test_driver();
        let mut config = Config::new("unused.conf");
        let reply = dispatch(
            &mut driver,
            &mut config,
            "bindkey",
            &["a".to_string(), "1".to_string(), "BTN_LEFT".to_string()],
        );
        assert_eq!(reply, "OK");
        let mapped = cmd_keymapget(&driver);
        assert!(mapped.contains("a:1:BTN_LEFT"));
    }

    #[test]
    fn setsmoothing_rejects_positive_log_values() {
        let mut driver = test_driver();
        let mut config = Config::new("unused.conf");
        let reply = dispatch(
            &mut driver,
            &mut config,
            "setsmoothing100",
            &["10".to_string(), "-50".to_string(), "0".to_string()],
        );
        assert!(reply.starts_with("ERROR:"));
    }

    #[test]
    fn getscreenarea_reflects_screenarea_update() {
        let mut driver = test_driver();
        let mut config = Config::new("unused.conf");
        let reply = dispatch(
            &mut driver,
            &mut config,
            "screenarea100",
            &["0".to_string(), "0".to_string(), "500000".to_string(), "500000".to_string()],
        );
        assert_eq!(reply, "OK");
        let reply = dispatch(&mut driver, &mut config, "getscreenarea100", &[]);
        assert_eq!(reply, "OK:0:0:500000:500000");
    }
}
