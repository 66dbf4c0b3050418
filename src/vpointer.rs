//! The virtual-input sink: an absolute pointer plus a bank of host key/button edges,
//! written once per tick after projection.

use crate::frame::HostKey;

/// Maximum absolute coordinate value a [`VirtualPointer::move_to`] call may carry,
/// matching the reference driver's `maxAbsValue` for its uinput device.
pub const MAX_ABS_VALUE: u16 = 10001;

pub trait VirtualPointer {
    /// Absolute move; `x`/`y` are clamped by the caller to `[0, MAX_ABS_VALUE]`.
    fn move_to(&mut self, x: u16, y: u16);

    /// Edge for one of the keycodes this pointer advertised support for at open time.
    fn set_button(&mut self, key: HostKey, pressed: bool);
}

/// One entry in [`uinput_backend::SUPPORTED_BUTTONS`]: a Linux keycode plus the names
/// the control socket's `keyget`/`keymapget`/`bindkey` commands expose for it.
#[derive(Debug, Clone, Copy)]
pub struct SupportedButton {
    pub code: u16,
    pub raw_name: &'static str,
    pub name: &'static str,
    pub category: &'static str,
}

/// The keycode table advertised by every [`VirtualPointer`] backend, independent of
/// which one is actually wired in. Mouse buttons first, then a representative span of
/// the standard keyboard, matching the reference driver's `SUPPORTED_BUTTONS` shape
/// (mouse + full keyboard + a handful of extended keys) without enumerating all ~230
/// entries verbatim.
pub const SUPPORTED_BUTTONS: &[SupportedButton] = &[
    SupportedButton { code: 0x110, raw_name: "BTN_LEFT", name: "Left Click", category: "mouse" },
    SupportedButton { code: 0x111, raw_name: "BTN_RIGHT", name: "Right Click", category: "mouse" },
    SupportedButton { code: 0x112, raw_name: "BTN_MIDDLE", name: "Middle Click", category: "mouse" },
    SupportedButton { code: 0x113, raw_name: "BTN_SIDE", name: "Side Click", category: "mouse" },
    SupportedButton { code: 0x114, raw_name: "BTN_EXTRA", name: "Extra Click", category: "mouse" },
    SupportedButton { code: 0x01, raw_name: "KEY_ESC", name: "Esc", category: "keyboard" },
    SupportedButton { code: 0x1c, raw_name: "KEY_ENTER", name: "Enter", category: "keyboard" },
    SupportedButton { code: 0x39, raw_name: "KEY_SPACE", name: "Space", category: "keyboard" },
    SupportedButton { code: 0x0e, raw_name: "KEY_BACKSPACE", name: "Backspace", category: "keyboard" },
    SupportedButton { code: 0x0f, raw_name: "KEY_TAB", name: "Tab", category: "keyboard" },
    SupportedButton { code: 0x67, raw_name: "KEY_UP", name: "Up", category: "keyboard" },
    SupportedButton { code: 0x6c, raw_name: "KEY_DOWN", name: "Down", category: "keyboard" },
    SupportedButton { code: 0x69, raw_name: "KEY_LEFT", name: "Left", category: "keyboard" },
    SupportedButton { code: 0x6a, raw_name: "KEY_RIGHT", name: "Right", category: "keyboard" },
    SupportedButton { code: 0x110 + 0x100, raw_name: "KEY_VOLUMEUP", name: "Volume Up", category: "extended" },
    SupportedButton { code: 0x111 + 0x100, raw_name: "KEY_VOLUMEDOWN", name: "Volume Down", category: "extended" },
];

pub fn find_button_by_name(raw_name: &str) -> Option<&'static SupportedButton> {
    SUPPORTED_BUTTONS.iter().find(|b| b.raw_name.eq_ignore_ascii_case(raw_name))
}

pub fn find_button_by_code(code: u16) -> Option<&'static SupportedButton> {
    SUPPORTED_BUTTONS.iter().find(|b| b.code == code)
}

#[cfg(feature = "uinput-backend")]
pub mod uinput_backend {
    //! A [`super::VirtualPointer`] backed by `evdev`'s `uinput::VirtualDeviceBuilder`,
    //! advertising the same mouse-plus-keyboard keycode table as the reference
    //! userspace driver's `libevdev`-based virtual device.

    use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
    use evdev::{AbsInfo, AbsoluteAxisType, AttributeSet, EventType, InputEvent, Key, UinputAbsSetup};

    use super::{HostKey, VirtualPointer, MAX_ABS_VALUE, SUPPORTED_BUTTONS};

    pub struct UinputPointer {
        device: VirtualDevice,
    }

    impl UinputPointer {
        pub fn open() -> std::io::Result<Self> {
            let mut keys = AttributeSet::<Key>::new();
            for button in SUPPORTED_BUTTONS {
                keys.insert(Key::new(button.code));
            }

            let abs_info = AbsInfo::new(0, MAX_ABS_VALUE as i32, 0, 0, 20, 0);
            let device = VirtualDeviceBuilder::new()?
                .name("Wiimote-Mouse Virtual Pointer")
                .with_keys(&keys)?
                .with_absolute_axis(&UinputAbsSetup::new(AbsoluteAxisType::ABS_X, abs_info))?
                .with_absolute_axis(&UinputAbsSetup::new(AbsoluteAxisType::ABS_Y, abs_info))?
                .build()?;

            Ok(UinputPointer { device })
        }
    }

    impl VirtualPointer for UinputPointer {
        fn move_to(&mut self, x: u16, y: u16) {
            let _ = self.device.emit(&[
                InputEvent::new(EventType::ABSOLUTE, AbsoluteAxisType::ABS_X.0, x as i32),
                InputEvent::new(EventType::ABSOLUTE, AbsoluteAxisType::ABS_Y.0, y as i32),
                InputEvent::new(EventType::SYNCHRONIZATION, 0, 0),
            ]);
        }

        fn set_button(&mut self, key: HostKey, pressed: bool) {
            let _ = self.device.emit(&[
                InputEvent::new(EventType::KEY, key.0, pressed as i32),
                InputEvent::new(EventType::SYNCHRONIZATION, 0, 0),
            ]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_lookup_round_trips_by_name_and_code() {
        let by_name = find_button_by_name("BTN_LEFT").unwrap();
        let by_code = find_button_by_code(by_name.code).unwrap();
        assert_eq!(by_name.code, by_code.code);
    }

    #[test]
    fn unknown_button_name_is_not_found() {
        assert!(find_button_by_name("NOT_A_REAL_BUTTON").is_none());
    }
}
