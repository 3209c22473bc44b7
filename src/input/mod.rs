//! The OS-injection seam: resolved keyboard/pointer/clipboard actions are
//! handed to an [`Injector`]. A real backend (uinput, CoreGraphics, ...) is
//! out of scope; [`LoggingInjector`] does the keysym lookup/validation a
//! real backend would and logs the result instead of touching a device.

mod logging;

pub use logging::LoggingInjector;

use anyhow::Result;
use async_trait::async_trait;

/// OS-level input actions a session's event multiplexer can request.
#[async_trait]
pub trait Injector: Send + Sync {
    async fn move_cursor(&self, x: u16, y: u16) -> Result<()>;

    /// `chord` is the ordered set of keysyms currently held down, already
    /// resolved through [`keysym_name`]; unknown keysyms have been dropped
    /// by the caller before this is invoked.
    async fn key_tap(&self, chord: &[u32]) -> Result<()>;

    /// Apply the button/wheel state from a `PointerEvent`'s bitmask, already
    /// decoded through [`decode_button_mask`].
    async fn set_buttons(&self, buttons: &ButtonState) -> Result<()>;

    async fn write_clipboard(&self, text: &str) -> Result<()>;
}

/// Decoded button/wheel state from a `PointerEvent` bitmask: bit 0=left,
/// 1=middle, 2=right, 3=wheel up, 4=wheel down, 5=wheel left, 6=wheel right.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    pub left: bool,
    pub middle: bool,
    pub right: bool,
    pub wheel_up: bool,
    pub wheel_down: bool,
    pub wheel_left: bool,
    pub wheel_right: bool,
}

/// Decode a `PointerEvent` button mask per the bit table above.
pub fn decode_button_mask(mask: u8) -> ButtonState {
    ButtonState {
        left: mask & 0x01 != 0,
        middle: mask & 0x02 != 0,
        right: mask & 0x04 != 0,
        wheel_up: mask & 0x08 != 0,
        wheel_down: mask & 0x10 != 0,
        wheel_left: mask & 0x20 != 0,
        wheel_right: mask & 0x40 != 0,
    }
}

/// Map an X11 keysym to a stable name, or `None` if unrecognised. A static
/// table, not a lookup structure — the keysym space is fixed and small
/// enough that a match compiles to a dense jump table.
pub fn keysym_name(keysym: u32) -> Option<&'static str> {
    let name = match keysym {
        // TTY function keys
        0xff08 => "Backspace",
        0xff09 => "Tab",
        0xff0d => "Return",
        0xff1b => "Escape",
        0xffff => "Delete",

        // Cursor control
        0xff50 => "Home",
        0xff51 => "Left",
        0xff52 => "Up",
        0xff53 => "Right",
        0xff54 => "Down",
        0xff55 => "PageUp",
        0xff56 => "PageDown",
        0xff57 => "End",
        0xff63 => "Insert",

        // Function keys
        0xffbe => "F1",
        0xffbf => "F2",
        0xffc0 => "F3",
        0xffc1 => "F4",
        0xffc2 => "F5",
        0xffc3 => "F6",
        0xffc4 => "F7",
        0xffc5 => "F8",
        0xffc6 => "F9",
        0xffc7 => "F10",
        0xffc8 => "F11",
        0xffc9 => "F12",

        // Modifier keys
        0xffe1 => "ShiftLeft",
        0xffe2 => "ShiftRight",
        0xffe3 => "ControlLeft",
        0xffe4 => "ControlRight",
        0xffe5 => "CapsLock",
        0xffe9 => "AltLeft",
        0xffea => "AltRight",
        0xffeb => "SuperLeft",
        0xffec => "SuperRight",

        // Space
        0x0020 => "Space",

        // Digits 0-9
        0x0030 => "0",
        0x0031 => "1",
        0x0032 => "2",
        0x0033 => "3",
        0x0034 => "4",
        0x0035 => "5",
        0x0036 => "6",
        0x0037 => "7",
        0x0038 => "8",
        0x0039 => "9",

        // Lowercase letters
        0x0061 => "a",
        0x0062 => "b",
        0x0063 => "c",
        0x0064 => "d",
        0x0065 => "e",
        0x0066 => "f",
        0x0067 => "g",
        0x0068 => "h",
        0x0069 => "i",
        0x006a => "j",
        0x006b => "k",
        0x006c => "l",
        0x006d => "m",
        0x006e => "n",
        0x006f => "o",
        0x0070 => "p",
        0x0071 => "q",
        0x0072 => "r",
        0x0073 => "s",
        0x0074 => "t",
        0x0075 => "u",
        0x0076 => "v",
        0x0077 => "w",
        0x0078 => "x",
        0x0079 => "y",
        0x007a => "z",

        // Uppercase letters — same physical key, shift is a separate held keysym.
        0x0041 => "a",
        0x0042 => "b",
        0x0043 => "c",
        0x0044 => "d",
        0x0045 => "e",
        0x0046 => "f",
        0x0047 => "g",
        0x0048 => "h",
        0x0049 => "i",
        0x004a => "j",
        0x004b => "k",
        0x004c => "l",
        0x004d => "m",
        0x004e => "n",
        0x004f => "o",
        0x0050 => "p",
        0x0051 => "q",
        0x0052 => "r",
        0x0053 => "s",
        0x0054 => "t",
        0x0055 => "u",
        0x0056 => "v",
        0x0057 => "w",
        0x0058 => "x",
        0x0059 => "y",
        0x005a => "z",

        // Punctuation
        0x002c => "Comma",
        0x002e => "Period",
        0x002f => "Slash",
        0x003b => "Semicolon",
        0x0027 => "Apostrophe",
        0x005b => "BracketLeft",
        0x005d => "BracketRight",
        0x005c => "Backslash",
        0x002d => "Minus",
        0x003d => "Equal",
        0x0060 => "Grave",

        _ => return None,
    };
    Some(name)
}
