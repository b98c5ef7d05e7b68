//! Key events as delivered by the host framework.
//!
//! The host reports a raw X11 keysym plus its own modifier bitset. The
//! conversion engine expects a different, X11-style modifier mask, so the
//! translation lives here next to the types it converts between.

use std::fmt;

/// Raw X11 keysym value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Keysym(pub u32);

impl Keysym {
    pub const SPACE: Keysym = Keysym(0x0020);
    pub const BACKSPACE: Keysym = Keysym(0xff08);
    pub const TAB: Keysym = Keysym(0xff09);
    pub const RETURN: Keysym = Keysym(0xff0d);
    pub const ESCAPE: Keysym = Keysym(0xff1b);
    pub const LEFT: Keysym = Keysym(0xff51);
    pub const UP: Keysym = Keysym(0xff52);
    pub const RIGHT: Keysym = Keysym(0xff53);
    pub const DOWN: Keysym = Keysym(0xff54);
    pub const PAGE_UP: Keysym = Keysym(0xff55);
    pub const PAGE_DOWN: Keysym = Keysym(0xff56);
    pub const SHIFT_L: Keysym = Keysym(0xffe1);
    pub const SHIFT_R: Keysym = Keysym(0xffe2);
    pub const CONTROL_L: Keysym = Keysym(0xffe3);
    pub const SUPER_L: Keysym = Keysym(0xffeb);

    pub const KEY_1: Keysym = Keysym(0x0031);
    pub const KEY_9: Keysym = Keysym(0x0039);

    pub const KEY_A: Keysym = Keysym(0x0061);
    pub const KEY_K: Keysym = Keysym(0x006b);

    /// Keysym of the selection digit for a 0-based candidate index
    /// (`0` → `1`, `8` → `9`). Returns `None` past the ninth digit.
    pub fn selection_digit(index: usize) -> Option<Keysym> {
        if index < 9 {
            Some(Keysym(Self::KEY_1.0 + index as u32))
        } else {
            None
        }
    }

    /// Keysym for a printable Latin-1 character (keysym == code point there).
    pub fn from_char(ch: char) -> Option<Keysym> {
        let code = ch as u32;
        if (0x20..=0x7e).contains(&code) || (0xa0..=0xff).contains(&code) {
            Some(Keysym(code))
        } else {
            None
        }
    }

    /// Look up a keysym by its X11 name ("Return", "space", "a", ...).
    pub fn from_name(name: &str) -> Option<Keysym> {
        let sym = match name {
            "space" => Self::SPACE,
            "BackSpace" => Self::BACKSPACE,
            "Tab" => Self::TAB,
            "Return" => Self::RETURN,
            "Escape" => Self::ESCAPE,
            "Left" => Self::LEFT,
            "Up" => Self::UP,
            "Right" => Self::RIGHT,
            "Down" => Self::DOWN,
            "Page_Up" => Self::PAGE_UP,
            "Page_Down" => Self::PAGE_DOWN,
            "Shift_L" => Self::SHIFT_L,
            "Shift_R" => Self::SHIFT_R,
            "Control_L" => Self::CONTROL_L,
            "Super_L" => Self::SUPER_L,
            _ => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => return Self::from_char(ch),
                    _ => return None,
                }
            }
        };
        Some(sym)
    }
}

/// Modifier bitset as the host framework reports it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeyStates(pub u32);

impl KeyStates {
    pub const NONE: KeyStates = KeyStates(0);
    pub const SHIFT: KeyStates = KeyStates(1 << 0);
    pub const CAPS_LOCK: KeyStates = KeyStates(1 << 1);
    pub const CTRL: KeyStates = KeyStates(1 << 2);
    pub const ALT: KeyStates = KeyStates(1 << 3);
    pub const NUM_LOCK: KeyStates = KeyStates(1 << 4);
    pub const SUPER: KeyStates = KeyStates(1 << 26);
    pub const HYPER: KeyStates = KeyStates(1 << 27);

    /// True when every bit of `flag` is set.
    pub fn test(self, flag: KeyStates) -> bool {
        flag.0 != 0 && self.0 & flag.0 == flag.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for KeyStates {
    type Output = KeyStates;

    fn bitor(self, rhs: KeyStates) -> KeyStates {
        KeyStates(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for KeyStates {
    fn bitor_assign(&mut self, rhs: KeyStates) {
        self.0 |= rhs.0;
    }
}

/// Modifier mask bits understood by the conversion engine (X11 layout).
pub mod mask {
    pub const SHIFT: u32 = 1; // ShiftMask
    pub const CONTROL: u32 = 4; // ControlMask
    pub const ALT: u32 = 8; // Mod1Mask
    pub const SUPER: u32 = 64; // Mod4Mask
}

/// Translate host modifier states into the engine's modifier mask.
///
/// Only Shift, Ctrl, Alt and Super are forwarded; lock states and Hyper
/// have no engine counterpart and are dropped.
pub fn backend_modifier_mask(states: KeyStates) -> u32 {
    let mut state = 0;
    if states.test(KeyStates::SHIFT) {
        state |= mask::SHIFT;
    }
    if states.test(KeyStates::CTRL) {
        state |= mask::CONTROL;
    }
    if states.test(KeyStates::ALT) {
        state |= mask::ALT;
    }
    if states.test(KeyStates::SUPER) {
        state |= mask::SUPER;
    }
    state
}

/// A keysym together with the modifiers held while it was pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    pub sym: Keysym,
    pub states: KeyStates,
}

impl Key {
    pub fn new(sym: Keysym, states: KeyStates) -> Self {
        Self { sym, states }
    }

    /// Parse a space separated key list such as `"1 2 3 4 5 6 7 8 9"`.
    /// Unknown names are skipped.
    pub fn parse_list(spec: &str) -> Vec<Key> {
        spec.split_whitespace()
            .filter_map(Keysym::from_name)
            .map(|sym| Key::new(sym, KeyStates::NONE))
            .collect()
    }
}

impl From<Keysym> for Key {
    fn from(sym: Keysym) -> Self {
        Key::new(sym, KeyStates::NONE)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match char::from_u32(self.sym.0).filter(|c| !c.is_control() && self.sym.0 < 0x100) {
            Some(ch) => write!(f, "{}", ch),
            None => write!(f, "0x{:04x}", self.sym.0),
        }
    }
}

/// A key press or release travelling through the input method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    key: Key,
    is_release: bool,
    filtered: bool,
    accepted: bool,
}

impl KeyEvent {
    pub fn press(key: impl Into<Key>) -> Self {
        Self::new(key.into(), false)
    }

    pub fn release(key: impl Into<Key>) -> Self {
        Self::new(key.into(), true)
    }

    pub fn new(key: Key, is_release: bool) -> Self {
        Self {
            key,
            is_release,
            filtered: false,
            accepted: false,
        }
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn is_release(&self) -> bool {
        self.is_release
    }

    /// Mark the event as handled; the host must not forward it further.
    pub fn filter_and_accept(&mut self) {
        self.filtered = true;
        self.accepted = true;
    }

    pub fn filtered(&self) -> bool {
        self.filtered
    }

    pub fn accepted(&self) -> bool {
        self.accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_mask_table() {
        assert_eq!(backend_modifier_mask(KeyStates::NONE), 0);
        assert_eq!(backend_modifier_mask(KeyStates::SHIFT), 1);
        assert_eq!(backend_modifier_mask(KeyStates::CTRL), 4);
        assert_eq!(backend_modifier_mask(KeyStates::ALT), 8);
        assert_eq!(backend_modifier_mask(KeyStates::SUPER), 64);
        assert_eq!(
            backend_modifier_mask(KeyStates::SHIFT | KeyStates::CTRL | KeyStates::ALT | KeyStates::SUPER),
            1 | 4 | 8 | 64
        );
    }

    #[test]
    fn test_lock_states_are_dropped() {
        let states = KeyStates::CAPS_LOCK | KeyStates::NUM_LOCK | KeyStates::HYPER;
        assert_eq!(backend_modifier_mask(states), 0);
        assert_eq!(backend_modifier_mask(states | KeyStates::SHIFT), mask::SHIFT);
    }

    #[test]
    fn test_selection_digit() {
        assert_eq!(Keysym::selection_digit(0), Some(Keysym::KEY_1));
        assert_eq!(Keysym::selection_digit(2), Some(Keysym(0x33)));
        assert_eq!(Keysym::selection_digit(8), Some(Keysym::KEY_9));
        assert_eq!(Keysym::selection_digit(9), None);
    }

    #[test]
    fn test_parse_key_list() {
        let keys = Key::parse_list("1 2 3 4 5 6 7 8 9");
        assert_eq!(keys.len(), 9);
        assert_eq!(keys[0].sym, Keysym::KEY_1);
        assert_eq!(keys[8].sym, Keysym::KEY_9);
        assert!(keys.iter().all(|k| k.states.is_empty()));
    }

    #[test]
    fn test_key_names() {
        assert_eq!(Keysym::from_name("Return"), Some(Keysym::RETURN));
        assert_eq!(Keysym::from_name("a"), Some(Keysym::KEY_A));
        assert_eq!(Keysym::from_name("あ"), None);
        assert_eq!(Keysym::from_name("NoSuchKey"), None);
    }

    #[test]
    fn test_filter_and_accept() {
        let mut event = KeyEvent::press(Keysym::KEY_A);
        assert!(!event.filtered());
        assert!(!event.is_release());
        event.filter_and_accept();
        assert!(event.filtered());
        assert!(event.accepted());
    }
}
