//! Key name and character → Windows virtual-key code tables.
//!
//! # What is a virtual-key code? (for beginners)
//!
//! Windows names every key with a number from `<winuser.h>`: `VK_RETURN =
//! 0x0D`, `VK_LEFT = 0x25`, and the letters and digits reuse their uppercase
//! ASCII values (`'A'` is `0x41`, `'7'` is `0x37`).  Printable punctuation
//! lives on the `VK_OEM_*` codes, whose meaning assumes a US keyboard layout.
//!
//! Two lookups are provided:
//!
//! - [`key_name_to_vk`] takes a key *name* as produced by the viewer's
//!   keyboard source (`"Enter"`, `"ArrowLeft"`, `"F5"`, `"a"`).  Names longer
//!   than one character go through the fixed table; a single character falls
//!   back to [`char_to_vk`].
//! - [`char_to_vk`] takes a character and returns the VK code plus whether
//!   Shift must be held to type it on a US layout.

/// A character's key on a US keyboard layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharKey {
    pub vk: u16,
    pub shift: bool,
}

// Frequently referenced codes.
pub const VK_BACK: u16 = 0x08;
pub const VK_TAB: u16 = 0x09;
pub const VK_RETURN: u16 = 0x0D;
pub const VK_SHIFT: u16 = 0x10;
pub const VK_CONTROL: u16 = 0x11;
pub const VK_MENU: u16 = 0x12;
pub const VK_ESCAPE: u16 = 0x1B;
pub const VK_SPACE: u16 = 0x20;
pub const VK_LWIN: u16 = 0x5B;

/// Named (non-character) keys.
const NAMED_KEYS: &[(&str, u16)] = &[
    ("Backspace", VK_BACK),
    ("Tab", VK_TAB),
    ("Enter", VK_RETURN),
    ("Shift", VK_SHIFT),
    ("Control", VK_CONTROL),
    ("Alt", VK_MENU),
    ("Pause", 0x13),
    ("CapsLock", 0x14),
    ("Escape", VK_ESCAPE),
    ("Esc", VK_ESCAPE),
    (" ", VK_SPACE),
    ("Space", VK_SPACE),
    ("Spacebar", VK_SPACE),
    ("PageUp", 0x21),
    ("PageDown", 0x22),
    ("End", 0x23),
    ("Home", 0x24),
    ("ArrowLeft", 0x25),
    ("ArrowUp", 0x26),
    ("ArrowRight", 0x27),
    ("ArrowDown", 0x28),
    ("Left", 0x25),
    ("Up", 0x26),
    ("Right", 0x27),
    ("Down", 0x28),
    ("PrintScreen", 0x2C),
    ("Insert", 0x2D),
    ("Delete", 0x2E),
    ("Del", 0x2E),
    ("Meta", VK_LWIN),
    ("OS", VK_LWIN),
    ("ContextMenu", 0x5D),
    ("F1", 0x70),
    ("F2", 0x71),
    ("F3", 0x72),
    ("F4", 0x73),
    ("F5", 0x74),
    ("F6", 0x75),
    ("F7", 0x76),
    ("F8", 0x77),
    ("F9", 0x78),
    ("F10", 0x79),
    ("F11", 0x7A),
    ("F12", 0x7B),
    ("NumLock", 0x90),
    ("ScrollLock", 0x91),
];

/// Translates a key name into a VK code.
///
/// Returns `None` for names that are neither in the named-key table nor a
/// single mappable character.
pub fn key_name_to_vk(name: &str) -> Option<u16> {
    if let Some(&(_, vk)) = NAMED_KEYS.iter().find(|(n, _)| *n == name) {
        return Some(vk);
    }
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => char_to_vk(c).map(|k| k.vk),
        _ => None,
    }
}

/// Translates a character into its US-layout key and Shift state.
///
/// Returns `None` for characters with no key on a US keyboard (accented
/// letters, symbols outside ASCII, control characters other than tab and
/// newline).  Callers fall back to direct character injection for those.
pub fn char_to_vk(c: char) -> Option<CharKey> {
    let plain = |vk: u16| Some(CharKey { vk, shift: false });
    let shifted = |vk: u16| Some(CharKey { vk, shift: true });

    match c {
        'a'..='z' => plain(c.to_ascii_uppercase() as u16),
        'A'..='Z' => shifted(c as u16),
        '0'..='9' => plain(c as u16),
        ' ' => plain(VK_SPACE),
        '\t' => plain(VK_TAB),
        '\n' | '\r' => plain(VK_RETURN),

        // Shifted digit row
        ')' => shifted(0x30),
        '!' => shifted(0x31),
        '@' => shifted(0x32),
        '#' => shifted(0x33),
        '$' => shifted(0x34),
        '%' => shifted(0x35),
        '^' => shifted(0x36),
        '&' => shifted(0x37),
        '*' => shifted(0x38),
        '(' => shifted(0x39),

        // OEM keys (US layout)
        ';' => plain(0xBA),
        ':' => shifted(0xBA),
        '=' => plain(0xBB),
        '+' => shifted(0xBB),
        ',' => plain(0xBC),
        '<' => shifted(0xBC),
        '-' => plain(0xBD),
        '_' => shifted(0xBD),
        '.' => plain(0xBE),
        '>' => shifted(0xBE),
        '/' => plain(0xBF),
        '?' => shifted(0xBF),
        '`' => plain(0xC0),
        '~' => shifted(0xC0),
        '[' => plain(0xDB),
        '{' => shifted(0xDB),
        '\\' => plain(0xDC),
        '|' => shifted(0xDC),
        ']' => plain(0xDD),
        '}' => shifted(0xDD),
        '\'' => plain(0xDE),
        '"' => shifted(0xDE),

        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_keys_resolve() {
        assert_eq!(key_name_to_vk("Enter"), Some(VK_RETURN));
        assert_eq!(key_name_to_vk("ArrowLeft"), Some(0x25));
        assert_eq!(key_name_to_vk("F12"), Some(0x7B));
        assert_eq!(key_name_to_vk("Escape"), Some(VK_ESCAPE));
    }

    #[test]
    fn test_single_character_falls_back_to_char_table() {
        assert_eq!(key_name_to_vk("a"), Some(0x41));
        assert_eq!(key_name_to_vk("Z"), Some(0x5A));
        assert_eq!(key_name_to_vk("7"), Some(0x37));
        assert_eq!(key_name_to_vk("?"), Some(0xBF));
    }

    #[test]
    fn test_unknown_names_are_unmapped() {
        assert_eq!(key_name_to_vk("AudioVolumeMute"), None);
        assert_eq!(key_name_to_vk("é"), None);
        assert_eq!(key_name_to_vk(""), None);
    }

    #[test]
    fn test_uppercase_letters_need_shift() {
        assert_eq!(char_to_vk('A'), Some(CharKey { vk: 0x41, shift: true }));
        assert_eq!(char_to_vk('a'), Some(CharKey { vk: 0x41, shift: false }));
    }

    #[test]
    fn test_shifted_symbols_share_base_key() {
        assert_eq!(char_to_vk('1').map(|k| k.vk), char_to_vk('!').map(|k| k.vk));
        assert_eq!(char_to_vk(';').map(|k| k.vk), char_to_vk(':').map(|k| k.vk));
        assert!(char_to_vk('"').unwrap().shift);
        assert!(!char_to_vk('\'').unwrap().shift);
    }

    #[test]
    fn test_every_printable_ascii_character_is_mapped() {
        for byte in 0x20u8..0x7F {
            let c = byte as char;
            assert!(char_to_vk(c).is_some(), "no key for {c:?}");
        }
    }

    #[test]
    fn test_non_ascii_is_unmapped() {
        assert_eq!(char_to_vk('ñ'), None);
        assert_eq!(char_to_vk('€'), None);
    }
}
