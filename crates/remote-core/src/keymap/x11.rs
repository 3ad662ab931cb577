//! Windows VK code → X11 KeySym table for Linux agents.
//!
//! X11 KeySyms are defined in `X11/keysymdef.h`.  Letters map to their
//! lowercase KeySym (`XK_a = 0x61`); the injector adds Shift itself when the
//! command asks for it.  Characters without a VK code are injected through
//! [`char_to_keysym`] instead.

/// Translates a VK code to an X11 KeySym.
pub fn vk_to_keysym(vk: u16) -> Option<u32> {
    let keysym = match vk {
        // Letters and digits
        0x41..=0x5A => u32::from(vk) + 0x20, // XK_a..XK_z
        0x30..=0x39 => u32::from(vk),        // XK_0..XK_9

        0x08 => 0xFF08, // XK_BackSpace
        0x09 => 0xFF09, // XK_Tab
        0x0D => 0xFF0D, // XK_Return
        0x10 => 0xFFE1, // XK_Shift_L
        0x11 => 0xFFE3, // XK_Control_L
        0x12 => 0xFFE9, // XK_Alt_L
        0x13 => 0xFF13, // XK_Pause
        0x14 => 0xFFE5, // XK_Caps_Lock
        0x1B => 0xFF1B, // XK_Escape
        0x20 => 0x0020, // XK_space
        0x21 => 0xFF55, // XK_Prior
        0x22 => 0xFF56, // XK_Next
        0x23 => 0xFF57, // XK_End
        0x24 => 0xFF50, // XK_Home
        0x25 => 0xFF51, // XK_Left
        0x26 => 0xFF52, // XK_Up
        0x27 => 0xFF53, // XK_Right
        0x28 => 0xFF54, // XK_Down
        0x2C => 0xFF61, // XK_Print
        0x2D => 0xFF63, // XK_Insert
        0x2E => 0xFFFF, // XK_Delete
        0x5B => 0xFFEB, // XK_Super_L
        0x5C => 0xFFEC, // XK_Super_R
        0x5D => 0xFF67, // XK_Menu

        // F1..F12
        0x70..=0x7B => 0xFFBE + u32::from(vk - 0x70),

        0x90 => 0xFF7F, // XK_Num_Lock
        0x91 => 0xFF14, // XK_Scroll_Lock
        0xA0 => 0xFFE1, // XK_Shift_L
        0xA1 => 0xFFE2, // XK_Shift_R
        0xA2 => 0xFFE3, // XK_Control_L
        0xA3 => 0xFFE4, // XK_Control_R
        0xA4 => 0xFFE9, // XK_Alt_L
        0xA5 => 0xFFEA, // XK_Alt_R

        // OEM punctuation (US layout base characters)
        0xBA => 0x003B, // semicolon
        0xBB => 0x003D, // equal
        0xBC => 0x002C, // comma
        0xBD => 0x002D, // minus
        0xBE => 0x002E, // period
        0xBF => 0x002F, // slash
        0xC0 => 0x0060, // grave
        0xDB => 0x005B, // bracketleft
        0xDC => 0x005C, // backslash
        0xDD => 0x005D, // bracketright
        0xDE => 0x0027, // apostrophe

        _ => return None,
    };
    Some(keysym)
}

/// KeySym for a character with no VK code.
///
/// Latin-1 characters use their code point; everything else uses the
/// Unicode KeySym range (`0x0100_0000 + code point`).
pub fn char_to_keysym(c: char) -> u32 {
    let cp = c as u32;
    if (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) {
        cp
    } else {
        0x0100_0000 + cp
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::virtual_keys::{char_to_vk, key_name_to_vk};

    #[test]
    fn test_letters_map_to_lowercase_keysyms() {
        assert_eq!(vk_to_keysym(0x41), Some(0x61));
        assert_eq!(vk_to_keysym(0x5A), Some(0x7A));
    }

    #[test]
    fn test_function_keys_are_contiguous() {
        assert_eq!(vk_to_keysym(0x70), Some(0xFFBE));
        assert_eq!(vk_to_keysym(0x7B), Some(0xFFC9));
    }

    #[test]
    fn test_named_keys_all_have_keysyms() {
        for name in ["Enter", "Escape", "Tab", "Backspace", "ArrowUp", "Delete", "Home", "F5"] {
            let vk = key_name_to_vk(name).unwrap();
            assert!(vk_to_keysym(vk).is_some(), "no keysym for {name}");
        }
    }

    #[test]
    fn test_every_printable_ascii_key_has_a_keysym() {
        for byte in 0x20u8..0x7F {
            let key = char_to_vk(byte as char).unwrap();
            assert!(vk_to_keysym(key.vk).is_some(), "no keysym for {:?}", byte as char);
        }
    }

    #[test]
    fn test_unknown_vk_is_unmapped() {
        assert_eq!(vk_to_keysym(0xFF), None);
    }

    #[test]
    fn test_char_to_keysym_uses_unicode_range_beyond_latin1() {
        assert_eq!(char_to_keysym('é'), 0xE9);
        assert_eq!(char_to_keysym('€'), 0x0100_20AC);
    }
}
