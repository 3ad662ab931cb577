//! Key translation tables.
//!
//! Windows virtual-key (VK) codes are the canonical key identity carried in
//! `uem_remote_action` messages.  The viewer translates its local key names
//! into VK codes; a Linux agent translates VK codes into X11 KeySyms.

pub mod virtual_keys;
pub mod x11;

pub use virtual_keys::{char_to_vk, key_name_to_vk, CharKey};
pub use x11::{char_to_keysym, vk_to_keysym};
