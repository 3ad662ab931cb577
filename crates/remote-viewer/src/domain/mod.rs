//! Domain layer for remote-viewer.
//!
//! Plain data: the viewer's configuration and the local input events it
//! translates.  No I/O and no runtime types.

pub mod config;
pub mod input;

pub use config::ViewerConfig;
pub use input::LocalInput;
