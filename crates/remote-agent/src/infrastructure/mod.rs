//! Infrastructure layer of the agent.
//!
//! **Dependency rule**: this layer may depend on `application`, `remote_core`
//! and `remote_link`, but MUST NOT be imported by the `application` layer
//! outside of tests.
//!
//! - **`input_emulation`** – `PlatformInputEmulator` implementations
//!   (SendInput, XTest, mock).
//! - **`screen_capture`** – `ScreenGrabber` implementations (GDI, Xlib, mock).
//! - **`encoder`** – JPEG `FrameEncoder` on top of the `image` crate.
//! - **`storage`** – TOML configuration file.
//! - **`resume`** – Suspend/resume watcher feeding the link's reconnect.

pub mod encoder;
pub mod input_emulation;
pub mod resume;
pub mod screen_capture;
pub mod storage;
