//! Platform-specific input emulation implementations.
//!
//! The native implementation is selected at compile time.  Linux needs the
//! `x11` feature; without it the agent has no native injector and
//! [`native_emulator`] reports that at startup.

use std::sync::Arc;

use crate::application::inject_input::{InjectionError, PlatformInputEmulator};

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(all(target_os = "linux", feature = "x11"))]
pub mod linux;

/// Creates the input emulator for this platform.
///
/// # Errors
///
/// [`InjectionError::Platform`] when the platform API cannot be initialised
/// or this build has no native backend.
#[cfg(target_os = "windows")]
pub fn native_emulator() -> Result<Arc<dyn PlatformInputEmulator>, InjectionError> {
    Ok(Arc::new(windows::WindowsInputEmulator::new()))
}

#[cfg(all(target_os = "linux", feature = "x11"))]
pub fn native_emulator() -> Result<Arc<dyn PlatformInputEmulator>, InjectionError> {
    Ok(Arc::new(linux::LinuxXTestEmulator::new()?))
}

#[cfg(not(any(target_os = "windows", all(target_os = "linux", feature = "x11"))))]
pub fn native_emulator() -> Result<Arc<dyn PlatformInputEmulator>, InjectionError> {
    Err(InjectionError::Platform(
        "no native input backend in this build (on Linux, enable the `x11` feature)".into(),
    ))
}
