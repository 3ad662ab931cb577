//! Domain layer: pure business rules with no I/O.

pub mod backoff;
pub mod canvas;
pub mod frame;
pub mod input;
pub mod session;
