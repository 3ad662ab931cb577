//! Infrastructure layer of the viewer: the file renderer and the stdin
//! operator console used by the headless binary.

pub mod console;
pub mod renderer;
