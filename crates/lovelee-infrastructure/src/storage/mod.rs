//! File-backed persistence primitives.

mod atomic_file;

pub use atomic_file::{AtomicFile, FileFormat};
