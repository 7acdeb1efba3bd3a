//! Settings store backends
//!
//! The JSON-file store persists the flat settings-record map between runs;
//! the store watcher lets a running daemon observe writes made to the same
//! file by other processes.

pub mod file;
pub mod watcher;

pub use file::*;
pub use watcher::*;
