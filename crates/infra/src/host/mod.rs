//! Host page adapters
//!
//! Concrete implementations of the core page trait. The directory host maps
//! a watched filesystem directory onto the page model: files are media
//! elements, file creation is a mutation event, file metadata is the
//! readiness probe. The device probe supplies the sample rate for the shared
//! processing context.

pub mod dir_page;
pub mod probe;

pub use dir_page::*;
pub use probe::*;
