//! Auralift infrastructure
//!
//! Host-facing adapters behind the core seams: the watched-directory page
//! host, the output-device sample-rate probe, the JSON-file settings store,
//! and the store-file change watcher.

pub mod host;
pub mod store;
