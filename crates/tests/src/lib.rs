//! Workspace-level integration tests
//!
//! Unit tests live beside the code they cover; the modules here exercise
//! whole pipelines across crate boundaries.

#[cfg(test)]
mod enhancer_integration;
