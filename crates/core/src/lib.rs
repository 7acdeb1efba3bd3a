//! Auralift core
//!
//! Pure domain model for the media enhancement engine: enhancement settings
//! and their layered resolution, the per-page processing chain, media element
//! tracking, the attachment lifecycle, the control protocol, and the
//! persistence seam. Host integration (real pages, real stores, device
//! probing) lives in `auralift-infra`.

pub mod domain;
