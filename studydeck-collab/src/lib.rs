//! Collaborative term merge service
//!
//! Class members draft sets of terms ("submissions") against a shared
//! study set. This service seeds new attempts from prior submissions,
//! validates and sanitizes submitted drafts, and merges accepted terms
//! into the study set's published, densely-ranked sequence - atomically
//! and correctly under concurrent submission.

pub mod api;
pub mod engine;
pub mod locks;
pub mod sanitize;
pub mod store;

pub use engine::CollabEngine;
pub use studydeck_common::{Error, Result};
