//! Core traits defined in `designcopy-core` and implemented by other crates.

pub mod engine;

pub use engine::{AuthoringEngine, FileReference, PropertySet};
