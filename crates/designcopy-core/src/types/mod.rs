//! Core type definitions used across the DesignCopy workspace.

pub mod id;
pub mod kind;

pub use id::*;
pub use kind::DocumentKind;
