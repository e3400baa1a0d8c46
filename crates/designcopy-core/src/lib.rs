//! # designcopy-core
//!
//! Core crate for DesignCopy. Contains the authoring-engine capability
//! trait, configuration schemas, typed identifiers, the document-kind
//! table, and the unified error system.
//!
//! This crate has **no** internal dependencies on other DesignCopy crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
