//! pk-core: shared types, IDs, errors, and configuration.
//!
//! This crate is the foundational dependency for the other pk-* crates,
//! providing the deterministic [`MovieId`], a unified error type, the
//! catalog data model, filename parsing, and application configuration.

pub mod config;
pub mod error;
pub mod ids;
pub mod media;
pub mod paths;
pub mod title;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::MovieId;
pub use media::*;
pub use title::{parse_path, parse_title, ParsedTitle};
