//! Core data structures representing atomic structures and their graphs.
//!
//! - [`structure`] – Sites, lattices and finite or periodic structures.
//! - [`vocabulary`] – Fixed element vocabularies mapping symbols to indices.
//! - [`graph`] – Directed atom-pair graphs with periodic image offsets.
//!
//! Structures are the raw input; graphs are derived from them by the
//! converters in [`crate::graph`] and never point back to the structure.

pub mod graph;
pub mod structure;
pub mod vocabulary;
