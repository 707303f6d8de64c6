//! Data models shared by the evaluator, the I/O layer and the simulation engine.
//!
//! - [`structure`] - The external structural representation: site labels, positions,
//!   lattice vectors, periodicity and auxiliary metadata.
//! - [`species`] - Chemical labels and the reserved vacancy placeholder.

pub mod species;
pub mod structure;
