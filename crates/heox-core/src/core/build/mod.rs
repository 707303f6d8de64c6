//! Generation of starting configurations.
//!
//! - [`bulk`] - Cubic oxide lattices (rocksalt, perovskite, fluorite) whose cation
//!   sublattice is randomly populated with a target multi-component composition.

pub mod bulk;
