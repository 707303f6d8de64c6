//! # HEO-X Core Library
//!
//! Hybrid Monte Carlo sampling of multi-component ("high-entropy") solids on a
//! fixed crystal lattice under thermodynamic control.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer layout:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Structure`), the
//!   `PotentialEnergyEvaluator` capability with a pair-potential implementation,
//!   extended XYZ I/O, and bulk lattice generation.
//!
//! - **[`engine`]: The Logic Core.** The mutable simulation `State`, the
//!   `Protocol` abstraction with its scheduling contract, the canonical atom-swap
//!   and grand-canonical insertion/removal move generators, and the transactional
//!   guard that reverts rejected moves exactly.
//!
//! - **[`workflows`]: The Public API.** The `Pipeline` orchestrator that composes
//!   protocols into one time-stepped run with logging and trajectory output.

pub mod core;
pub mod engine;
pub mod workflows;
