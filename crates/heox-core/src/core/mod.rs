//! # Core Module
//!
//! Stateless building blocks of the simulation: the structural representation
//! exchanged with external collaborators, energy evaluation, file I/O and
//! lattice generation.
//!
//! - **Data Models** ([`models`]) - Labelled lattice sites, cells and the vacancy placeholder
//! - **Energy Evaluation** ([`forcefield`]) - The evaluator capability and a pair-potential implementation
//! - **File I/O** ([`io`]) - Extended XYZ frames and append-only trajectories
//! - **Lattice Generation** ([`build`]) - Bulk high-entropy oxide supercells

pub mod build;
pub mod forcefield;
pub mod io;
pub mod models;
