//! # Forcefield Module
//!
//! Energy evaluation for lattice configurations.
//!
//! The simulation engine only depends on the [`evaluator::PotentialEnergyEvaluator`]
//! capability. Any energy model can be plugged in through it, from a classical pair
//! potential to a machine-learned interatomic potential wrapped by the caller.
//!
//! - **Capability** ([`evaluator`]) - The two entry points consumed by Monte Carlo
//!   protocols: instantaneous energy and energy after structural relaxation.
//! - **Functional forms** ([`potentials`]) - Lennard-Jones 12-6 and Buckingham exp-6
//!   pair energies together with their radial derivatives.
//! - **Parameters** ([`params`]) - Per-species-pair parameter sets loaded from TOML.
//! - **Pair evaluator** ([`pair`]) - A periodic pair-potential implementation of the
//!   capability, including a steepest-descent relaxation path.

pub mod evaluator;
pub mod pair;
pub mod params;
pub mod potentials;
