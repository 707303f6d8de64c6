//! Concrete Monte Carlo move generators and the shared acceptance rule.

pub mod gcmc;
pub mod metropolis;
pub mod swap;

pub use gcmc::OnLatticeGrandCanonicalMonteCarlo;
pub use swap::AtomSwapMonteCarlo;
