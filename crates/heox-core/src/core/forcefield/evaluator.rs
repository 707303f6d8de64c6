use crate::core::models::structure::Structure;
use thiserror::Error;

/// Default maximum force component (eV/Å) at which a relaxation is considered converged.
pub const DEFAULT_FORCE_TOLERANCE: f64 = 0.05;

#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("No pair parameters defined for species pair ({0}, {1})")]
    MissingPairParameters(String, String),

    #[error(
        "Relaxation did not converge after {iterations} iterations (max force {max_force:.4} > {tolerance})"
    )]
    RelaxationNotConverged {
        iterations: usize,
        max_force: f64,
        tolerance: f64,
    },

    #[error("Evaluator returned a non-finite energy: {0}")]
    NonFinite(f64),

    #[error("Evaluator failure: {0}")]
    Other(String),
}

/// Computes the potential energy of a lattice configuration.
///
/// Implementations are owned by the caller and shared with the simulation state
/// by handle. They receive structures from which vacancy placeholder sites have
/// already been stripped and must not retain or mutate them. Both calls block
/// until the energy is available.
pub trait PotentialEnergyEvaluator: std::fmt::Debug {
    /// Energy of the structure at its current geometry.
    fn energy(&self, structure: &Structure) -> Result<f64, EvaluatorError>;

    /// Energy after relaxing atomic positions until the largest force component
    /// falls below `force_tolerance`.
    ///
    /// The relaxation acts on a private copy; the caller's geometry is unchanged.
    fn relaxed_energy(
        &self,
        structure: &Structure,
        force_tolerance: f64,
    ) -> Result<f64, EvaluatorError>;
}
