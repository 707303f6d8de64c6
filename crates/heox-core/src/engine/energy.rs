use super::error::EngineError;
use super::state::State;
use crate::core::forcefield::evaluator::EvaluatorError;
use tracing::trace;

/// Which evaluator entry point produces the energy of a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum EnergyMode {
    /// Energy at the stored geometry.
    #[default]
    Instantaneous,
    /// Energy after relaxing positions until the largest force component is
    /// below `force_tolerance`.
    Relaxed { force_tolerance: f64 },
}

/// Evaluates the potential energy of the configuration currently held by `state`.
///
/// Vacancy placeholder sites are stripped before the structure is handed to the
/// evaluator, and the state itself is never modified.
pub fn calculate(state: &State, mode: EnergyMode) -> Result<f64, EngineError> {
    let evaluator = state.evaluator()?;
    let structure = state.to_structure().without_vacancies();
    let energy = match mode {
        EnergyMode::Instantaneous => evaluator.energy(&structure)?,
        EnergyMode::Relaxed { force_tolerance } => {
            evaluator.relaxed_energy(&structure, force_tolerance)?
        }
    };
    if !energy.is_finite() {
        return Err(EvaluatorError::NonFinite(energy).into());
    }
    trace!(energy, atoms = structure.len(), ?mode, "Evaluated energy.");
    Ok(energy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::evaluator::PotentialEnergyEvaluator;
    use crate::core::models::structure::Structure;
    use nalgebra::{Matrix3, Point3};
    use std::sync::Arc;

    /// Reports the number of atoms it sees, negated when relaxing.
    #[derive(Debug)]
    struct CountingEvaluator;

    impl PotentialEnergyEvaluator for CountingEvaluator {
        fn energy(&self, s: &Structure) -> Result<f64, EvaluatorError> {
            Ok(s.len() as f64)
        }
        fn relaxed_energy(&self, s: &Structure, _: f64) -> Result<f64, EvaluatorError> {
            Ok(-(s.len() as f64))
        }
    }

    #[derive(Debug)]
    struct NanEvaluator;

    impl PotentialEnergyEvaluator for NanEvaluator {
        fn energy(&self, _: &Structure) -> Result<f64, EvaluatorError> {
            Ok(f64::NAN)
        }
        fn relaxed_energy(&self, _: &Structure, _: f64) -> Result<f64, EvaluatorError> {
            Ok(f64::NAN)
        }
    }

    fn state_with(evaluator: Arc<dyn PotentialEnergyEvaluator>) -> State {
        State::new(
            vec![Point3::origin(); 4],
            ["Mg", "X", "O", "X"].map(String::from).to_vec(),
            Matrix3::identity(),
            [true; 3],
            Some(evaluator),
        )
        .unwrap()
    }

    #[test]
    fn vacancies_are_not_passed_to_the_evaluator() {
        let state = state_with(Arc::new(CountingEvaluator));
        assert_eq!(calculate(&state, EnergyMode::Instantaneous).unwrap(), 2.0);
        assert_eq!(state.len(), 4);
    }

    #[test]
    fn relaxed_mode_uses_relaxation_entry_point() {
        let state = state_with(Arc::new(CountingEvaluator));
        let mode = EnergyMode::Relaxed {
            force_tolerance: 0.05,
        };
        assert_eq!(calculate(&state, mode).unwrap(), -2.0);
    }

    #[test]
    fn non_finite_energy_is_an_error() {
        let state = state_with(Arc::new(NanEvaluator));
        assert!(matches!(
            calculate(&state, EnergyMode::Instantaneous),
            Err(EngineError::Evaluator {
                source: EvaluatorError::NonFinite(_)
            })
        ));
    }
}
