use super::evaluator::{EvaluatorError, PotentialEnergyEvaluator};
use super::params::{PairForm, PairParams};
use super::potentials;
use crate::core::models::structure::Structure;
use nalgebra::Vector3;
use tracing::{debug, trace};

const DEFAULT_MAX_RELAX_ITERATIONS: usize = 500;
const INITIAL_STEP_SIZE: f64 = 0.01;
const MAX_DISPLACEMENT: f64 = 0.1;
const MIN_STEP_SIZE: f64 = 1e-8;

/// Periodic pair-potential energy model.
///
/// Every unordered pair of sites closer than the cutoff (under the minimum-image
/// convention) contributes one Lennard-Jones or Buckingham term, chosen by the
/// parameters registered for its two species. The cutoff is expected to stay
/// below half the shortest periodic cell length.
#[derive(Debug, Clone)]
pub struct PairPotential {
    params: PairParams,
    max_relax_iterations: usize,
}

impl PairPotential {
    pub fn new(params: PairParams) -> Self {
        Self {
            params,
            max_relax_iterations: DEFAULT_MAX_RELAX_ITERATIONS,
        }
    }

    pub fn with_max_relax_iterations(mut self, iterations: usize) -> Self {
        self.max_relax_iterations = iterations;
        self
    }

    pub fn params(&self) -> &PairParams {
        &self.params
    }

    fn form_for(&self, a: &str, b: &str) -> Result<PairForm, EvaluatorError> {
        self.params
            .get(a, b)
            .copied()
            .ok_or_else(|| EvaluatorError::MissingPairParameters(a.to_string(), b.to_string()))
    }

    /// Visits every interacting pair as `(i, j, displacement i->j, distance, form)`.
    fn for_each_pair<F>(&self, structure: &Structure, mut visit: F) -> Result<(), EvaluatorError>
    where
        F: FnMut(usize, usize, Vector3<f64>, f64, PairForm),
    {
        let symbols = structure.symbols();
        for i in 0..structure.len() {
            for j in (i + 1)..structure.len() {
                let delta = structure.minimum_image(i, j);
                let dist = delta.norm();
                if dist >= self.params.cutoff {
                    continue;
                }
                let form = self.form_for(&symbols[i], &symbols[j])?;
                visit(i, j, delta, dist, form);
            }
        }
        Ok(())
    }

    fn total_energy(&self, structure: &Structure) -> Result<f64, EvaluatorError> {
        let mut energy = 0.0;
        self.for_each_pair(structure, |_, _, _, dist, form| {
            energy += match form {
                PairForm::LennardJones { r_min, well_depth } => {
                    potentials::lennard_jones_12_6(dist, r_min, well_depth)
                }
                PairForm::Buckingham {
                    r_min,
                    well_depth,
                    gamma,
                } => potentials::buckingham_exp_6(dist, r_min, well_depth, gamma),
            };
        })?;
        if !energy.is_finite() {
            return Err(EvaluatorError::NonFinite(energy));
        }
        Ok(energy)
    }

    /// Per-site forces, i.e. the negative energy gradient.
    pub fn forces(&self, structure: &Structure) -> Result<Vec<Vector3<f64>>, EvaluatorError> {
        let mut forces = vec![Vector3::zeros(); structure.len()];
        self.for_each_pair(structure, |i, j, delta, dist, form| {
            if dist <= 0.0 {
                return;
            }
            let de_dr = match form {
                PairForm::LennardJones { r_min, well_depth } => {
                    potentials::lennard_jones_12_6_derivative(dist, r_min, well_depth)
                }
                PairForm::Buckingham {
                    r_min,
                    well_depth,
                    gamma,
                } => potentials::buckingham_exp_6_derivative(dist, r_min, well_depth, gamma),
            };
            let grad_j = delta * (de_dr / dist);
            forces[j] -= grad_j;
            forces[i] += grad_j;
        })?;
        Ok(forces)
    }
}

fn max_force_component(forces: &[Vector3<f64>]) -> f64 {
    forces
        .iter()
        .map(|f| f.amax())
        .fold(0.0_f64, f64::max)
}

impl PotentialEnergyEvaluator for PairPotential {
    fn energy(&self, structure: &Structure) -> Result<f64, EvaluatorError> {
        self.total_energy(structure)
    }

    fn relaxed_energy(
        &self,
        structure: &Structure,
        force_tolerance: f64,
    ) -> Result<f64, EvaluatorError> {
        let mut working = structure.clone();
        let mut energy = self.total_energy(&working)?;
        let mut forces = self.forces(&working)?;
        let mut step_size = INITIAL_STEP_SIZE;

        for iteration in 0..self.max_relax_iterations {
            let max_force = max_force_component(&forces);
            if max_force < force_tolerance {
                debug!(iteration, energy, max_force, "Relaxation converged.");
                return Ok(energy);
            }

            let largest = forces.iter().map(|f| f.norm()).fold(0.0_f64, f64::max);
            let scale = (step_size).min(MAX_DISPLACEMENT / largest);
            let previous = working.positions().to_vec();
            for (pos, force) in working.positions_mut().iter_mut().zip(&forces) {
                *pos += force * scale;
            }

            let trial_energy = self.total_energy(&working)?;
            if trial_energy < energy {
                energy = trial_energy;
                forces = self.forces(&working)?;
                step_size *= 1.2;
            } else {
                working.positions_mut().copy_from_slice(&previous);
                step_size *= 0.5;
                if step_size < MIN_STEP_SIZE {
                    trace!(iteration, "Step size collapsed during relaxation.");
                    break;
                }
            }
        }

        let max_force = max_force_component(&forces);
        if max_force < force_tolerance {
            return Ok(energy);
        }
        Err(EvaluatorError::RelaxationNotConverged {
            iterations: self.max_relax_iterations,
            max_force,
            tolerance: force_tolerance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Point3};

    fn lj_params() -> PairParams {
        PairParams::new(4.0).with_pair(
            "A",
            "A",
            PairForm::LennardJones {
                r_min: 1.0,
                well_depth: 1.0,
            },
        )
    }

    fn dimer(separation: f64) -> Structure {
        Structure::new(
            vec!["A".into(), "A".into()],
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(separation, 0.0, 0.0)],
            Matrix3::from_diagonal_element(20.0),
            [false; 3],
        )
        .unwrap()
    }

    #[test]
    fn energy_of_dimer_at_minimum_is_negative_well_depth() {
        let potential = PairPotential::new(lj_params());
        let energy = potential.energy(&dimer(1.0)).unwrap();
        assert!((energy + 1.0).abs() < 1e-12);
    }

    #[test]
    fn pairs_beyond_cutoff_do_not_contribute() {
        let potential = PairPotential::new(lj_params());
        assert_eq!(potential.energy(&dimer(5.0)).unwrap(), 0.0);
    }

    #[test]
    fn periodic_images_are_used_for_distances() {
        let potential = PairPotential::new(lj_params());
        let s = Structure::new(
            vec!["A".into(), "A".into()],
            vec![Point3::new(0.25, 0.0, 0.0), Point3::new(9.25, 0.0, 0.0)],
            Matrix3::from_diagonal_element(10.0),
            [true; 3],
        )
        .unwrap();
        let energy = potential.energy(&s).unwrap();
        assert!((energy + 1.0).abs() < 1e-12);
    }

    #[test]
    fn missing_parameters_are_reported() {
        let potential = PairPotential::new(lj_params());
        let s = Structure::new(
            vec!["A".into(), "B".into()],
            vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)],
            Matrix3::from_diagonal_element(20.0),
            [false; 3],
        )
        .unwrap();
        assert!(matches!(
            potential.energy(&s),
            Err(EvaluatorError::MissingPairParameters(_, _))
        ));
    }

    #[test]
    fn forces_are_equal_and_opposite() {
        let potential = PairPotential::new(lj_params());
        let forces = potential.forces(&dimer(1.2)).unwrap();
        assert!((forces[0] + forces[1]).norm() < 1e-12);
        assert!(forces[0].x > 0.0, "attractive beyond r_min pulls atom 0 towards atom 1");
    }

    #[test]
    fn relaxed_energy_reaches_minimum_without_touching_input() {
        let potential = PairPotential::new(lj_params());
        let input = dimer(1.3);
        let relaxed = potential.relaxed_energy(&input, 1e-3).unwrap();
        let unrelaxed = potential.energy(&input).unwrap();
        assert!(relaxed < unrelaxed);
        assert!((relaxed + 1.0).abs() < 1e-3);
        assert_eq!(input.positions()[1].x, 1.3);
    }

    #[test]
    fn relaxed_energy_reports_non_convergence() {
        let potential = PairPotential::new(lj_params()).with_max_relax_iterations(1);
        let result = potential.relaxed_energy(&dimer(1.5), 1e-12);
        assert!(matches!(
            result,
            Err(EvaluatorError::RelaxationNotConverged { .. })
        ));
    }
}
