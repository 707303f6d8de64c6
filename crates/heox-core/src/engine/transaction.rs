use super::energy::{self, EnergyMode};
use super::error::EngineError;
use super::state::{PropertiesUpdate, State, SystemUpdate};
use tracing::trace;

/// Result of a tentative relabelling that was evaluated and then either kept
/// or undone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TrialOutcome {
    pub accepted: bool,
    pub delta_energy: f64,
}

/// Applies `relabels` tentatively, evaluates the energy change and lets
/// `decide` keep or discard the move.
///
/// The baseline is the cached energy if it was produced with `mode`, and a
/// fresh evaluation otherwise, so both ends of the difference come from the
/// same evaluator entry point. On acceptance the new energy is cached together
/// with `mode`. On rejection, and on any evaluator failure, the previous labels
/// and the previous cached energy (including its absence and its mode) are
/// restored exactly; an evaluator failure is then returned to the caller.
///
/// # Errors
///
/// Returns [`EngineError::Internal`] without touching the state if the
/// relabelling would not change any site.
pub(crate) fn relabel_trial<F>(
    state: &mut State,
    relabels: Vec<(usize, String)>,
    mode: EnergyMode,
    decide: F,
) -> Result<TrialOutcome, EngineError>
where
    F: FnOnce(f64) -> bool,
{
    let originals: Vec<(usize, String)> = relabels
        .iter()
        .map(|(site, _)| {
            state
                .types()
                .get(*site)
                .map(|label| (*site, label.clone()))
                .ok_or_else(|| {
                    EngineError::Internal(format!(
                        "trial move targets site {} of a {}-site lattice",
                        site,
                        state.len()
                    ))
                })
        })
        .collect::<Result<_, _>>()?;

    if relabels
        .iter()
        .zip(&originals)
        .all(|((_, new), (_, old))| new == old)
    {
        return Err(EngineError::Internal(format!(
            "trial move {:?} does not change the configuration",
            relabels
        )));
    }

    let previous_energy = state.energy();
    let previous_mode = state.energy_mode();
    let baseline = match state.cached_energy(mode) {
        Some(cached) => cached,
        None => energy::calculate(state, mode)?,
    };

    state.update(
        Some(SystemUpdate {
            relabel: relabels,
            ..SystemUpdate::default()
        }),
        None,
    )?;

    let trial_energy = match energy::calculate(state, mode) {
        Ok(e) => e,
        Err(err) => {
            revert(state, originals, previous_energy, previous_mode)?;
            return Err(err);
        }
    };

    let delta_energy = trial_energy - baseline;
    let accepted = decide(delta_energy);
    if accepted {
        state.update(
            None,
            Some(
                PropertiesUpdate::new()
                    .energy(Some(trial_energy))
                    .energy_mode(mode),
            ),
        )?;
    } else {
        revert(state, originals, previous_energy, previous_mode)?;
    }
    trace!(delta_energy, accepted, "Trial move settled.");

    Ok(TrialOutcome {
        accepted,
        delta_energy,
    })
}

fn revert(
    state: &mut State,
    originals: Vec<(usize, String)>,
    previous_energy: Option<f64>,
    previous_mode: Option<EnergyMode>,
) -> Result<(), EngineError> {
    let mut properties = PropertiesUpdate::new().energy(previous_energy);
    if let Some(mode) = previous_mode {
        properties = properties.energy_mode(mode);
    }
    state.update(
        Some(SystemUpdate {
            relabel: originals,
            ..SystemUpdate::default()
        }),
        Some(properties),
    )
}
