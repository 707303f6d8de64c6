use super::metropolis;
use crate::core::models::species::{indices_where, is_vacancy};
use crate::engine::config::AtomSwapConfig;
use crate::engine::energy::EnergyMode;
use crate::engine::error::EngineError;
use crate::engine::protocol::{Protocol, Schedule};
use crate::engine::state::State;
use crate::engine::transaction::relabel_trial;
use rand::RngCore;
use rand::seq::index;
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Number of random site pairs drawn before a swap attempt is given up.
pub const MAX_PAIR_SEARCH_ATTEMPTS: usize = 100;

/// Canonical-ensemble Monte Carlo exchanging the labels of two sites.
///
/// Each step draws pairs of distinct sites from those currently carrying one of
/// the configured species until the two labels differ, swaps them, and applies
/// the Metropolis criterion at the configured temperature. A failed pair search
/// counts as a rejection and never touches the state.
#[derive(Debug, Clone)]
pub struct AtomSwapMonteCarlo {
    config: AtomSwapConfig,
    schedule: Schedule,
    accepted_swaps: u64,
    rejected_swaps: u64,
}

impl AtomSwapMonteCarlo {
    pub fn new(config: AtomSwapConfig) -> Self {
        let schedule = Schedule::new(config.invoke_every, config.steps_per_invoke);
        Self {
            config,
            schedule,
            accepted_swaps: 0,
            rejected_swaps: 0,
        }
    }

    pub fn config(&self) -> &AtomSwapConfig {
        &self.config
    }

    pub fn accepted_swaps(&self) -> u64 {
        self.accepted_swaps
    }

    pub fn rejected_swaps(&self) -> u64 {
        self.rejected_swaps
    }

    fn find_pair(&self, types: &[String], rng: &mut dyn RngCore) -> Option<(usize, usize)> {
        let eligible = indices_where(types, |label| {
            self.config.species.iter().any(|s| s == label)
        });
        if eligible.len() < 2 {
            return None;
        }
        for _ in 0..MAX_PAIR_SEARCH_ATTEMPTS {
            let picked = index::sample(rng, eligible.len(), 2);
            let (a, b) = (eligible[picked.index(0)], eligible[picked.index(1)]);
            if types[a] != types[b] {
                return Some((a, b));
            }
        }
        None
    }
}

impl Protocol for AtomSwapMonteCarlo {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    fn schedule_mut(&mut self) -> &mut Schedule {
        &mut self.schedule
    }

    fn initialize(&mut self, state: &State) -> Result<(), EngineError> {
        let present: BTreeSet<&str> = state.types().iter().map(String::as_str).collect();
        let missing: Vec<&str> = self
            .config
            .species
            .iter()
            .map(String::as_str)
            .filter(|s| !present.contains(s) && !is_vacancy(s))
            .collect();
        if !missing.is_empty() {
            return Err(EngineError::Validation(format!(
                "protocol '{}' swaps species [{}] that are not present in the system",
                self.config.name,
                missing.join(", ")
            )));
        }
        debug!(
            protocol = %self.config.name,
            species = ?self.config.species,
            temperature = self.config.temperature,
            "Initialized atom-swap protocol."
        );
        Ok(())
    }

    fn step(&mut self, state: &mut State, rng: &mut dyn RngCore) -> Result<(), EngineError> {
        let Some((a, b)) = self.find_pair(state.types(), rng) else {
            trace!(protocol = %self.config.name, "No swappable pair found.");
            self.rejected_swaps += 1;
            return Ok(());
        };

        let relabels = vec![(a, state.types()[b].clone()), (b, state.types()[a].clone())];
        let temperature = self.config.temperature;
        let outcome = relabel_trial(state, relabels, EnergyMode::Instantaneous, |delta| {
            metropolis::accept(delta, 0.0, temperature, rng)
        });
        match outcome {
            Ok(trial) if trial.accepted => self.accepted_swaps += 1,
            Ok(_) => self.rejected_swaps += 1,
            Err(err) => {
                self.rejected_swaps += 1;
                return Err(err);
            }
        }
        Ok(())
    }

    fn metrics(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("accepted_swaps", self.accepted_swaps),
            ("rejected_swaps", self.rejected_swaps),
        ]
    }
}
