use super::metropolis;
use crate::core::models::species::{VACANCY_LABEL, indices_where, is_vacancy};
use crate::engine::config::{GrandCanonicalConfig, VacancyTracking};
use crate::engine::error::EngineError;
use crate::engine::protocol::{Protocol, Schedule};
use crate::engine::state::State;
use crate::engine::transaction::{TrialOutcome, relabel_trial};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use std::collections::BTreeSet;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Insertion,
    Removal,
}

/// Grand-canonical Monte Carlo on a fixed lattice.
///
/// Each step chooses insertion or removal with equal probability. A removal
/// relabels a random site of a random tracked species as vacant; an insertion
/// relabels a random vacant site as a random tracked species. Both are weighed
/// by the Metropolis criterion offset by the species' chemical potential.
///
/// The protocol keeps the set of insertable vacant sites itself and re-derives
/// it from the state's labels at the start of every step, so labels changed by
/// other protocols in between are picked up. Which vacant sites count as
/// insertable is set by [`VacancyTracking`].
#[derive(Debug, Clone)]
pub struct OnLatticeGrandCanonicalMonteCarlo {
    config: GrandCanonicalConfig,
    species: Vec<String>,
    schedule: Schedule,
    vacant_sites: BTreeSet<usize>,
    accepted_insertions: u64,
    rejected_insertions: u64,
    accepted_removals: u64,
    rejected_removals: u64,
}

impl OnLatticeGrandCanonicalMonteCarlo {
    pub fn new(config: GrandCanonicalConfig) -> Self {
        let schedule = Schedule::new(config.invoke_every, config.steps_per_invoke);
        let species = config.chemical_potentials.keys().cloned().collect();
        Self {
            config,
            species,
            schedule,
            vacant_sites: BTreeSet::new(),
            accepted_insertions: 0,
            rejected_insertions: 0,
            accepted_removals: 0,
            rejected_removals: 0,
        }
    }

    pub fn config(&self) -> &GrandCanonicalConfig {
        &self.config
    }

    /// Sites this protocol currently considers vacant and insertable.
    pub fn vacant_sites(&self) -> &BTreeSet<usize> {
        &self.vacant_sites
    }

    pub fn accepted_insertions(&self) -> u64 {
        self.accepted_insertions
    }

    pub fn rejected_insertions(&self) -> u64 {
        self.rejected_insertions
    }

    pub fn accepted_removals(&self) -> u64 {
        self.accepted_removals
    }

    pub fn rejected_removals(&self) -> u64 {
        self.rejected_removals
    }

    fn sync_vacancies(&mut self, types: &[String]) {
        match self.config.vacancy_tracking {
            VacancyTracking::AllVacantSites => {
                self.vacant_sites = indices_where(types, is_vacancy).into_iter().collect();
            }
            VacancyTracking::OwnRemovals => {
                self.vacant_sites
                    .retain(|&site| types.get(site).is_some_and(|l| is_vacancy(l)));
            }
        }
    }

    fn chemical_potential(&self, species: &str) -> Result<f64, EngineError> {
        self.config
            .chemical_potentials
            .get(species)
            .copied()
            .ok_or_else(|| {
                EngineError::Internal(format!("no chemical potential for species {}", species))
            })
    }

    fn attempt(
        &mut self,
        state: &mut State,
        site: usize,
        label: String,
        chemical_potential: f64,
        rng: &mut dyn RngCore,
    ) -> Result<TrialOutcome, EngineError> {
        let temperature = self.config.temperature;
        relabel_trial(
            state,
            vec![(site, label)],
            self.config.energy_mode,
            |delta| metropolis::accept(delta, chemical_potential, temperature, rng),
        )
    }

    fn attempt_removal(
        &mut self,
        state: &mut State,
        rng: &mut dyn RngCore,
    ) -> Result<(), EngineError> {
        let Some(species) = self.species.choose(rng).cloned() else {
            self.rejected_removals += 1;
            return Ok(());
        };
        let occupied = indices_where(state.types(), |l| l == species);
        let Some(&site) = occupied.choose(rng) else {
            trace!(species = %species, "No occupied site to remove from.");
            self.rejected_removals += 1;
            return Ok(());
        };

        let mu = self.chemical_potential(&species)?;
        match self.attempt(state, site, VACANCY_LABEL.to_string(), mu, rng) {
            Ok(trial) if trial.accepted => {
                self.vacant_sites.insert(site);
                self.accepted_removals += 1;
            }
            Ok(_) => self.rejected_removals += 1,
            Err(err) => {
                self.rejected_removals += 1;
                return Err(err);
            }
        }
        Ok(())
    }

    fn attempt_insertion(
        &mut self,
        state: &mut State,
        rng: &mut dyn RngCore,
    ) -> Result<(), EngineError> {
        let Some(species) = self.species.choose(rng).cloned() else {
            self.rejected_insertions += 1;
            return Ok(());
        };
        if self.vacant_sites.is_empty() {
            trace!(species = %species, "No vacant site to insert into.");
            self.rejected_insertions += 1;
            return Ok(());
        }
        let pick = rng.gen_range(0..self.vacant_sites.len());
        let Some(&site) = self.vacant_sites.iter().nth(pick) else {
            return Err(EngineError::Internal(format!(
                "vacant site {} of {} could not be resolved",
                pick,
                self.vacant_sites.len()
            )));
        };

        let mu = self.chemical_potential(&species)?;
        match self.attempt(state, site, species, mu, rng) {
            Ok(trial) if trial.accepted => {
                self.vacant_sites.remove(&site);
                self.accepted_insertions += 1;
            }
            Ok(_) => self.rejected_insertions += 1,
            Err(err) => {
                self.rejected_insertions += 1;
                return Err(err);
            }
        }
        Ok(())
    }
}

impl Protocol for OnLatticeGrandCanonicalMonteCarlo {
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
            .species
            .iter()
            .map(String::as_str)
            .filter(|s| !present.contains(s))
            .collect();
        if !missing.is_empty() {
            return Err(EngineError::Validation(format!(
                "protocol '{}' tracks species [{}] that are not present in the system",
                self.config.name,
                missing.join(", ")
            )));
        }

        self.vacant_sites.clear();
        if self.config.vacancy_tracking == VacancyTracking::AllVacantSites {
            self.sync_vacancies(state.types());
        }
        debug!(
            protocol = %self.config.name,
            species = ?self.species,
            vacancies = self.vacant_sites.len(),
            tracking = ?self.config.vacancy_tracking,
            "Initialized grand-canonical protocol."
        );
        Ok(())
    }

    fn step(&mut self, state: &mut State, rng: &mut dyn RngCore) -> Result<(), EngineError> {
        self.sync_vacancies(state.types());
        let kind = if rng.r#gen::<f64>() < 0.5 {
            Move::Insertion
        } else {
            Move::Removal
        };
        match kind {
            Move::Insertion => self.attempt_insertion(state, rng),
            Move::Removal => self.attempt_removal(state, rng),
        }
    }

    fn metrics(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("accepted_insertions", self.accepted_insertions),
            ("rejected_insertions", self.rejected_insertions),
            ("accepted_removals", self.accepted_removals),
            ("rejected_removals", self.rejected_removals),
        ]
    }
}
