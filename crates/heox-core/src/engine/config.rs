use super::energy::EnergyMode;
use crate::core::models::species::is_vacancy;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_SWAP_NAME: &str = "asmc";
pub const DEFAULT_GCMC_NAME: &str = "gcmc";

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

fn invalid(parameter: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        parameter,
        reason: reason.into(),
    }
}

fn check_temperature(temperature: f64) -> Result<f64, ConfigError> {
    if temperature > 0.0 && temperature.is_finite() {
        Ok(temperature)
    } else {
        Err(invalid(
            "temperature",
            format!("must be a positive number of Kelvin, got {}", temperature),
        ))
    }
}

fn check_positive(parameter: &'static str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        Err(invalid(parameter, "must be a positive integer"))
    } else {
        Ok(value)
    }
}

/// Which vacant sites the grand-canonical protocol may insert into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VacancyTracking {
    /// Every site currently carrying the vacancy placeholder, including those
    /// present in the starting configuration or created by other protocols.
    #[default]
    AllVacantSites,
    /// Only sites this protocol vacated itself and that are still vacant.
    OwnRemovals,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtomSwapConfig {
    pub name: String,
    pub temperature: f64,
    pub species: Vec<String>,
    pub invoke_every: usize,
    pub steps_per_invoke: usize,
}

#[derive(Default)]
pub struct AtomSwapConfigBuilder {
    name: Option<String>,
    temperature: Option<f64>,
    species: Option<Vec<String>>,
    invoke_every: Option<usize>,
    steps_per_invoke: Option<usize>,
}

impl AtomSwapConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
    pub fn species<I, S>(mut self, species: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.species = Some(species.into_iter().map(Into::into).collect());
        self
    }
    pub fn invoke_every(mut self, n: usize) -> Self {
        self.invoke_every = Some(n);
        self
    }
    pub fn steps_per_invoke(mut self, n: usize) -> Self {
        self.steps_per_invoke = Some(n);
        self
    }

    pub fn build(self) -> Result<AtomSwapConfig, ConfigError> {
        let temperature =
            check_temperature(self.temperature.ok_or(ConfigError::MissingParameter("temperature"))?)?;
        let species = self.species.ok_or(ConfigError::MissingParameter("species"))?;
        let distinct: BTreeSet<&str> = species.iter().map(String::as_str).collect();
        if distinct.len() < 2 {
            return Err(invalid(
                "species",
                "at least two distinct atom types are required for swapping",
            ));
        }
        Ok(AtomSwapConfig {
            name: self.name.unwrap_or_else(|| DEFAULT_SWAP_NAME.to_string()),
            temperature,
            species: distinct.into_iter().map(String::from).collect(),
            invoke_every: check_positive("invoke_every", self.invoke_every.unwrap_or(1))?,
            steps_per_invoke: check_positive(
                "steps_per_invoke",
                self.steps_per_invoke.unwrap_or(1),
            )?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrandCanonicalConfig {
    pub name: String,
    pub temperature: f64,
    pub chemical_potentials: BTreeMap<String, f64>,
    pub energy_mode: EnergyMode,
    pub vacancy_tracking: VacancyTracking,
    pub invoke_every: usize,
    pub steps_per_invoke: usize,
}

#[derive(Default)]
pub struct GrandCanonicalConfigBuilder {
    name: Option<String>,
    temperature: Option<f64>,
    chemical_potentials: Option<BTreeMap<String, f64>>,
    energy_mode: Option<EnergyMode>,
    vacancy_tracking: Option<VacancyTracking>,
    invoke_every: Option<usize>,
    steps_per_invoke: Option<usize>,
}

impl GrandCanonicalConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
    pub fn chemical_potential(mut self, species: impl Into<String>, mu: f64) -> Self {
        self.chemical_potentials
            .get_or_insert_with(BTreeMap::new)
            .insert(species.into(), mu);
        self
    }
    pub fn chemical_potentials(mut self, potentials: BTreeMap<String, f64>) -> Self {
        self.chemical_potentials = Some(potentials);
        self
    }
    pub fn energy_mode(mut self, mode: EnergyMode) -> Self {
        self.energy_mode = Some(mode);
        self
    }
    pub fn vacancy_tracking(mut self, tracking: VacancyTracking) -> Self {
        self.vacancy_tracking = Some(tracking);
        self
    }
    pub fn invoke_every(mut self, n: usize) -> Self {
        self.invoke_every = Some(n);
        self
    }
    pub fn steps_per_invoke(mut self, n: usize) -> Self {
        self.steps_per_invoke = Some(n);
        self
    }

    pub fn build(self) -> Result<GrandCanonicalConfig, ConfigError> {
        let temperature =
            check_temperature(self.temperature.ok_or(ConfigError::MissingParameter("temperature"))?)?;
        let chemical_potentials = self
            .chemical_potentials
            .ok_or(ConfigError::MissingParameter("chemical_potentials"))?;
        if chemical_potentials.is_empty() {
            return Err(invalid(
                "chemical_potentials",
                "at least one species must be tracked",
            ));
        }
        if let Some(species) = chemical_potentials.keys().find(|s| is_vacancy(s)) {
            return Err(invalid(
                "chemical_potentials",
                format!("the vacancy placeholder '{}' cannot be a tracked species", species),
            ));
        }
        if let Some((species, mu)) = chemical_potentials.iter().find(|(_, mu)| !mu.is_finite()) {
            return Err(invalid(
                "chemical_potentials",
                format!("chemical potential of {} must be finite, got {}", species, mu),
            ));
        }
        let energy_mode = self.energy_mode.unwrap_or_default();
        if let EnergyMode::Relaxed { force_tolerance } = energy_mode {
            if !(force_tolerance > 0.0) {
                return Err(invalid(
                    "force_tolerance",
                    format!("must be positive, got {}", force_tolerance),
                ));
            }
        }
        Ok(GrandCanonicalConfig {
            name: self.name.unwrap_or_else(|| DEFAULT_GCMC_NAME.to_string()),
            temperature,
            chemical_potentials,
            energy_mode,
            vacancy_tracking: self.vacancy_tracking.unwrap_or_default(),
            invoke_every: check_positive("invoke_every", self.invoke_every.unwrap_or(1))?,
            steps_per_invoke: check_positive(
                "steps_per_invoke",
                self.steps_per_invoke.unwrap_or(1),
            )?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub fields: Vec<String>,
    pub interval: usize,
    pub trajectory: Option<PathBuf>,
    pub records: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            interval: 1,
            trajectory: None,
            records: None,
        }
    }
}

impl LoggingConfig {
    /// Whether anything is emitted on logging ticks.
    pub fn is_enabled(&self) -> bool {
        !self.fields.is_empty() || self.trajectory.is_some()
    }
}

#[derive(Default)]
pub struct LoggingConfigBuilder {
    fields: Vec<String>,
    interval: Option<usize>,
    trajectory: Option<PathBuf>,
    records: Option<PathBuf>,
}

impl LoggingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }
    pub fn interval(mut self, interval: usize) -> Self {
        self.interval = Some(interval);
        self
    }
    pub fn trajectory(mut self, path: impl Into<PathBuf>) -> Self {
        self.trajectory = Some(path.into());
        self
    }
    pub fn records(mut self, path: impl Into<PathBuf>) -> Self {
        self.records = Some(path.into());
        self
    }

    pub fn build(self) -> Result<LoggingConfig, ConfigError> {
        if self.records.is_some() && self.fields.is_empty() {
            return Err(invalid(
                "records",
                "a record file requires at least one logging field",
            ));
        }
        Ok(LoggingConfig {
            fields: self.fields,
            interval: check_positive("interval", self.interval.unwrap_or(1))?,
            trajectory: self.trajectory,
            records: self.records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_builder_applies_defaults() {
        let config = AtomSwapConfigBuilder::new()
            .temperature(600.0)
            .species(["Zn", "Mg", "Zn"])
            .build()
            .unwrap();
        assert_eq!(config.name, DEFAULT_SWAP_NAME);
        assert_eq!(config.species, vec!["Mg".to_string(), "Zn".to_string()]);
        assert_eq!(config.invoke_every, 1);
        assert_eq!(config.steps_per_invoke, 1);
    }

    #[test]
    fn swap_builder_requires_two_distinct_species() {
        let err = AtomSwapConfigBuilder::new()
            .temperature(600.0)
            .species(["Mg", "Mg"])
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                parameter: "species",
                ..
            }
        ));
    }

    #[test]
    fn swap_builder_reports_missing_temperature() {
        let err = AtomSwapConfigBuilder::new()
            .species(["Mg", "Zn"])
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("temperature"));
    }

    #[test]
    fn non_positive_temperature_is_rejected() {
        for t in [0.0, -5.0, f64::NAN] {
            let err = AtomSwapConfigBuilder::new()
                .temperature(t)
                .species(["Mg", "Zn"])
                .build()
                .unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue {
                    parameter: "temperature",
                    ..
                }
            ));
        }
    }

    #[test]
    fn zero_invoke_every_is_rejected() {
        let err = AtomSwapConfigBuilder::new()
            .temperature(300.0)
            .species(["Mg", "Zn"])
            .invoke_every(0)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                parameter: "invoke_every",
                ..
            }
        ));
    }

    #[test]
    fn gcmc_builder_collects_chemical_potentials() {
        let config = GrandCanonicalConfigBuilder::new()
            .temperature(600.0)
            .chemical_potential("O", -1.0)
            .chemical_potential("Li", 0.5)
            .vacancy_tracking(VacancyTracking::OwnRemovals)
            .build()
            .unwrap();
        assert_eq!(config.name, DEFAULT_GCMC_NAME);
        assert_eq!(config.chemical_potentials.len(), 2);
        assert_eq!(config.energy_mode, EnergyMode::Instantaneous);
        assert_eq!(config.vacancy_tracking, VacancyTracking::OwnRemovals);
    }

    #[test]
    fn gcmc_builder_rejects_vacancy_as_tracked_species() {
        let err = GrandCanonicalConfigBuilder::new()
            .temperature(600.0)
            .chemical_potential("X", 0.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn gcmc_builder_rejects_non_positive_force_tolerance() {
        let err = GrandCanonicalConfigBuilder::new()
            .temperature(600.0)
            .chemical_potential("O", 0.0)
            .energy_mode(EnergyMode::Relaxed {
                force_tolerance: 0.0,
            })
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                parameter: "force_tolerance",
                ..
            }
        ));
    }

    #[test]
    fn logging_builder_rejects_records_without_fields() {
        let err = LoggingConfigBuilder::new()
            .records("log.tsv")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                parameter: "records",
                ..
            }
        ));
    }

    #[test]
    fn logging_is_enabled_by_fields_or_trajectory() {
        assert!(!LoggingConfig::default().is_enabled());
        let with_traj = LoggingConfigBuilder::new()
            .trajectory("traj.xyz")
            .build()
            .unwrap();
        assert!(with_traj.is_enabled());
    }
}
