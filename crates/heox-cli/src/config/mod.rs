mod file;

pub use file::PartialSimulationConfig;

use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use file::{FilePotential, FileProtocol, FileStructure};
use heox::core::build::bulk::{BulkSpec, CrystalPattern};
use heox::core::forcefield::evaluator::DEFAULT_FORCE_TOLERANCE;
use heox::engine::config::{
    AtomSwapConfig, AtomSwapConfigBuilder, GrandCanonicalConfig, GrandCanonicalConfigBuilder,
    LoggingConfig, LoggingConfigBuilder,
};
use heox::engine::energy::EnergyMode;
use std::path::{Path, PathBuf};

/// Where the starting configuration comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum StructureSource {
    File(PathBuf),
    Generated(BulkSpec),
}

/// Where the pair-potential parameters come from.
#[derive(Debug, Clone, PartialEq)]
pub enum PotentialSource {
    File(PathBuf),
    Inline(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolConfig {
    AtomSwap(AtomSwapConfig),
    GrandCanonical(GrandCanonicalConfig),
}

/// A fully validated simulation description.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub seed: Option<u64>,
    pub steps: u64,
    pub temperature: f64,
    pub structure: StructureSource,
    pub potential: PotentialSource,
    pub protocols: Vec<ProtocolConfig>,
    pub logging: LoggingConfig,
}

fn config_err(context: &str, err: impl std::fmt::Display) -> CliError {
    CliError::Config(format!("{}: {}", context, err))
}

/// Input paths are taken relative to the directory of the configuration file.
fn resolve(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

impl PartialSimulationConfig {
    /// Combines the file with command-line overrides and validates the result
    /// through the core builders.
    pub fn merge_with_cli(self, args: &RunArgs, base_dir: &Path) -> Result<SimulationConfig> {
        let steps = args
            .steps
            .or(self.steps)
            .ok_or_else(|| CliError::Config("'steps' is required".to_string()))?;
        let temperature = self
            .temperature
            .ok_or_else(|| CliError::Config("'temperature' is required".to_string()))?;
        if !(temperature > 0.0 && temperature.is_finite()) {
            return Err(CliError::Config(format!(
                "'temperature' must be a positive number of Kelvin, got {}",
                temperature
            )));
        }

        let structure = merge_structure(
            self.structure
                .ok_or_else(|| CliError::Config("a [structure] section is required".to_string()))?,
            base_dir,
        )?;
        let potential = merge_potential(
            self.potential
                .ok_or_else(|| CliError::Config("a [potential] section is required".to_string()))?,
            base_dir,
        )?;

        let protocols = self
            .protocols
            .into_iter()
            .map(|p| merge_protocol(p, temperature))
            .collect::<Result<Vec<_>>>()?;

        let mut logging = LoggingConfigBuilder::new().fields(self.logging.fields);
        if let Some(interval) = self.logging.interval {
            logging = logging.interval(interval);
        }
        if let Some(trajectory) = args.trajectory.clone().or(self.logging.trajectory) {
            logging = logging.trajectory(trajectory);
        }
        if let Some(records) = self.logging.records {
            logging = logging.records(records);
        }
        let logging = logging.build().map_err(|e| config_err("[logging]", e))?;

        Ok(SimulationConfig {
            seed: args.seed.or(self.seed),
            steps,
            temperature,
            structure,
            potential,
            protocols,
            logging,
        })
    }
}

fn merge_structure(structure: FileStructure, base_dir: &Path) -> Result<StructureSource> {
    let generated = structure.pattern.is_some() || structure.composition.is_some();
    match (structure.input, generated) {
        (Some(_), true) => Err(CliError::Config(
            "[structure] takes either 'input' or a generated lattice, not both".to_string(),
        )),
        (Some(input), false) => Ok(StructureSource::File(resolve(base_dir, input))),
        (None, true) => {
            let pattern: CrystalPattern = structure
                .pattern
                .as_deref()
                .unwrap_or("rocksalt")
                .parse()
                .map_err(|e| config_err("[structure]", e))?;
            let composition = structure.composition.ok_or_else(|| {
                CliError::Config("[structure] 'composition' is required".to_string())
            })?;
            let mut spec = BulkSpec::new(pattern, composition);
            if let Some(a) = structure.lattice_constant {
                if !(a > 0.0 && a.is_finite()) {
                    return Err(CliError::Config(format!(
                        "[structure] 'lattice-constant' must be positive, got {}",
                        a
                    )));
                }
                spec.lattice_constant = a;
            }
            if let Some(supercell) = structure.supercell {
                if supercell.contains(&0) {
                    return Err(CliError::Config(
                        "[structure] 'supercell' repetitions must be positive".to_string(),
                    ));
                }
                spec.supercell = supercell;
            }
            spec.dopant = structure.dopant.map(|d| (d.species, d.fraction));
            spec.normalized_composition()
                .map_err(|e| config_err("[structure]", e))?;
            Ok(StructureSource::Generated(spec))
        }
        (None, false) => Err(CliError::Config(
            "[structure] needs 'input' or a 'pattern' with a 'composition'".to_string(),
        )),
    }
}

fn merge_potential(potential: FilePotential, base_dir: &Path) -> Result<PotentialSource> {
    match (potential.path, potential.inline.is_empty()) {
        (Some(path), true) => Ok(PotentialSource::File(resolve(base_dir, path))),
        (Some(_), false) => Err(CliError::Config(
            "[potential] takes either 'path' or inline parameters, not both".to_string(),
        )),
        (None, false) => toml::to_string(&potential.inline)
            .map(PotentialSource::Inline)
            .map_err(|e| config_err("[potential]", e)),
        (None, true) => Err(CliError::Config(
            "[potential] needs 'path' or inline pair parameters".to_string(),
        )),
    }
}

fn merge_protocol(protocol: FileProtocol, default_temperature: f64) -> Result<ProtocolConfig> {
    match protocol {
        FileProtocol::AtomSwap {
            name,
            temperature,
            species,
            invoke_every,
            steps_per_invoke,
        } => {
            let mut builder = AtomSwapConfigBuilder::new()
                .temperature(temperature.unwrap_or(default_temperature))
                .species(species);
            if let Some(name) = name {
                builder = builder.name(name);
            }
            if let Some(n) = invoke_every {
                builder = builder.invoke_every(n);
            }
            if let Some(n) = steps_per_invoke {
                builder = builder.steps_per_invoke(n);
            }
            builder
                .build()
                .map(ProtocolConfig::AtomSwap)
                .map_err(|e| config_err("atom-swap protocol", e))
        }
        FileProtocol::GrandCanonical {
            name,
            temperature,
            chemical_potentials,
            relaxed_energies,
            force_tolerance,
            vacancy_tracking,
            invoke_every,
            steps_per_invoke,
        } => {
            let energy_mode = if relaxed_energies {
                EnergyMode::Relaxed {
                    force_tolerance: force_tolerance.unwrap_or(DEFAULT_FORCE_TOLERANCE),
                }
            } else {
                EnergyMode::Instantaneous
            };
            let mut builder = GrandCanonicalConfigBuilder::new()
                .temperature(temperature.unwrap_or(default_temperature))
                .chemical_potentials(chemical_potentials)
                .energy_mode(energy_mode);
            if let Some(name) = name {
                builder = builder.name(name);
            }
            if let Some(tracking) = vacancy_tracking {
                builder = builder.vacancy_tracking(tracking);
            }
            if let Some(n) = invoke_every {
                builder = builder.invoke_every(n);
            }
            if let Some(n) = steps_per_invoke {
                builder = builder.steps_per_invoke(n);
            }
            builder
                .build()
                .map(ProtocolConfig::GrandCanonical)
                .map_err(|e| config_err("grand-canonical protocol", e))
        }
    }
}
