use crate::error::{CliError, Result};
use heox::engine::config::VacancyTracking;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A simulation file as written by the user; every field is optional so that
/// command-line overrides can fill the gaps.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialSimulationConfig {
    pub seed: Option<u64>,
    pub steps: Option<u64>,
    pub temperature: Option<f64>,
    pub structure: Option<FileStructure>,
    pub potential: Option<FilePotential>,
    #[serde(default)]
    pub protocols: Vec<FileProtocol>,
    #[serde(default)]
    pub logging: FileLogging,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileStructure {
    /// Extended XYZ file; its last frame is the starting configuration.
    pub input: Option<PathBuf>,
    pub pattern: Option<String>,
    pub lattice_constant: Option<f64>,
    pub supercell: Option<[usize; 3]>,
    pub composition: Option<BTreeMap<String, f64>>,
    pub dopant: Option<FileDopant>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileDopant {
    pub species: String,
    pub fraction: f64,
}

/// Either `path = "..."` or the pair-parameter table written inline.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct FilePotential {
    pub path: Option<PathBuf>,
    #[serde(flatten)]
    pub inline: toml::Table,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum FileProtocol {
    #[serde(rename_all = "kebab-case")]
    AtomSwap {
        name: Option<String>,
        temperature: Option<f64>,
        species: Vec<String>,
        invoke_every: Option<usize>,
        steps_per_invoke: Option<usize>,
    },
    #[serde(rename_all = "kebab-case")]
    GrandCanonical {
        name: Option<String>,
        temperature: Option<f64>,
        chemical_potentials: BTreeMap<String, f64>,
        #[serde(default)]
        relaxed_energies: bool,
        force_tolerance: Option<f64>,
        vacancy_tracking: Option<VacancyTracking>,
        invoke_every: Option<usize>,
        steps_per_invoke: Option<usize>,
    },
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileLogging {
    #[serde(default)]
    pub fields: Vec<String>,
    pub interval: Option<usize>,
    pub trajectory: Option<PathBuf>,
    pub records: Option<PathBuf>,
}

impl PartialSimulationConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading simulation configuration from {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}
