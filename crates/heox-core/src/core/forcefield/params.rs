use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

const DEFAULT_CUTOFF: f64 = 6.0;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(untagged)]
pub enum PairForm {
    #[serde(rename_all = "kebab-case")]
    Buckingham {
        r_min: f64,
        well_depth: f64,
        gamma: f64,
    },
    #[serde(rename_all = "kebab-case")]
    LennardJones { r_min: f64, well_depth: f64 },
}

#[derive(Debug, Deserialize, Clone)]
struct PairEntry {
    species: [String; 2],
    #[serde(flatten)]
    form: PairForm,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PairParamsFile {
    cutoff: Option<f64>,
    #[serde(default)]
    pairs: Vec<PairEntry>,
}

/// Pair interaction parameters keyed by an unordered pair of species labels.
#[derive(Debug, Clone, PartialEq)]
pub struct PairParams {
    pub cutoff: f64,
    pairs: HashMap<(String, String), PairForm>,
}

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid parameter set: {0}")]
    Invalid(String),
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl PairParams {
    pub fn new(cutoff: f64) -> Self {
        Self {
            cutoff,
            pairs: HashMap::new(),
        }
    }

    pub fn with_pair(mut self, a: &str, b: &str, form: PairForm) -> Self {
        self.insert(a, b, form);
        self
    }

    pub fn insert(&mut self, a: &str, b: &str, form: PairForm) {
        self.pairs.insert(pair_key(a, b), form);
    }

    pub fn get(&self, a: &str, b: &str) -> Option<&PairForm> {
        self.pairs.get(&pair_key(a, b))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let file: PairParamsFile = toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_file(file)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ParamLoadError> {
        let file: PairParamsFile = toml::from_str(content).map_err(|e| ParamLoadError::Toml {
            path: "<inline>".to_string(),
            source: e,
        })?;
        Self::from_file(file)
    }

    fn from_file(file: PairParamsFile) -> Result<Self, ParamLoadError> {
        let cutoff = file.cutoff.unwrap_or(DEFAULT_CUTOFF);
        if !(cutoff > 0.0) {
            return Err(ParamLoadError::Invalid(format!(
                "cutoff must be positive, got {}",
                cutoff
            )));
        }
        let mut params = Self::new(cutoff);
        for entry in file.pairs {
            let [a, b] = &entry.species;
            if let PairForm::Buckingham { gamma, .. } = entry.form {
                if gamma <= 6.0 {
                    return Err(ParamLoadError::Invalid(format!(
                        "Buckingham gamma for ({}, {}) must exceed 6, got {}",
                        a, b, gamma
                    )));
                }
            }
            params.insert(a, b, entry.form);
        }
        Ok(params)
    }
}
