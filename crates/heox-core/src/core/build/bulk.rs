use crate::core::models::structure::{Structure, StructureError};
use nalgebra::{Matrix3, Point3};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, instrument};

pub const ANION_ELEMENT: &str = "O";

const FRACTION_TOLERANCE: f64 = 1e-9;

const FCC: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [0.0, 0.5, 0.5],
    [0.5, 0.0, 0.5],
    [0.5, 0.5, 0.0],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrystalPattern {
    Rocksalt,
    Perovskite,
    Fluorite,
}

impl CrystalPattern {
    pub const ALL: [CrystalPattern; 3] = [Self::Rocksalt, Self::Perovskite, Self::Fluorite];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Rocksalt => "rocksalt",
            Self::Perovskite => "perovskite",
            Self::Fluorite => "fluorite",
        }
    }

    /// Fractional sites of the conventional cubic cell as `(template label, position)`.
    fn basis(&self) -> Vec<(&'static str, [f64; 3])> {
        match self {
            Self::Rocksalt => {
                let mut sites: Vec<_> = FCC.iter().map(|&p| ("Mg", p)).collect();
                sites.extend(
                    FCC.iter()
                        .map(|p| (ANION_ELEMENT, [(p[0] + 0.5) % 1.0, p[1], p[2]])),
                );
                sites
            }
            Self::Perovskite => vec![
                ("Sr", [0.0, 0.0, 0.0]),
                ("Ti", [0.5, 0.5, 0.5]),
                (ANION_ELEMENT, [0.5, 0.5, 0.0]),
                (ANION_ELEMENT, [0.5, 0.0, 0.5]),
                (ANION_ELEMENT, [0.0, 0.5, 0.5]),
            ],
            Self::Fluorite => {
                let mut sites: Vec<_> = FCC.iter().map(|&p| ("Ce", p)).collect();
                for x in [0.25, 0.75] {
                    for y in [0.25, 0.75] {
                        for z in [0.25, 0.75] {
                            sites.push((ANION_ELEMENT, [x, y, z]));
                        }
                    }
                }
                sites
            }
        }
    }

    /// Conventional cubic cell with lattice constant `a`.
    pub fn unit_cell(&self, a: f64) -> Result<Structure, StructureError> {
        let (symbols, positions) = self
            .basis()
            .into_iter()
            .map(|(label, f)| (label.to_string(), Point3::new(f[0] * a, f[1] * a, f[2] * a)))
            .unzip();
        Structure::new(
            symbols,
            positions,
            Matrix3::from_diagonal_element(a),
            [true; 3],
        )
    }
}

impl fmt::Display for CrystalPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CrystalPattern {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| BuildError::UnknownPattern(s.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(
        "Pattern '{0}' is not recognized. Available patterns: rocksalt, perovskite, fluorite"
    )]
    UnknownPattern(String),
    #[error("Cation composition must contain at least one species with a positive fraction")]
    EmptyComposition,
    #[error("Dopant fraction must lie in (0, 1), got {0}")]
    InvalidDopantFraction(f64),
    #[error(
        "Cannot place {species} at fraction {fraction} on {sites} cation sites; adjust the composition or use a different supercell"
    )]
    NonIntegralComposition {
        species: String,
        fraction: f64,
        sites: usize,
    },
    #[error(transparent)]
    Structure(#[from] StructureError),
}

/// Parameters of a bulk high-entropy oxide lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkSpec {
    pub pattern: CrystalPattern,
    pub cation_composition: BTreeMap<String, f64>,
    pub lattice_constant: f64,
    pub supercell: [usize; 3],
    pub dopant: Option<(String, f64)>,
}

impl BulkSpec {
    pub fn new(pattern: CrystalPattern, cation_composition: BTreeMap<String, f64>) -> Self {
        Self {
            pattern,
            cation_composition,
            lattice_constant: 5.0,
            supercell: [1, 1, 1],
            dopant: None,
        }
    }

    /// Cation fractions normalised to one, with the dopant (if any) taking its
    /// share from every host cation proportionally.
    pub fn normalized_composition(&self) -> Result<BTreeMap<String, f64>, BuildError> {
        let total: f64 = self.cation_composition.values().filter(|v| **v > 0.0).sum();
        if total <= 0.0 {
            return Err(BuildError::EmptyComposition);
        }
        let mut fractions: BTreeMap<String, f64> = self
            .cation_composition
            .iter()
            .filter(|(_, v)| **v > 0.0)
            .map(|(k, v)| (k.clone(), v / total))
            .collect();

        if let Some((dopant, fraction)) = &self.dopant {
            if !(*fraction > 0.0 && *fraction < 1.0) {
                return Err(BuildError::InvalidDopantFraction(*fraction));
            }
            for value in fractions.values_mut() {
                *value *= 1.0 - fraction;
            }
            *fractions.entry(dopant.clone()).or_insert(0.0) += fraction;
        }
        Ok(fractions)
    }
}

/// Builds a bulk oxide lattice with a randomly ordered cation sublattice.
///
/// The conventional cell of `spec.pattern` is tiled by `spec.supercell`, every
/// non-anion site is treated as a cation site, and cations are drawn without
/// replacement so that the requested fractions are met exactly. Sites are sorted
/// by label in the returned structure.
///
/// # Errors
///
/// Returns [`BuildError::NonIntegralComposition`] if a fraction does not map to a
/// whole number of cation sites.
#[instrument(level = "debug", skip_all, fields(pattern = %spec.pattern))]
pub fn bulk_heo(spec: &BulkSpec, rng: &mut (impl Rng + ?Sized)) -> Result<Structure, BuildError> {
    let fractions = spec.normalized_composition()?;
    let base = spec
        .pattern
        .unit_cell(spec.lattice_constant)?
        .repeat(spec.supercell)?;

    let cation_sites: Vec<usize> = base
        .symbols()
        .iter()
        .enumerate()
        .filter(|(_, s)| s.as_str() != ANION_ELEMENT)
        .map(|(i, _)| i)
        .collect();
    let num_sites = cation_sites.len();

    let mut cations = Vec::with_capacity(num_sites);
    for (species, fraction) in &fractions {
        let exact = num_sites as f64 * fraction;
        let count = exact.round();
        if (exact - count).abs() > FRACTION_TOLERANCE {
            return Err(BuildError::NonIntegralComposition {
                species: species.clone(),
                fraction: *fraction,
                sites: num_sites,
            });
        }
        cations.extend(std::iter::repeat_n(species.clone(), count as usize));
    }
    cations.shuffle(rng);

    let (mut symbols, positions, cell, pbc, info) = base.into_parts();
    for (site, cation) in cation_sites.into_iter().zip(cations) {
        symbols[site] = cation;
    }
    let mut structure = Structure::new(symbols, positions, cell, pbc)?.with_info(info);
    structure.sort_by_symbol();

    debug!(sites = structure.len(), cation_sites = num_sites, "Built bulk lattice.");
    Ok(structure)
}
