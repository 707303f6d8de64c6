use super::energy::EnergyMode;
use super::error::EngineError;
use crate::core::forcefield::evaluator::PotentialEnergyEvaluator;
use crate::core::io::traits::StructureFile;
use crate::core::io::xyz::XyzFile;
use crate::core::models::structure::{Structure, StructureInfo};
use nalgebra::{Matrix3, Point3};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Shared handle to the externally owned energy evaluator.
pub type EvaluatorHandle = Arc<dyn PotentialEnergyEvaluator>;

pub const SYSTEM_NAMESPACE: &str = "system";
pub const PROPERTIES_NAMESPACE: &str = "properties";

pub const SYSTEM_FIELDS: [&str; 5] = ["positions", "types", "cell", "pbc", "calculator"];
pub const PROPERTY_FIELDS: [&str; 4] = ["step", "global_step", "temperature", "energy"];

#[derive(Debug, Clone)]
struct SystemData {
    positions: Vec<Point3<f64>>,
    types: Vec<String>,
    cell: Matrix3<f64>,
    pbc: [bool; 3],
    calculator: Option<EvaluatorHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Properties {
    step: u64,
    global_step: u64,
    temperature: f64,
    energy: Option<f64>,
    energy_mode: EnergyMode,
}

/// The single mutable object a simulation run revolves around.
///
/// `State` is split into two namespaces. `system` holds the lattice (site
/// positions, per-site labels, cell, periodicity) together with the evaluator
/// handle, and `properties` holds the scalar bookkeeping (`step`,
/// `global_step`, `temperature` and the cached `energy`).
///
/// Reads go through the typed accessors or the path-based [`State::get`];
/// writes go exclusively through [`State::update`], which validates the merged
/// result before touching anything. A cached energy is dropped whenever the
/// configuration changes without a new energy being supplied in the same call,
/// so a present energy always belongs to the stored configuration. The cache
/// also records which evaluator entry point produced it; see
/// [`State::cached_energy`].
#[derive(Debug, Clone)]
pub struct State {
    system: SystemData,
    properties: Properties,
}

/// A value resolved by [`State::get`].
#[derive(Debug, Clone, Copy)]
pub enum StateValue<'a> {
    Positions(&'a [Point3<f64>]),
    Types(&'a [String]),
    Cell(&'a Matrix3<f64>),
    Pbc([bool; 3]),
    Calculator(Option<&'a EvaluatorHandle>),
    Counter(u64),
    Scalar(f64),
    Energy(Option<f64>),
}

impl fmt::Display for StateValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positions(p) => write!(f, "<{} positions>", p.len()),
            Self::Types(t) => write!(f, "{}", t.join(",")),
            Self::Cell(c) => write!(
                f,
                "{} {} {} {} {} {} {} {} {}",
                c[(0, 0)],
                c[(0, 1)],
                c[(0, 2)],
                c[(1, 0)],
                c[(1, 1)],
                c[(1, 2)],
                c[(2, 0)],
                c[(2, 1)],
                c[(2, 2)]
            ),
            Self::Pbc(p) => write!(f, "{:?}", p),
            Self::Calculator(Some(c)) => write!(f, "{:?}", c),
            Self::Calculator(None) => f.write_str("none"),
            Self::Counter(n) => write!(f, "{}", n),
            Self::Scalar(x) => write!(f, "{}", x),
            Self::Energy(Some(e)) => write!(f, "{}", e),
            Self::Energy(None) => f.write_str("nan"),
        }
    }
}

/// Partial replacement of the `system` namespace.
///
/// `relabel` entries are applied after a wholesale `types` replacement.
#[derive(Default, Clone)]
pub struct SystemUpdate {
    pub positions: Option<Vec<Point3<f64>>>,
    pub types: Option<Vec<String>>,
    pub relabel: Vec<(usize, String)>,
    pub cell: Option<Matrix3<f64>>,
    pub pbc: Option<[bool; 3]>,
    pub calculator: Option<EvaluatorHandle>,
}

impl SystemUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn relabel(mut self, site: usize, label: impl Into<String>) -> Self {
        self.relabel.push((site, label.into()));
        self
    }

    pub fn positions(mut self, positions: Vec<Point3<f64>>) -> Self {
        self.positions = Some(positions);
        self
    }

    pub fn types(mut self, types: Vec<String>) -> Self {
        self.types = Some(types);
        self
    }

    pub fn cell(mut self, cell: Matrix3<f64>) -> Self {
        self.cell = Some(cell);
        self
    }

    pub fn pbc(mut self, pbc: [bool; 3]) -> Self {
        self.pbc = Some(pbc);
        self
    }

    pub fn calculator(mut self, calculator: EvaluatorHandle) -> Self {
        self.calculator = Some(calculator);
        self
    }

    fn changes_configuration(&self) -> bool {
        self.positions.is_some()
            || self.types.is_some()
            || !self.relabel.is_empty()
            || self.cell.is_some()
            || self.pbc.is_some()
            || self.calculator.is_some()
    }
}

/// Partial replacement of the `properties` namespace.
///
/// `energy: Some(None)` explicitly clears the cached energy. `energy_mode`
/// names the entry point that produced a supplied energy and defaults to
/// [`EnergyMode::Instantaneous`].
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PropertiesUpdate {
    pub step: Option<u64>,
    pub global_step: Option<u64>,
    pub temperature: Option<f64>,
    pub energy: Option<Option<f64>>,
    pub energy_mode: Option<EnergyMode>,
}

impl PropertiesUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: u64) -> Self {
        self.step = Some(step);
        self
    }

    pub fn global_step(mut self, global_step: u64) -> Self {
        self.global_step = Some(global_step);
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn energy(mut self, energy: Option<f64>) -> Self {
        self.energy = Some(energy);
        self
    }

    pub fn energy_mode(mut self, mode: EnergyMode) -> Self {
        self.energy_mode = Some(mode);
        self
    }
}

fn invalid_option(option: &str, reason: impl Into<String>) -> EngineError {
    EngineError::InvalidOption {
        option: option.to_string(),
        reason: reason.into(),
    }
}

impl State {
    pub fn new(
        positions: Vec<Point3<f64>>,
        types: Vec<String>,
        cell: Matrix3<f64>,
        pbc: [bool; 3],
        calculator: Option<EvaluatorHandle>,
    ) -> Result<Self, EngineError> {
        if positions.len() != types.len() {
            return Err(EngineError::Validation(format!(
                "{} positions given for {} site labels",
                positions.len(),
                types.len()
            )));
        }
        Ok(Self {
            system: SystemData {
                positions,
                types,
                cell,
                pbc,
                calculator,
            },
            properties: Properties {
                step: 0,
                global_step: 0,
                temperature: 0.0,
                energy: None,
                energy_mode: EnergyMode::Instantaneous,
            },
        })
    }

    /// Builds a state from an external structure, reading `step`,
    /// `global_step` and `temperature` from its metadata when present.
    ///
    /// A stored `energy` is only taken over when no evaluator is attached. With
    /// an evaluator the cache starts empty, since the frame may have been
    /// written under a different potential or energy mode.
    pub fn from_structure(structure: Structure, calculator: Option<EvaluatorHandle>) -> Self {
        let (types, positions, cell, pbc, info) = structure.into_parts();
        let energy = if calculator.is_some() {
            None
        } else {
            info.energy
        };
        Self {
            system: SystemData {
                positions,
                types,
                cell,
                pbc,
                calculator,
            },
            properties: Properties {
                step: info.step.unwrap_or(0),
                global_step: info.global_step.unwrap_or(0),
                temperature: info.temperature.unwrap_or(0.0),
                energy,
                energy_mode: EnergyMode::Instantaneous,
            },
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.properties.temperature = temperature;
        self
    }

    /// Converts back into the external representation, carrying the scalar
    /// properties as frame metadata.
    pub fn to_structure(&self) -> Structure {
        let info = StructureInfo {
            temperature: Some(self.properties.temperature),
            step: Some(self.properties.step),
            global_step: Some(self.properties.global_step),
            energy: self.properties.energy,
        };
        // Lengths are kept equal by every constructor and by `update`.
        Structure::from_trusted_parts(
            self.system.types.clone(),
            self.system.positions.clone(),
            self.system.cell,
            self.system.pbc,
        )
        .with_info(info)
    }

    /// Appends the current configuration as one frame to an extended-XYZ file.
    pub fn write_trajectory(&self, path: &Path) -> Result<(), EngineError> {
        XyzFile::append_to_path(&self.to_structure(), path)?;
        Ok(())
    }

    /// Resolves a `"<namespace>.<field>"` path.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidOption`] if the namespace is neither
    /// `system` nor `properties`, or the field does not exist in it.
    pub fn get(&self, path: &str) -> Result<StateValue<'_>, EngineError> {
        let Some((namespace, field)) = path.split_once('.') else {
            return Err(invalid_option(
                path,
                "expected a path of the form '<namespace>.<field>'",
            ));
        };
        match namespace {
            SYSTEM_NAMESPACE => self.get_system(path, field),
            PROPERTIES_NAMESPACE => self.get_property(path, field),
            other => Err(invalid_option(
                path,
                format!(
                    "unknown namespace '{}', expected '{}' or '{}'",
                    other, SYSTEM_NAMESPACE, PROPERTIES_NAMESPACE
                ),
            )),
        }
    }

    fn get_system(&self, path: &str, field: &str) -> Result<StateValue<'_>, EngineError> {
        let s = &self.system;
        Ok(match field {
            "positions" => StateValue::Positions(&s.positions),
            "types" => StateValue::Types(&s.types),
            "cell" => StateValue::Cell(&s.cell),
            "pbc" => StateValue::Pbc(s.pbc),
            "calculator" => StateValue::Calculator(s.calculator.as_ref()),
            _ => {
                return Err(invalid_option(
                    path,
                    format!("valid system fields are: {}", SYSTEM_FIELDS.join(", ")),
                ));
            }
        })
    }

    fn get_property(&self, path: &str, field: &str) -> Result<StateValue<'_>, EngineError> {
        let p = &self.properties;
        Ok(match field {
            "step" => StateValue::Counter(p.step),
            "global_step" => StateValue::Counter(p.global_step),
            "temperature" => StateValue::Scalar(p.temperature),
            "energy" => StateValue::Energy(p.energy),
            _ => {
                return Err(invalid_option(
                    path,
                    format!("valid properties are: {}", PROPERTY_FIELDS.join(", ")),
                ));
            }
        })
    }

    /// Merges partial updates into the two namespaces.
    ///
    /// The merged result is validated first and applied only if every check
    /// passes, so a failed update leaves the state untouched. The system part is
    /// applied before the properties part. Changing the configuration without
    /// supplying an energy clears the cached energy.
    pub fn update(
        &mut self,
        system: Option<SystemUpdate>,
        properties: Option<PropertiesUpdate>,
    ) -> Result<(), EngineError> {
        if let Some(update) = &system {
            self.validate_system(update)?;
        }
        if let Some(update) = &properties {
            self.validate_properties(update)?;
        }

        if let Some(update) = system {
            let changed = update.changes_configuration();
            let s = &mut self.system;
            if let Some(positions) = update.positions {
                s.positions = positions;
            }
            if let Some(types) = update.types {
                s.types = types;
            }
            for (site, label) in update.relabel {
                s.types[site] = label;
            }
            if let Some(cell) = update.cell {
                s.cell = cell;
            }
            if let Some(pbc) = update.pbc {
                s.pbc = pbc;
            }
            if let Some(calculator) = update.calculator {
                s.calculator = Some(calculator);
            }
            if changed {
                self.properties.energy = None;
            }
        }

        if let Some(update) = properties {
            let p = &mut self.properties;
            if let Some(step) = update.step {
                p.step = step;
            }
            if let Some(global_step) = update.global_step {
                p.global_step = global_step;
            }
            if let Some(temperature) = update.temperature {
                p.temperature = temperature;
            }
            if let Some(energy) = update.energy {
                p.energy = energy;
                p.energy_mode = update.energy_mode.unwrap_or_default();
            }
        }
        Ok(())
    }

    fn validate_system(&self, update: &SystemUpdate) -> Result<(), EngineError> {
        let num_positions = update
            .positions
            .as_ref()
            .map_or(self.system.positions.len(), Vec::len);
        let num_types = update
            .types
            .as_ref()
            .map_or(self.system.types.len(), Vec::len);
        if num_positions != num_types {
            return Err(invalid_option(
                "system",
                format!(
                    "update would leave {} positions for {} site labels",
                    num_positions, num_types
                ),
            ));
        }
        if let Some((site, _)) = update.relabel.iter().find(|(site, _)| *site >= num_types) {
            return Err(invalid_option(
                "system.types",
                format!("site index {} is out of range for {} sites", site, num_types),
            ));
        }
        Ok(())
    }

    fn validate_properties(&self, update: &PropertiesUpdate) -> Result<(), EngineError> {
        if let Some(step) = update.step {
            if step < self.properties.step {
                return Err(invalid_option(
                    "properties.step",
                    format!("cannot decrease from {} to {}", self.properties.step, step),
                ));
            }
        }
        if let Some(global_step) = update.global_step {
            if global_step < self.properties.global_step {
                return Err(invalid_option(
                    "properties.global_step",
                    format!(
                        "cannot decrease from {} to {}",
                        self.properties.global_step, global_step
                    ),
                ));
            }
        }
        if let Some(temperature) = update.temperature {
            if !(temperature.is_finite() && temperature >= 0.0) {
                return Err(invalid_option(
                    "properties.temperature",
                    format!("must be a non-negative number, got {}", temperature),
                ));
            }
        }
        if update.energy_mode.is_some() && update.energy.is_none() {
            return Err(invalid_option(
                "properties.energy",
                "an energy mode was given without an energy",
            ));
        }
        if let Some(Some(energy)) = update.energy {
            if !energy.is_finite() {
                return Err(invalid_option(
                    "properties.energy",
                    format!("must be finite, got {}", energy),
                ));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.system.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.system.types.is_empty()
    }

    pub fn types(&self) -> &[String] {
        &self.system.types
    }

    pub fn positions(&self) -> &[Point3<f64>] {
        &self.system.positions
    }

    pub fn cell(&self) -> &Matrix3<f64> {
        &self.system.cell
    }

    pub fn pbc(&self) -> [bool; 3] {
        self.system.pbc
    }

    pub fn step(&self) -> u64 {
        self.properties.step
    }

    pub fn global_step(&self) -> u64 {
        self.properties.global_step
    }

    pub fn temperature(&self) -> f64 {
        self.properties.temperature
    }

    pub fn energy(&self) -> Option<f64> {
        self.properties.energy
    }

    /// The entry point that produced the cached energy, if one is cached.
    pub fn energy_mode(&self) -> Option<EnergyMode> {
        self.properties
            .energy
            .map(|_| self.properties.energy_mode)
    }

    /// The cached energy, but only if it was produced with `mode`.
    pub fn cached_energy(&self, mode: EnergyMode) -> Option<f64> {
        self.properties
            .energy
            .filter(|_| self.properties.energy_mode == mode)
    }

    /// The attached evaluator.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] if no evaluator has been attached.
    pub fn evaluator(&self) -> Result<&dyn PotentialEnergyEvaluator, EngineError> {
        self.system.calculator.as_deref().ok_or_else(|| {
            EngineError::Validation("no energy evaluator is attached to the state".to_string())
        })
    }
}
