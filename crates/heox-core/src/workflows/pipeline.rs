use super::records::RecordWriter;
use crate::engine::config::LoggingConfig;
use crate::engine::energy::{self, EnergyMode};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::protocol::Protocol;
use crate::engine::state::{PropertiesUpdate, State};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Log fields always available, with their column titles.
pub const BASE_LOG_FIELDS: [(&str, &str); 4] = [
    ("properties.step", "Step"),
    ("properties.global_step", "Global Step"),
    ("properties.energy", "Potential Energy"),
    ("properties.temperature", "Temperature"),
];

const LOG_TARGET: &str = "heox::pipeline";

/// Counters of one protocol at the end of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolMetrics {
    pub name: String,
    pub num_invokes: u64,
    pub counters: Vec<(&'static str, u64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub steps: u64,
    pub final_step: u64,
    pub final_global_step: u64,
    pub final_energy: Option<f64>,
    pub protocols: Vec<ProtocolMetrics>,
}

/// Composes Monte Carlo protocols into one time-stepped simulation.
///
/// The pipeline owns the [`State`], the ordered protocol list and the random
/// source. Each outer step evolves every protocol in list order, so a protocol
/// sees the state exactly as the previous one left it, then optionally logs a
/// record and a trajectory frame, and finally advances `properties.global_step`.
pub struct Pipeline<'a> {
    state: State,
    protocols: Vec<Box<dyn Protocol>>,
    logging: LoggingConfig,
    rng: ChaCha8Rng,
    reporter: ProgressReporter<'a>,
    records: Option<RecordWriter>,
    initialized: bool,
}

impl<'a> Pipeline<'a> {
    /// Creates a pipeline after checking protocol names and log fields.
    ///
    /// The random source is seeded from system entropy; use
    /// [`Pipeline::with_seed`] for reproducible runs.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] if two protocols share a name or a
    /// requested log field is not recognized.
    pub fn new(
        state: State,
        protocols: Vec<Box<dyn Protocol>>,
        logging: LoggingConfig,
    ) -> Result<Self, EngineError> {
        let mut names = HashSet::new();
        for protocol in &protocols {
            if !names.insert(protocol.name().to_string()) {
                return Err(EngineError::Validation(format!(
                    "Duplicate protocol name '{}'. Every protocol needs a unique name.",
                    protocol.name()
                )));
            }
        }

        let available = available_fields(&protocols);
        if let Some(field) = logging.fields.iter().find(|f| !available.contains(f)) {
            return Err(EngineError::Validation(format!(
                "Invalid logging field '{}'. Available options are: {}",
                field,
                available.join(", ")
            )));
        }

        Ok(Self {
            state,
            protocols,
            logging,
            rng: ChaCha8Rng::from_entropy(),
            reporter: ProgressReporter::new(),
            records: None,
            initialized: false,
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn with_reporter(mut self, reporter: ProgressReporter<'a>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn into_state(self) -> State {
        self.state
    }

    pub fn protocols(&self) -> &[Box<dyn Protocol>] {
        &self.protocols
    }

    pub fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    /// Tab-joined column titles of the configured log fields.
    pub fn header(&self) -> String {
        self.columns().join("\t")
    }

    fn columns(&self) -> Vec<String> {
        self.logging
            .fields
            .iter()
            .map(|field| {
                BASE_LOG_FIELDS
                    .iter()
                    .find(|(name, _)| *name == field.as_str())
                    .map_or_else(|| field.clone(), |(_, title)| title.to_string())
            })
            .collect()
    }

    /// Prepares the run: initializes every protocol in list order, caches the
    /// starting energy if none is known, removes a stale trajectory file and
    /// starts the record file.
    #[instrument(skip_all, name = "pipeline_initialize")]
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        for protocol in self.protocols.iter_mut() {
            protocol.initialize(&self.state)?;
        }

        if self.state.energy().is_none() && !self.protocols.is_empty() {
            let e = energy::calculate(&self.state, EnergyMode::Instantaneous)?;
            self.state
                .update(None, Some(PropertiesUpdate::new().energy(Some(e))))?;
            debug!(energy = e, "Cached starting energy.");
        }

        if let Some(path) = &self.logging.trajectory {
            if remove_if_exists(path)? {
                self.reporter.report(Progress::Message(format!(
                    "Replaced existing trajectory file {}",
                    path.display()
                )));
            }
        }

        if !self.logging.fields.is_empty() {
            let header = self.header();
            info!(target: LOG_TARGET, "{}", header);
            self.reporter.report(Progress::Header(header));
        }
        if let Some(path) = &self.logging.records {
            self.records = Some(RecordWriter::create(path, self.columns())?);
        }

        info!(
            protocols = self.protocols.len(),
            sites = self.state.len(),
            "Pipeline initialized."
        );
        self.initialized = true;
        Ok(())
    }

    /// Runs `steps` outer iterations, initializing first if needed.
    ///
    /// # Errors
    ///
    /// Stops at the first protocol or output failure. The state is consistent
    /// at that point; the failed move has been reverted.
    #[instrument(skip_all, name = "pipeline_run", fields(steps = steps))]
    pub fn run(&mut self, steps: u64) -> Result<RunSummary, EngineError> {
        if !self.initialized {
            self.initialize()?;
        }
        self.reporter.report(Progress::RunStart { total_steps: steps });

        for _ in 0..steps {
            let outer = self.state.global_step();
            for protocol in self.protocols.iter_mut() {
                protocol.evolve(&mut self.state, &mut self.rng)?;
            }
            if self.logging.is_enabled() && outer % self.logging.interval as u64 == 0 {
                self.log()?;
            }
            self.state
                .update(None, Some(PropertiesUpdate::new().global_step(outer + 1)))?;
            self.reporter
                .report(Progress::StepFinish { global_step: outer });
        }

        self.reporter.report(Progress::RunFinish);
        let summary = self.summary(steps);
        info!(
            steps,
            final_energy = ?summary.final_energy,
            "Pipeline run finished."
        );
        Ok(summary)
    }

    /// Emits one log record for the current state and appends a trajectory frame
    /// if a trajectory path is configured.
    pub fn log(&mut self) -> Result<(), EngineError> {
        if !self.logging.fields.is_empty() {
            let values = self
                .logging
                .fields
                .iter()
                .map(|field| self.field_value(field))
                .collect::<Result<Vec<_>, _>>()?;
            let line = values.join("\t");
            info!(target: LOG_TARGET, "{}", line);
            if let Some(records) = self.records.as_mut() {
                records.write(&values)?;
            }
            self.reporter.report(Progress::Record(line));
        }
        if let Some(path) = &self.logging.trajectory {
            self.state.write_trajectory(path)?;
        }
        Ok(())
    }

    fn field_value(&self, field: &str) -> Result<String, EngineError> {
        if BASE_LOG_FIELDS.iter().any(|(name, _)| *name == field) {
            return Ok(self.state.get(field)?.to_string());
        }
        self.protocols
            .iter()
            .find_map(|p| p.metric(field))
            .map(|value| value.to_string())
            .ok_or_else(|| EngineError::InvalidOption {
                option: field.to_string(),
                reason: "no protocol exposes this field".to_string(),
            })
    }

    fn summary(&self, steps: u64) -> RunSummary {
        RunSummary {
            steps,
            final_step: self.state.step(),
            final_global_step: self.state.global_step(),
            final_energy: self.state.energy(),
            protocols: self
                .protocols
                .iter()
                .map(|p| ProtocolMetrics {
                    name: p.name().to_string(),
                    num_invokes: p.schedule().num_invokes,
                    counters: p.metrics(),
                })
                .collect(),
        }
    }
}

impl std::fmt::Debug for Pipeline<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("state", &self.state)
            .field("protocols", &self.protocols)
            .field("logging", &self.logging)
            .field("initialized", &self.initialized)
            .finish()
    }
}

fn available_fields(protocols: &[Box<dyn Protocol>]) -> Vec<String> {
    BASE_LOG_FIELDS
        .iter()
        .map(|(name, _)| name.to_string())
        .chain(protocols.iter().flat_map(|p| p.log_fields()))
        .collect()
}

/// Returns whether a file was actually removed.
fn remove_if_exists(path: &Path) -> Result<bool, EngineError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
