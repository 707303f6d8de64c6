use super::seeded_rng;
use crate::cli::RunArgs;
use crate::config::{
    PartialSimulationConfig, PotentialSource, ProtocolConfig, SimulationConfig, StructureSource,
};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use heox::core::build::bulk::bulk_heo;
use heox::core::forcefield::pair::PairPotential;
use heox::core::forcefield::params::PairParams;
use heox::core::io::traits::StructureFile;
use heox::core::io::xyz::XyzFile;
use heox::core::models::structure::Structure;
use heox::engine::mc::{AtomSwapMonteCarlo, OnLatticeGrandCanonicalMonteCarlo};
use heox::engine::progress::ProgressReporter;
use heox::engine::protocol::Protocol;
use heox::engine::state::State;
use heox::workflows::pipeline::{Pipeline, RunSummary};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub fn run(args: RunArgs, echo_records: bool) -> Result<()> {
    let partial_config = PartialSimulationConfig::from_file(&args.config)?;
    let base_dir = args.config.parent().unwrap_or(Path::new("."));
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args, base_dir)?;

    let params = load_potential(&config.potential)?;
    info!(
        "Loaded {} pair interactions (cutoff {:.2} Å)",
        params.len(),
        params.cutoff
    );
    let structure = load_structure(&config)?;
    info!("Starting configuration has {} sites", structure.len());

    let state = State::from_structure(structure, Some(Arc::new(PairPotential::new(params))))
        .with_temperature(config.temperature);

    if let Some(trajectory) = &config.logging.trajectory {
        if trajectory.exists() {
            warn!(
                "Trajectory file {:?} already exists and will be replaced.",
                trajectory
            );
        }
    }

    let progress_handler = CliProgressHandler::new(echo_records);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let mut pipeline = Pipeline::new(state, build_protocols(&config), config.logging.clone())?
        .with_reporter(reporter);
    if let Some(seed) = config.seed {
        pipeline = pipeline.with_seed(seed);
    }

    println!("Starting hybrid Monte Carlo run ({} steps)...", config.steps);
    let summary = pipeline.run(config.steps)?;
    print_summary(&summary);

    if let Some(output) = &args.output {
        let structure = pipeline.state().to_structure();
        XyzFile::write_to_path(&structure, output).map_err(|e| CliError::FileParsing {
            path: output.clone(),
            source: e.into(),
        })?;
        println!("✓ Final configuration written to: {}", output.display());
    }
    Ok(())
}

fn load_potential(source: &PotentialSource) -> Result<PairParams> {
    match source {
        PotentialSource::File(path) => {
            info!("Loading pair potential from {:?}", path);
            PairParams::load(path).map_err(|e| CliError::FileParsing {
                path: path.clone(),
                source: e.into(),
            })
        }
        PotentialSource::Inline(table) => PairParams::from_toml_str(table)
            .map_err(|e| CliError::Config(format!("[potential]: {}", e))),
    }
}

fn load_structure(config: &SimulationConfig) -> Result<Structure> {
    match &config.structure {
        StructureSource::File(path) => {
            info!("Loading input structure from {:?}", path);
            let parse_error = |source: anyhow::Error| CliError::FileParsing {
                path: path.clone(),
                source,
            };
            XyzFile::read_last_from_path(path)
                .map_err(|e| parse_error(e.into()))?
                .ok_or_else(|| parse_error(anyhow::anyhow!("file contains no frames")))
        }
        StructureSource::Generated(spec) => {
            info!("Generating {} lattice", spec.pattern);
            Ok(bulk_heo(spec, &mut seeded_rng(config.seed))?)
        }
    }
}

fn build_protocols(config: &SimulationConfig) -> Vec<Box<dyn Protocol>> {
    config
        .protocols
        .iter()
        .map(|p| -> Box<dyn Protocol> {
            match p {
                ProtocolConfig::AtomSwap(c) => Box::new(AtomSwapMonteCarlo::new(c.clone())),
                ProtocolConfig::GrandCanonical(c) => {
                    Box::new(OnLatticeGrandCanonicalMonteCarlo::new(c.clone()))
                }
            }
        })
        .collect()
}

fn print_summary(summary: &RunSummary) {
    let energy = summary
        .final_energy
        .map(|e| format!("{:.6} eV", e))
        .unwrap_or_else(|| "n/a".to_string());
    println!(
        "✓ Completed {} steps (global step {}), final energy {}",
        summary.steps, summary.final_global_step, energy
    );
    for metrics in &summary.protocols {
        let counters = metrics
            .counters
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "  {}: {} invocations ({})",
            metrics.name, metrics.num_invokes, counters
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heox::core::models::species::composition;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    const POTENTIAL: &str = r#"
cutoff = 4.0

[[pairs]]
species = ["Mg", "O"]
r-min = 2.1
well-depth = 0.5
gamma = 12.0

[[pairs]]
species = ["Zn", "O"]
r-min = 2.15
well-depth = 0.45
gamma = 12.0

[[pairs]]
species = ["Mg", "Mg"]
r-min = 3.0
well-depth = 0.01

[[pairs]]
species = ["Mg", "Zn"]
r-min = 3.0
well-depth = 0.01

[[pairs]]
species = ["Zn", "Zn"]
r-min = 3.0
well-depth = 0.01

[[pairs]]
species = ["O", "O"]
r-min = 3.0
well-depth = 0.02
"#;

    fn write_config(dir: &Path, records: &Path) -> PathBuf {
        fs::write(dir.join("pairs.toml"), POTENTIAL).unwrap();
        let config = format!(
            r#"
seed = 3
steps = 10
temperature = 1000.0

[structure]
pattern = "rocksalt"
lattice-constant = 4.2
supercell = [2, 2, 2]
composition = {{ Mg = 0.5, Zn = 0.5 }}

[potential]
path = "pairs.toml"

[[protocols]]
type = "atom-swap"
species = ["Mg", "Zn"]

[logging]
fields = ["properties.global_step", "properties.energy", "module.asmc.accepted_swaps"]
records = '{}'
"#,
            records.display()
        );
        let path = dir.join("sim.toml");
        fs::write(&path, config).unwrap();
        path
    }

    fn run_args(config: PathBuf, output: PathBuf) -> RunArgs {
        RunArgs {
            config,
            output: Some(output),
            steps: None,
            seed: None,
            trajectory: None,
        }
    }

    #[test]
    fn run_writes_records_and_final_configuration() {
        let dir = tempdir().unwrap();
        let records = dir.path().join("log.tsv");
        let output = dir.path().join("final.xyz");
        let config = write_config(dir.path(), &records);

        run(run_args(config, output.clone()), false).unwrap();

        let content = fs::read_to_string(&records).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 11);
        assert_eq!(
            lines[0],
            "Global Step\tPotential Energy\tmodule.asmc.accepted_swaps"
        );

        let last = XyzFile::read_last_from_path(&output).unwrap().unwrap();
        let counts = composition(last.symbols());
        assert_eq!(counts["Mg"], 16);
        assert_eq!(counts["Zn"], 16);
        assert_eq!(counts["O"], 32);
        assert_eq!(last.info.global_step, Some(10));
    }

    #[test]
    fn step_override_and_trajectory_override_apply() {
        let dir = tempdir().unwrap();
        let records = dir.path().join("log.tsv");
        let output = dir.path().join("final.xyz");
        let trajectory = dir.path().join("traj.xyz");
        let config = write_config(dir.path(), &records);

        let mut args = run_args(config, output);
        args.steps = Some(3);
        args.trajectory = Some(trajectory.clone());
        run(args, false).unwrap();

        let frames = XyzFile::read_frames_from_path(&trajectory).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(fs::read_to_string(&records).unwrap().lines().count(), 4);
    }

    #[test]
    fn existing_trajectory_is_replaced_not_extended() {
        let dir = tempdir().unwrap();
        let records = dir.path().join("log.tsv");
        let trajectory = dir.path().join("traj.xyz");
        let config = write_config(dir.path(), &records);

        let mut first = run_args(config.clone(), dir.path().join("first.xyz"));
        first.steps = Some(4);
        first.trajectory = Some(trajectory.clone());
        run(first, false).unwrap();
        assert_eq!(XyzFile::read_frames_from_path(&trajectory).unwrap().len(), 4);

        let mut second = run_args(config, dir.path().join("second.xyz"));
        second.steps = Some(2);
        second.trajectory = Some(trajectory.clone());
        run(second, false).unwrap();

        let frames = XyzFile::read_frames_from_path(&trajectory).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].info.global_step, Some(0));
    }

    #[test]
    fn missing_potential_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let records = dir.path().join("log.tsv");
        let config = write_config(dir.path(), &records);
        fs::remove_file(dir.path().join("pairs.toml")).unwrap();

        let result = run(run_args(config, dir.path().join("final.xyz")), false);
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }

    #[test]
    fn input_structure_file_is_used_as_starting_configuration() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("pairs.toml"), POTENTIAL).unwrap();
        let start = dir.path().join("start.xyz");
        let structure = bulk_heo(
            &{
                let mut spec = heox::core::build::bulk::BulkSpec::new(
                    heox::core::build::bulk::CrystalPattern::Rocksalt,
                    [("Mg".to_string(), 1.0)].into_iter().collect(),
                );
                spec.lattice_constant = 4.2;
                spec
            },
            &mut seeded_rng(Some(0)),
        )
        .unwrap();
        XyzFile::write_to_path(&structure, &start).unwrap();

        let config = dir.path().join("sim.toml");
        fs::write(
            &config,
            r#"
steps = 2
temperature = 500.0

[structure]
input = "start.xyz"

[potential]
path = "pairs.toml"
"#,
        )
        .unwrap();
        let output = dir.path().join("final.xyz");
        run(run_args(config, output.clone()), false).unwrap();

        let last = XyzFile::read_last_from_path(&output).unwrap().unwrap();
        assert_eq!(last.len(), 8);
        assert_eq!(last.info.global_step, Some(2));
    }
}
