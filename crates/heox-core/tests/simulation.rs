use heox::core::build::bulk::{BulkSpec, CrystalPattern, bulk_heo};
use heox::core::forcefield::evaluator::{EvaluatorError, PotentialEnergyEvaluator};
use heox::core::forcefield::pair::PairPotential;
use heox::core::forcefield::params::{PairForm, PairParams};
use heox::core::io::traits::StructureFile;
use heox::core::io::xyz::XyzFile;
use heox::core::models::species::{composition, indices_where, is_vacancy};
use heox::core::models::structure::Structure;
use heox::engine::config::{
    AtomSwapConfigBuilder, GrandCanonicalConfigBuilder, LoggingConfig, LoggingConfigBuilder,
    VacancyTracking,
};
use heox::engine::energy::EnergyMode;
use heox::engine::mc::{AtomSwapMonteCarlo, OnLatticeGrandCanonicalMonteCarlo};
use heox::engine::protocol::Protocol;
use heox::engine::state::{PropertiesUpdate, State};
use heox::workflows::pipeline::Pipeline;
use nalgebra::{Matrix3, Point3};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::tempdir;

/// Penalises neighbouring sites (in index order) with different labels.
#[derive(Debug, Default)]
struct ChainEvaluator {
    calls: AtomicUsize,
}

impl PotentialEnergyEvaluator for ChainEvaluator {
    fn energy(&self, s: &Structure) -> Result<f64, EvaluatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let symbols = s.symbols();
        let mixed = symbols.windows(2).filter(|w| w[0] != w[1]).count();
        Ok(0.02 * mixed as f64 - 0.1 * symbols.len() as f64)
    }

    fn relaxed_energy(&self, s: &Structure, _: f64) -> Result<f64, EvaluatorError> {
        self.energy(s)
    }
}

fn chain_state(labels: &[&str], evaluator: Arc<dyn PotentialEnergyEvaluator>) -> State {
    State::new(
        (0..labels.len())
            .map(|i| Point3::new(i as f64 * 2.0, 0.0, 0.0))
            .collect(),
        labels.iter().map(|s| s.to_string()).collect(),
        Matrix3::from_diagonal_element(2.0 * labels.len() as f64),
        [true; 3],
        Some(evaluator),
    )
    .unwrap()
    .with_temperature(600.0)
}

fn swap_protocol(species: &[&str], invoke_every: usize, steps_per_invoke: usize) -> AtomSwapMonteCarlo {
    AtomSwapMonteCarlo::new(
        AtomSwapConfigBuilder::new()
            .temperature(600.0)
            .species(species.iter().copied())
            .invoke_every(invoke_every)
            .steps_per_invoke(steps_per_invoke)
            .build()
            .unwrap(),
    )
}

fn gcmc_protocol(species: &str, mu: f64) -> OnLatticeGrandCanonicalMonteCarlo {
    OnLatticeGrandCanonicalMonteCarlo::new(
        GrandCanonicalConfigBuilder::new()
            .temperature(600.0)
            .chemical_potential(species, mu)
            .build()
            .unwrap(),
    )
}

fn counter(summary_counters: &[(&'static str, u64)], name: &str) -> u64 {
    summary_counters
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| *v)
        .unwrap()
}

#[test]
fn swap_run_counts_every_attempt_and_conserves_composition() {
    let labels = ["A", "A", "A", "A", "B", "B", "B", "B"];
    let state = chain_state(&labels, Arc::new(ChainEvaluator::default()));
    let mut pipeline = Pipeline::new(
        state,
        vec![Box::new(swap_protocol(&["A", "B"], 1, 1))],
        LoggingConfig::default(),
    )
    .unwrap()
    .with_seed(2024);

    let summary = pipeline.run(50).unwrap();
    let metrics = &summary.protocols[0];
    assert_eq!(
        counter(&metrics.counters, "accepted_swaps") + counter(&metrics.counters, "rejected_swaps"),
        50
    );
    assert_eq!(metrics.num_invokes, 50);

    let counts = composition(pipeline.state().types());
    assert_eq!(counts, BTreeMap::from([("A".to_string(), 4), ("B".to_string(), 4)]));
}

#[test]
fn cached_energy_tracks_configuration_throughout_run() {
    let labels = ["A", "B", "A", "B", "A", "B"];
    let evaluator = Arc::new(ChainEvaluator::default());
    let state = chain_state(&labels, evaluator.clone());
    let mut pipeline = Pipeline::new(
        state,
        vec![Box::new(swap_protocol(&["A", "B"], 1, 2))],
        LoggingConfig::default(),
    )
    .unwrap()
    .with_seed(5);
    pipeline.run(30).unwrap();

    let state = pipeline.state();
    let recomputed = evaluator.energy(&state.to_structure()).unwrap();
    assert_eq!(state.energy(), Some(recomputed));
}

#[test]
fn gcmc_first_step_without_vacancies() {
    for seed in 0..32 {
        let evaluator = Arc::new(ChainEvaluator::default());
        let mut state = chain_state(&["Mg", "O", "Mg", "O"], evaluator.clone());
        let mut protocol = gcmc_protocol("O", 0.0);
        protocol.initialize(&state).unwrap();
        assert!(protocol.vacant_sites().is_empty());

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        protocol.step(&mut state, &mut rng).unwrap();

        let insertions = protocol.accepted_insertions() + protocol.rejected_insertions();
        let removals = protocol.accepted_removals() + protocol.rejected_removals();
        assert_eq!(insertions + removals, 1);
        if insertions == 1 {
            assert_eq!(protocol.rejected_insertions(), 1);
            assert_eq!(evaluator.calls.load(Ordering::SeqCst), 0);
        } else {
            assert!(evaluator.calls.load(Ordering::SeqCst) > 0);
        }
    }
}

#[test]
fn scheduling_matches_invoke_cadence_for_each_protocol() {
    let labels = ["Mg", "Zn", "O", "Mg", "Zn", "O", "Mg", "Zn"];
    let state = chain_state(&labels, Arc::new(ChainEvaluator::default()));
    let protocols: Vec<Box<dyn Protocol>> = vec![
        Box::new(swap_protocol(&["Mg", "Zn"], 2, 3)),
        Box::new(OnLatticeGrandCanonicalMonteCarlo::new(
            GrandCanonicalConfigBuilder::new()
                .temperature(600.0)
                .chemical_potential("O", -0.1)
                .invoke_every(5)
                .build()
                .unwrap(),
        )),
    ];
    let mut pipeline = Pipeline::new(state, protocols, LoggingConfig::default())
        .unwrap()
        .with_seed(11);
    let summary = pipeline.run(10).unwrap();

    assert_eq!(summary.protocols[0].num_invokes, 15);
    assert_eq!(summary.protocols[1].num_invokes, 2);
    for metrics in &summary.protocols {
        let attempts: u64 = metrics.counters.iter().map(|(_, v)| v).sum();
        assert_eq!(attempts, metrics.num_invokes);
    }
    assert_eq!(summary.final_global_step, 10);
    assert_eq!(summary.final_step, 20);
}

#[test]
fn vacancy_set_follows_labels_when_swaps_move_vacancies() {
    let evaluator: Arc<dyn PotentialEnergyEvaluator> = Arc::new(ChainEvaluator::default());
    let mut state = chain_state(&["Mg", "Zn", "X", "Mg", "Zn", "X", "Mg", "Zn"], evaluator);
    let mut swap = swap_protocol(&["Mg", "X"], 1, 1);
    let mut gcmc = OnLatticeGrandCanonicalMonteCarlo::new(
        GrandCanonicalConfigBuilder::new()
            .temperature(600.0)
            .chemical_potential("Zn", 0.0)
            .vacancy_tracking(VacancyTracking::AllVacantSites)
            .build()
            .unwrap(),
    );
    swap.initialize(&state).unwrap();
    gcmc.initialize(&state).unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(99);
    for outer in 0..100u64 {
        swap.evolve(&mut state, &mut rng).unwrap();
        gcmc.evolve(&mut state, &mut rng).unwrap();
        let vacancies: BTreeSet<usize> = indices_where(state.types(), is_vacancy)
            .into_iter()
            .collect();
        assert_eq!(gcmc.vacant_sites(), &vacancies);
        state
            .update(None, Some(PropertiesUpdate::new().global_step(outer + 1)))
            .unwrap();
    }
}

/// Depends only on how many atoms are present; relaxation always gains 100.
#[derive(Debug)]
struct FlatEvaluator;

impl PotentialEnergyEvaluator for FlatEvaluator {
    fn energy(&self, s: &Structure) -> Result<f64, EvaluatorError> {
        Ok(-0.5 * s.len() as f64)
    }

    fn relaxed_energy(&self, s: &Structure, _: f64) -> Result<f64, EvaluatorError> {
        Ok(self.energy(s)? - 100.0)
    }
}

#[test]
fn swaps_after_relaxed_gcmc_compare_like_with_like() {
    let state = chain_state(
        &["A", "A", "B", "B", "O", "O", "X", "X"],
        Arc::new(FlatEvaluator),
    );
    let gcmc = OnLatticeGrandCanonicalMonteCarlo::new(
        GrandCanonicalConfigBuilder::new()
            .temperature(600.0)
            .chemical_potential("O", 0.0)
            .energy_mode(EnergyMode::Relaxed {
                force_tolerance: 0.05,
            })
            .build()
            .unwrap(),
    );
    let protocols: Vec<Box<dyn Protocol>> =
        vec![Box::new(gcmc), Box::new(swap_protocol(&["A", "B"], 1, 1))];
    let mut pipeline = Pipeline::new(state, protocols, LoggingConfig::default())
        .unwrap()
        .with_seed(40);
    let summary = pipeline.run(40).unwrap();

    let swaps = &summary.protocols[1].counters;
    assert_eq!(counter(swaps, "accepted_swaps"), 40);
    assert_eq!(counter(swaps, "rejected_swaps"), 0);
}

#[test]
fn pipeline_recomputes_energy_stored_in_input_frame() {
    let mut frame = chain_state(&["A", "B", "A", "B"], Arc::new(FlatEvaluator)).to_structure();
    frame.info.energy = Some(999.0);
    let state = State::from_structure(frame, Some(Arc::new(FlatEvaluator)));
    let mut pipeline = Pipeline::new(
        state,
        vec![Box::new(swap_protocol(&["A", "B"], 1, 1))],
        LoggingConfig::default(),
    )
    .unwrap();
    pipeline.initialize().unwrap();
    assert_eq!(pipeline.state().energy(), Some(-2.0));
}

fn rocksalt_potential() -> PairPotential {
    let cation_cation = PairForm::LennardJones {
        r_min: 3.0,
        well_depth: 0.01,
    };
    let cation_anion = PairForm::Buckingham {
        r_min: 2.1,
        well_depth: 0.5,
        gamma: 12.0,
    };
    let params = PairParams::new(4.0)
        .with_pair("Mg", "Mg", cation_cation)
        .with_pair("Mg", "Zn", cation_cation)
        .with_pair("Zn", "Zn", cation_cation)
        .with_pair("Mg", "O", cation_anion)
        .with_pair(
            "Zn",
            "O",
            PairForm::Buckingham {
                r_min: 2.15,
                well_depth: 0.45,
                gamma: 12.0,
            },
        )
        .with_pair(
            "O",
            "O",
            PairForm::LennardJones {
                r_min: 3.0,
                well_depth: 0.02,
            },
        );
    PairPotential::new(params)
}

#[test]
fn bulk_lattice_pipeline_writes_trajectory_and_records() {
    let dir = tempdir().unwrap();
    let trajectory = dir.path().join("traj.xyz");
    let records = dir.path().join("log.tsv");

    let mut spec = BulkSpec::new(
        CrystalPattern::Rocksalt,
        BTreeMap::from([("Mg".to_string(), 0.5), ("Zn".to_string(), 0.5)]),
    );
    spec.lattice_constant = 4.2;
    spec.supercell = [2, 2, 2];
    let structure = bulk_heo(&spec, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
    let state = State::from_structure(structure, Some(Arc::new(rocksalt_potential())))
        .with_temperature(1000.0);

    let logging = LoggingConfigBuilder::new()
        .fields([
            "properties.global_step",
            "properties.energy",
            "module.asmc.accepted_swaps",
        ])
        .interval(5)
        .trajectory(&trajectory)
        .records(&records)
        .build()
        .unwrap();
    let swap = AtomSwapMonteCarlo::new(
        AtomSwapConfigBuilder::new()
            .temperature(1000.0)
            .species(["Mg", "Zn"])
            .build()
            .unwrap(),
    );
    let mut pipeline = Pipeline::new(state, vec![Box::new(swap)], logging)
        .unwrap()
        .with_seed(3);
    pipeline.run(20).unwrap();

    let frames = XyzFile::read_frames_from_path(&trajectory).unwrap();
    assert_eq!(frames.len(), 4);
    let last = frames.last().unwrap();
    assert_eq!(last.info.global_step, Some(15));
    let counts = composition(last.symbols());
    assert_eq!(counts["Mg"], 16);
    assert_eq!(counts["Zn"], 16);
    assert_eq!(counts["O"], 32);

    let content = std::fs::read_to_string(&records).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(
        lines[0],
        "Global Step\tPotential Energy\tmodule.asmc.accepted_swaps"
    );
    assert!(lines[1].starts_with("0\t"));
    assert!(lines[4].starts_with("15\t"));
}
