use crate::error::Result;
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    fmt::{self},
    prelude::*,
};

/// Target used by the pipeline for its log records.
const RECORD_TARGET: &str = "heox::pipeline";

fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::OFF;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Installs the global subscriber.
///
/// The console layer follows `-v`/`--quiet`. The optional file layer always
/// keeps the pipeline's log records, so a run's history survives a quiet
/// console.
pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let console_level = level_filter(verbosity, quiet);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact()
        .with_filter(console_level);

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(&path)?;
            let file_level = console_level.max(LevelFilter::WARN);
            let targets = Targets::new()
                .with_default(file_level)
                .with_target(RECORD_TARGET, file_level.max(LevelFilter::INFO));
            Some(
                fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_thread_ids(true)
                    .with_target(true)
                    .with_filter(targets),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use serial_test::serial;
    use std::sync::Once;
    use tracing::{debug, error, info, trace, warn};

    static INIT: Once = Once::new();

    fn ensure_global_logger_is_set() {
        INIT.call_once(|| {
            setup_logging(3, false, None).expect("Failed to set up global logger for tests");
        });
    }

    #[test]
    fn verbosity_maps_to_level_filters() {
        assert_eq!(level_filter(0, false), LevelFilter::WARN);
        assert_eq!(level_filter(1, false), LevelFilter::INFO);
        assert_eq!(level_filter(2, false), LevelFilter::DEBUG);
        assert_eq!(level_filter(9, false), LevelFilter::TRACE);
        assert_eq!(level_filter(3, true), LevelFilter::OFF);
    }

    #[test]
    #[serial]
    fn global_logger_accepts_pipeline_records() {
        ensure_global_logger_is_set();

        error!("evaluator failed");
        warn!("trajectory file already exists");
        info!(target: "heox::pipeline", "Step\tPotential Energy");
        debug!(accepted = true, "swap trial");
        trace!("vacancy set synchronised");
    }

    #[test]
    #[serial]
    fn file_layer_keeps_records_and_drops_lower_levels() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("run.log");

        let file = File::create(&log_path).unwrap();
        let targets = Targets::new()
            .with_default(LevelFilter::WARN)
            .with_target(RECORD_TARGET, LevelFilter::INFO);
        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_filter(targets);
        let subscriber = tracing_subscriber::registry().with(file_layer);

        tracing::subscriber::with_default(subscriber, || {
            info!(target: "heox::pipeline", "0\t-12.5");
            info!("engine detail that should be filtered");
        });

        let content = std::fs::read_to_string(log_path).unwrap();
        assert!(content.contains("0\t-12.5"));
        assert!(content.contains("ThreadId"));
        assert!(!content.contains("engine detail"));
    }

    #[test]
    #[serial]
    fn invalid_log_file_path_propagates_error() {
        let invalid_path = PathBuf::from("/");

        if cfg!(unix) && invalid_path.is_dir() {
            let result = setup_logging(0, false, Some(invalid_path));
            assert!(matches!(result, Err(CliError::Io(_))));
        }
    }
}
