use super::seeded_rng;
use crate::cli::BuildArgs;
use crate::error::{CliError, Result};
use crate::utils::parser;
use heox::core::build::bulk::{BulkSpec, CrystalPattern, bulk_heo};
use heox::core::io::traits::StructureFile;
use heox::core::io::xyz::XyzFile;
use heox::core::models::species::composition;
use tracing::info;

pub fn run(args: BuildArgs) -> Result<()> {
    let pattern: CrystalPattern = args.pattern.parse()?;
    let cations = parser::parse_composition(&args.composition)
        .map_err(|e| CliError::Argument(e.to_string()))?;
    if !(args.lattice_constant > 0.0 && args.lattice_constant.is_finite()) {
        return Err(CliError::Argument(format!(
            "Lattice constant must be positive, got {}",
            args.lattice_constant
        )));
    }

    let mut spec = BulkSpec::new(pattern, cations);
    spec.lattice_constant = args.lattice_constant;
    spec.supercell =
        parser::parse_supercell(&args.supercell).map_err(|e| CliError::Argument(e.to_string()))?;
    spec.dopant = args
        .dopant
        .as_deref()
        .map(parser::parse_species_fraction)
        .transpose()
        .map_err(|e| CliError::Argument(e.to_string()))?;

    info!("Building {} lattice with supercell {:?}", pattern, spec.supercell);
    let structure = bulk_heo(&spec, &mut seeded_rng(args.seed))?;

    XyzFile::write_to_path(&structure, &args.output).map_err(|e| CliError::FileParsing {
        path: args.output.clone(),
        source: e.into(),
    })?;

    let counts = composition(structure.symbols())
        .into_iter()
        .map(|(species, n)| format!("{}: {}", species, n))
        .collect::<Vec<_>>()
        .join(", ");
    println!(
        "✓ Wrote {} sites ({}) to {}",
        structure.len(),
        counts,
        args.output.display()
    );
    Ok(())
}
