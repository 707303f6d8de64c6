use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid species fraction '{0}'. Expected 'Species=fraction' (e.g., 'Mg=0.2').")]
    InvalidSpeciesFraction(String),

    #[error("Species '{0}' appears more than once in the composition.")]
    DuplicateSpecies(String),

    #[error("Invalid supercell '{0}'. Expected three positive integers (e.g., '2x2x2').")]
    InvalidSupercell(String),

    #[error("Component '{component}' cannot be empty in '{input}'.")]
    EmptyComponent {
        component: &'static str,
        input: String,
    },
}

/// Parses a single `Species=fraction` pair.
pub fn parse_species_fraction(input: &str) -> Result<(String, f64), ParseError> {
    let (species, fraction) = input
        .split_once('=')
        .ok_or_else(|| ParseError::InvalidSpeciesFraction(input.to_string()))?;
    let species = species.trim();
    if species.is_empty() {
        return Err(ParseError::EmptyComponent {
            component: "species",
            input: input.to_string(),
        });
    }
    let fraction: f64 = fraction
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidSpeciesFraction(input.to_string()))?;
    if !fraction.is_finite() {
        return Err(ParseError::InvalidSpeciesFraction(input.to_string()));
    }
    Ok((species.to_string(), fraction))
}

/// Parses a comma-separated list of `Species=fraction` pairs.
pub fn parse_composition(input: &str) -> Result<BTreeMap<String, f64>, ParseError> {
    let mut composition = BTreeMap::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (species, fraction) = parse_species_fraction(part)?;
        if composition.insert(species.clone(), fraction).is_some() {
            return Err(ParseError::DuplicateSpecies(species));
        }
    }
    if composition.is_empty() {
        return Err(ParseError::EmptyComponent {
            component: "composition",
            input: input.to_string(),
        });
    }
    Ok(composition)
}

/// Parses `AxBxC` into supercell repetitions; a single integer repeats it on all axes.
pub fn parse_supercell(input: &str) -> Result<[usize; 3], ParseError> {
    let invalid = || ParseError::InvalidSupercell(input.to_string());
    let values: Vec<usize> = input
        .split(['x', 'X'])
        .map(|v| v.trim().parse::<usize>().map_err(|_| invalid()))
        .collect::<Result<_, _>>()?;
    let repeats = match values.as_slice() {
        [n] => [*n; 3],
        [a, b, c] => [*a, *b, *c],
        _ => return Err(invalid()),
    };
    if repeats.contains(&0) {
        return Err(invalid());
    }
    Ok(repeats)
}
