use super::traits::StructureFile;
use crate::core::models::structure::{Structure, StructureError, StructureInfo};
use nalgebra::{Matrix3, Point3};
use std::io::{self, BufRead, Write};
use thiserror::Error;

const SUPPORTED_PROPERTIES: &str = "species:S:1:pos:R:3";

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: XyzParseErrorKind },
    #[error("Inconsistent frame: {0}")]
    Structure(#[from] StructureError),
}

#[derive(Debug, Error)]
pub enum XyzParseErrorKind {
    #[error("Invalid atom count '{0}'")]
    InvalidCount(String),
    #[error("Unexpected end of file, expected {expected} more atom line(s)")]
    Truncated { expected: usize },
    #[error("Atom line must have a symbol and three coordinates")]
    ShortAtomLine,
    #[error("Invalid float '{0}'")]
    InvalidFloat(String),
    #[error("Invalid integer '{0}' for key '{1}'")]
    InvalidInt(String, String),
    #[error("Lattice must hold nine numbers")]
    InvalidLattice,
    #[error("pbc must hold three T/F flags")]
    InvalidPbc,
    #[error("Unsupported Properties '{0}', expected '{SUPPORTED_PROPERTIES}'")]
    UnsupportedProperties(String),
    #[error("Unterminated quoted value")]
    UnterminatedQuote,
}

/// Extended XYZ reader and writer.
///
/// Each frame is an atom count, a comment line of `key=value` pairs (`Lattice`,
/// `Properties`, `pbc`, plus the scalar metadata `energy`, `temperature`, `step`
/// and `global_step`), then one `symbol x y z` line per site.
pub struct XyzFile;

fn parse_err(line: usize, kind: XyzParseErrorKind) -> XyzError {
    XyzError::Parse { line, kind }
}

fn parse_float(value: &str, line: usize) -> Result<f64, XyzError> {
    value
        .parse()
        .map_err(|_| parse_err(line, XyzParseErrorKind::InvalidFloat(value.into())))
}

fn parse_comment(comment: &str, line: usize) -> Result<Vec<(String, String)>, XyzError> {
    let mut pairs = Vec::new();
    let mut chars = comment.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }
        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c.is_whitespace() {
                break;
            }
            key.push(c);
            chars.next();
        }
        let mut value = String::new();
        if chars.peek() == Some(&'=') {
            chars.next();
            if chars.peek() == Some(&'"') {
                chars.next();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '"' {
                        closed = true;
                        break;
                    }
                    value.push(c);
                }
                if !closed {
                    return Err(parse_err(line, XyzParseErrorKind::UnterminatedQuote));
                }
            } else {
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
            }
        }
        pairs.push((key, value));
    }
    Ok(pairs)
}

fn parse_flag(token: &str) -> Option<bool> {
    match token {
        "T" | "True" | "true" => Some(true),
        "F" | "False" | "false" => Some(false),
        _ => None,
    }
}

fn format_flag(flag: bool) -> &'static str {
    if flag { "T" } else { "F" }
}

#[derive(Default)]
struct FrameHeader {
    cell: Option<Matrix3<f64>>,
    pbc: Option<[bool; 3]>,
    info: StructureInfo,
}

fn parse_header(comment: &str, line: usize) -> Result<FrameHeader, XyzError> {
    let mut header = FrameHeader::default();
    for (key, value) in parse_comment(comment, line)? {
        match key.as_str() {
            "Lattice" => {
                let numbers = value
                    .split_whitespace()
                    .map(|v| parse_float(v, line))
                    .collect::<Result<Vec<_>, _>>()?;
                if numbers.len() != 9 {
                    return Err(parse_err(line, XyzParseErrorKind::InvalidLattice));
                }
                header.cell = Some(Matrix3::from_row_slice(&numbers));
            }
            "pbc" => {
                let flags: Vec<bool> = value.split_whitespace().filter_map(parse_flag).collect();
                let flags: [bool; 3] = flags
                    .try_into()
                    .map_err(|_| parse_err(line, XyzParseErrorKind::InvalidPbc))?;
                header.pbc = Some(flags);
            }
            "Properties" => {
                if value != SUPPORTED_PROPERTIES {
                    return Err(parse_err(
                        line,
                        XyzParseErrorKind::UnsupportedProperties(value),
                    ));
                }
            }
            "energy" => header.info.energy = Some(parse_float(&value, line)?),
            "temperature" => header.info.temperature = Some(parse_float(&value, line)?),
            "step" | "global_step" => {
                let parsed: u64 = value.parse().map_err(|_| {
                    parse_err(
                        line,
                        XyzParseErrorKind::InvalidInt(value.clone(), key.clone()),
                    )
                })?;
                if key == "step" {
                    header.info.step = Some(parsed);
                } else {
                    header.info.global_step = Some(parsed);
                }
            }
            _ => {}
        }
    }
    Ok(header)
}

impl StructureFile for XyzFile {
    type Error = XyzError;

    fn read_frames(reader: &mut impl BufRead) -> Result<Vec<Structure>, Self::Error> {
        let mut frames = Vec::new();
        let mut lines = reader.lines().enumerate();

        while let Some((idx, count_line)) = lines.next() {
            let count_line = count_line?;
            let line_num = idx + 1;
            let trimmed = count_line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let count: usize = trimmed
                .parse()
                .map_err(|_| parse_err(line_num, XyzParseErrorKind::InvalidCount(trimmed.into())))?;

            let (comment_idx, comment) = lines
                .next()
                .ok_or_else(|| parse_err(line_num, XyzParseErrorKind::Truncated { expected: count }))?;
            let header = parse_header(&comment?, comment_idx + 1)?;

            let mut symbols = Vec::with_capacity(count);
            let mut positions = Vec::with_capacity(count);
            for remaining in (1..=count).rev() {
                let (atom_idx, atom_line) = lines.next().ok_or_else(|| {
                    parse_err(
                        line_num,
                        XyzParseErrorKind::Truncated {
                            expected: remaining,
                        },
                    )
                })?;
                let atom_line = atom_line?;
                let atom_line_num = atom_idx + 1;
                let fields: Vec<&str> = atom_line.split_whitespace().collect();
                if fields.len() < 4 {
                    return Err(parse_err(atom_line_num, XyzParseErrorKind::ShortAtomLine));
                }
                symbols.push(fields[0].to_string());
                positions.push(Point3::new(
                    parse_float(fields[1], atom_line_num)?,
                    parse_float(fields[2], atom_line_num)?,
                    parse_float(fields[3], atom_line_num)?,
                ));
            }

            let has_cell = header.cell.is_some();
            let cell = header.cell.unwrap_or_else(Matrix3::zeros);
            let pbc = header.pbc.unwrap_or([has_cell; 3]);
            frames.push(Structure::new(symbols, positions, cell, pbc)?.with_info(header.info));
        }

        Ok(frames)
    }

    fn write_frame(structure: &Structure, writer: &mut impl Write) -> Result<(), Self::Error> {
        writeln!(writer, "{}", structure.len())?;

        let lattice = structure
            .cell
            .transpose()
            .iter()
            .map(|v| format!("{:.8}", v))
            .collect::<Vec<_>>()
            .join(" ");
        write!(
            writer,
            "Lattice=\"{}\" Properties={} pbc=\"{} {} {}\"",
            lattice,
            SUPPORTED_PROPERTIES,
            format_flag(structure.pbc[0]),
            format_flag(structure.pbc[1]),
            format_flag(structure.pbc[2]),
        )?;
        let info = &structure.info;
        if let Some(energy) = info.energy {
            write!(writer, " energy={}", energy)?;
        }
        if let Some(temperature) = info.temperature {
            write!(writer, " temperature={}", temperature)?;
        }
        if let Some(step) = info.step {
            write!(writer, " step={}", step)?;
        }
        if let Some(global_step) = info.global_step {
            write!(writer, " global_step={}", global_step)?;
        }
        writeln!(writer)?;

        for (symbol, pos) in structure.symbols().iter().zip(structure.positions()) {
            writeln!(
                writer,
                "{:<3}{:>16.8}{:>16.8}{:>16.8}",
                symbol, pos.x, pos.y, pos.z
            )?;
        }
        Ok(())
    }
}
