use crate::core::models::structure::Structure;
use std::error::Error;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for structure file formats holding one or more frames.
///
/// Implementors supply frame-level parsing and serialization; path-based helpers
/// are provided on top of them.
pub trait StructureFile {
    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads every frame from a buffered reader, in file order.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_frames(reader: &mut impl BufRead) -> Result<Vec<Structure>, Self::Error>;

    /// Writes a single frame to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_frame(structure: &Structure, writer: &mut impl Write) -> Result<(), Self::Error>;

    /// Reads every frame from a file path.
    fn read_frames_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Structure>, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_frames(&mut reader)
    }

    /// Reads the last frame of a file, which is the most recent configuration
    /// of a trajectory.
    fn read_last_from_path<P: AsRef<Path>>(path: P) -> Result<Option<Structure>, Self::Error> {
        Ok(Self::read_frames_from_path(path)?.pop())
    }

    /// Writes a single frame, replacing any existing file content.
    fn write_to_path<P: AsRef<Path>>(structure: &Structure, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_frame(structure, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Appends a single frame at the end of the file, creating it if needed.
    fn append_to_path<P: AsRef<Path>>(structure: &Structure, path: P) -> Result<(), Self::Error> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_frame(structure, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
