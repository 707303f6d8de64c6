use crate::engine::error::EngineError;
use csv::{Writer, WriterBuilder};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Tab-delimited log-record file: one header row, then one row per logged step.
///
/// Creating the writer truncates any existing file. Every row is flushed as it
/// is written so the file can be followed while a run is in progress.
pub struct RecordWriter {
    writer: Writer<File>,
    path: PathBuf,
}

impl RecordWriter {
    pub fn create<I, T>(path: &Path, header: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut writer = WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_path(path)?;
        writer.write_record(header)?;
        writer.flush()?;
        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    pub fn write<I, T>(&mut self, values: I) -> Result<(), EngineError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer.write_record(values)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for RecordWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordWriter")
            .field("path", &self.path)
            .finish()
    }
}
