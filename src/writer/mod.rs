//! Buffered output for the dump file.

use crate::error::{DumpError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const WRITER_BUFFER_SIZE: usize = 256 * 1024;
pub const STMT_BUFFER_COUNT: usize = 100;

/// Create the output directory and any missing parents
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| DumpError::OutputDirectory {
        path: dir.to_path_buf(),
        source,
    })
}

/// Statement writer for a single dump.
///
/// Statements are newline-terminated and buffered; the buffer is flushed
/// every [`STMT_BUFFER_COUNT`] statements.
pub struct DumpWriter<W: Write = File> {
    writer: BufWriter<W>,
    path: Option<PathBuf>,
    write_count: usize,
    max_stmt_buffer: usize,
    bytes_written: u64,
}

impl DumpWriter<File> {
    /// Create `path`, failing with [`DumpError::AlreadyExists`] if anything
    /// already occupies it. Existing files are never truncated.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => DumpError::AlreadyExists {
                    path: path.to_path_buf(),
                },
                _ => DumpError::write(format!("creating {}", path.display()), e),
            })?;

        let mut writer = Self::from_writer(file);
        writer.path = Some(path.to_path_buf());
        Ok(writer)
    }
}

impl<W: Write> DumpWriter<W> {
    pub fn from_writer(inner: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(WRITER_BUFFER_SIZE, inner),
            path: None,
            write_count: 0,
            max_stmt_buffer: STMT_BUFFER_COUNT,
            bytes_written: 0,
        }
    }

    /// Path of the dump file, when writing to one
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn context(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => "dump output".to_string(),
        }
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        if let Err(e) = self.writer.write_all(bytes) {
            return Err(DumpError::write(self.context(), e));
        }
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    pub fn write_statement(&mut self, stmt: &[u8]) -> Result<()> {
        self.put(stmt)?;
        self.put(b"\n")?;

        self.write_count += 1;
        if self.write_count >= self.max_stmt_buffer {
            self.flush()?;
        }

        Ok(())
    }

    /// Write `text` as-is, without a trailing newline
    pub fn write_raw(&mut self, text: &str) -> Result<()> {
        self.put(text.as_bytes())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.write_count = 0;
        if let Err(e) = self.writer.flush() {
            return Err(DumpError::write(self.context(), e));
        }
        Ok(())
    }

    /// Flush everything and hand back the underlying writer
    pub fn finish(self) -> Result<W> {
        let context = self.context();
        self.writer
            .into_inner()
            .map_err(|e| DumpError::write(context, e.into_error()))
    }
}
