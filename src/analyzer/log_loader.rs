//! File I/O for reading a finished dbt log.
//!
//! The file handle lives only as long as the [`LogLoader`]; reading consumes
//! the loader so the handle is released as soon as the text is in memory.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::ParseError;

/// Buffer size for reading log files (8KB).
const BUFFER_SIZE: usize = 8 * 1024;

/// Log file loader.
pub struct LogLoader {
    reader: BufReader<File>,
    path: PathBuf,
}

impl LogLoader {
    /// Open a log file for reading.
    ///
    /// # Parameters
    ///
    /// * `path` - Path to the log file
    ///
    /// # Returns
    ///
    /// `Ok(LogLoader)` if the file opens, `Err(ParseError::Io)` otherwise.
    pub fn open(path: &Path) -> Result<Self, ParseError> {
        let file = File::open(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            reader: BufReader::with_capacity(BUFFER_SIZE, file),
            path: path.to_path_buf(),
        })
    }

    /// Read the remaining content and release the file.
    pub fn read_to_string(mut self) -> Result<String, ParseError> {
        let mut text = String::new();
        self.reader.read_to_string(&mut text).map_err(|source| ParseError::Io {
            path: self.path.clone(),
            source,
        })?;
        log::debug!("Read {} bytes from {}", text.len(), self.path.display());
        Ok(text)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read a whole log file into memory.
pub fn read_log(path: &Path) -> Result<String, ParseError> {
    LogLoader::open(path)?.read_to_string()
}
