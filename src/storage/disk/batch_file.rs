use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{trace, warn};

use crate::common::exception::{JoinError, Result};
use crate::storage::table::tuple::Tuple;

/// Size of the `{hash: u32, tuple_len: u32}` record header.
pub const RECORD_HEADER_SIZE: usize = 8;

enum FileMode {
    Writing(BufWriter<File>),
    Reading(BufReader<File>),
}

/// One append-only scratch file holding the `(hash, tuple)` records of a
/// single batch on one side of the join.
///
/// Records are `{hash: u32 LE, tuple_len: u32 LE, tuple_bytes}`. The file is
/// written once, then read sequentially from the start; the backing file is
/// removed as soon as the `BatchFile` is dropped.
pub struct BatchFile {
    batch: usize,
    path: PathBuf,
    mode: Option<FileMode>,
    tuples_written: usize,
    bytes_written: u64,
}

impl BatchFile {
    /// Creates the backing file at `path`, which must not exist yet.
    pub fn create(path: &Path, batch: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        trace!("Created batch file {} for batch {}", path.display(), batch);

        Ok(Self {
            batch,
            path: path.to_path_buf(),
            mode: Some(FileMode::Writing(BufWriter::new(file))),
            tuples_written: 0,
            bytes_written: 0,
        })
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tuples_written(&self) -> usize {
        self.tuples_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Appends one record. Only legal before the first read.
    pub fn append(&mut self, hash: u32, tuple: &Tuple) -> Result<()> {
        let bytes = tuple.serialize()?;
        let len = u32::try_from(bytes.len()).map_err(|_| {
            JoinError::Encode(format!("tuple of {} bytes is too large to spill", bytes.len()))
        })?;

        let writer = match self.mode.as_mut() {
            Some(FileMode::Writing(writer)) => writer,
            _ => {
                return Err(JoinError::Internal(format!(
                    "append to batch {} after it was rewound for reading",
                    self.batch
                )));
            }
        };

        writer.write_all(&hash.to_le_bytes())?;
        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(&bytes)?;

        self.tuples_written += 1;
        self.bytes_written += (RECORD_HEADER_SIZE + bytes.len()) as u64;
        Ok(())
    }

    /// Flushes pending writes and positions the file at its first record.
    pub fn rewind(&mut self) -> Result<()> {
        let mut file = match self.mode.take() {
            Some(FileMode::Writing(writer)) => writer.into_inner().map_err(|e| e.into_error())?,
            Some(FileMode::Reading(reader)) => reader.into_inner(),
            None => {
                return Err(JoinError::Internal(format!(
                    "batch {} file lost its handle",
                    self.batch
                )));
            }
        };
        file.seek(SeekFrom::Start(0))?;
        self.mode = Some(FileMode::Reading(BufReader::new(file)));
        Ok(())
    }

    /// Reads the next `(hash, tuple)` record, or `None` at end of file.
    ///
    /// The first read after writing rewinds implicitly. A record cut short is
    /// reported as `JoinError::ShortRead`.
    pub fn read_next(&mut self) -> Result<Option<(u32, Tuple)>> {
        if !matches!(self.mode, Some(FileMode::Reading(_))) {
            self.rewind()?;
        }
        let batch = self.batch;
        let reader = match self.mode.as_mut() {
            Some(FileMode::Reading(reader)) => reader,
            _ => {
                return Err(JoinError::Internal(format!(
                    "batch {} file is not readable after rewind",
                    batch
                )));
            }
        };

        let mut header = [0u8; RECORD_HEADER_SIZE];
        let nread = read_fully(reader, &mut header)?;
        if nread == 0 {
            return Ok(None);
        }
        if nread != RECORD_HEADER_SIZE {
            return Err(JoinError::ShortRead {
                batch,
                expected: RECORD_HEADER_SIZE,
                actual: nread,
            });
        }

        let hash = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;

        let mut body = vec![0u8; len];
        let nread = read_fully(reader, &mut body)?;
        if nread != len {
            return Err(JoinError::ShortRead {
                batch,
                expected: len,
                actual: nread,
            });
        }

        Ok(Some((hash, Tuple::deserialize(&body)?)))
    }
}

impl Drop for BatchFile {
    fn drop(&mut self) {
        self.mode = None;
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove batch file {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Reads until `buf` is full or the reader hits end of file.
fn read_fully(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(total)
}
