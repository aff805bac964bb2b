use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::common::exception::{JoinError, Result};
use crate::storage::disk::batch_file::BatchFile;
use crate::storage::table::tuple::Tuple;

/// Which input of the join a spill file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchSide {
    Inner,
    Outer,
}

impl Display for BatchSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchSide::Inner => write!(f, "inner"),
            BatchSide::Outer => write!(f, "outer"),
        }
    }
}

/// Scratch directory holding every batch file of one join execution.
///
/// Removed, with whatever is left inside, when the last reference is dropped.
pub struct SpillDirectory {
    dir: TempDir,
    next_file_id: AtomicU64,
}

impl SpillDirectory {
    /// Creates a fresh directory under `parent`, or under the OS temp
    /// directory when `parent` is `None`.
    pub fn create(parent: Option<&Path>) -> Result<Arc<Self>> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("hashjoin-");
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        debug!("Created spill directory {}", dir.path().display());

        Ok(Arc::new(Self {
            dir,
            next_file_id: AtomicU64::new(0),
        }))
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn file_path(&self, side: BatchSide, batch: usize) -> PathBuf {
        let id = self.next_file_id.fetch_add(1, Ordering::Relaxed);
        self.dir.path().join(format!("{}-{}.{}", side, batch, id))
    }
}

/// Per-side collection of batch files.
///
/// Every method takes `&self` so one manager can be shared by cooperating
/// workers: the map of files has its own lock and every file is locked
/// separately, which lets many readers drain one batch record by record.
pub struct BatchSpillManager {
    side: BatchSide,
    dir: Arc<SpillDirectory>,
    files: Mutex<HashMap<usize, Arc<Mutex<BatchFile>>>>,
    tuples_spilled: AtomicU64,
    bytes_spilled: AtomicU64,
}

impl BatchSpillManager {
    pub fn new(side: BatchSide, dir: Arc<SpillDirectory>) -> Self {
        Self {
            side,
            dir,
            files: Mutex::new(HashMap::new()),
            tuples_spilled: AtomicU64::new(0),
            bytes_spilled: AtomicU64::new(0),
        }
    }

    pub fn side(&self) -> BatchSide {
        self.side
    }

    pub fn directory(&self) -> &Arc<SpillDirectory> {
        &self.dir
    }

    fn file(&self, batch: usize) -> Option<Arc<Mutex<BatchFile>>> {
        self.files.lock().get(&batch).cloned()
    }

    fn file_or_create(&self, batch: usize) -> Result<Arc<Mutex<BatchFile>>> {
        let mut files = self.files.lock();
        if let Some(file) = files.get(&batch) {
            return Ok(Arc::clone(file));
        }
        let path = self.dir.file_path(self.side, batch);
        let file = Arc::new(Mutex::new(BatchFile::create(&path, batch)?));
        files.insert(batch, Arc::clone(&file));
        Ok(file)
    }

    /// Appends a `(hash, tuple)` record to `batch`, opening its file on the
    /// first write.
    pub fn append(&self, batch: usize, hash: u32, tuple: &Tuple) -> Result<()> {
        let file = self.file_or_create(batch)?;
        let mut file = file.lock();
        let before = file.bytes_written();
        file.append(hash, tuple)?;

        self.tuples_spilled.fetch_add(1, Ordering::Relaxed);
        self.bytes_spilled
            .fetch_add(file.bytes_written() - before, Ordering::Relaxed);
        Ok(())
    }

    /// Positions `batch` at its first record. A batch with no file is a no-op.
    pub fn rewind(&self, batch: usize) -> Result<()> {
        match self.file(batch) {
            Some(file) => file.lock().rewind(),
            None => Ok(()),
        }
    }

    /// Reads the next record of `batch`. A batch that never received a tuple
    /// reads as empty.
    pub fn read_next(&self, batch: usize) -> Result<Option<(u32, Tuple)>> {
        match self.file(batch) {
            Some(file) => file.lock().read_next(),
            None => Ok(None),
        }
    }

    /// Releases `batch`'s file. The file is deleted once no reader holds it.
    pub fn close(&self, batch: usize) {
        if self.files.lock().remove(&batch).is_some() {
            debug!("Closed {} batch file {}", self.side, batch);
        }
    }

    pub fn close_all(&self) {
        let mut files = self.files.lock();
        if !files.is_empty() {
            debug!("Closing {} open {} batch files", files.len(), self.side);
        }
        files.clear();
    }

    /// Detaches `batch`'s file from the manager so the caller can drain it
    /// while new records for the same batch go to a fresh file.
    ///
    /// # Errors
    ///
    /// `JoinError::Internal` if another reader still holds the file.
    pub fn take(&self, batch: usize) -> Result<Option<BatchFile>> {
        let file = match self.files.lock().remove(&batch) {
            Some(file) => file,
            None => return Ok(None),
        };
        match Arc::try_unwrap(file) {
            Ok(file) => Ok(Some(file.into_inner())),
            Err(_) => Err(JoinError::Internal(format!(
                "{} batch {} is still in use and cannot be taken",
                self.side, batch
            ))),
        }
    }

    pub fn has_batch(&self, batch: usize) -> bool {
        self.files.lock().contains_key(&batch)
    }

    /// Batches that currently own a file, in ascending order.
    pub fn batches(&self) -> Vec<usize> {
        let mut batches: Vec<usize> = self.files.lock().keys().copied().collect();
        batches.sort_unstable();
        batches
    }

    pub fn tuple_count(&self, batch: usize) -> usize {
        self.file(batch)
            .map(|file| file.lock().tuples_written())
            .unwrap_or(0)
    }

    pub fn open_files(&self) -> usize {
        self.files.lock().len()
    }

    /// Total records written over the manager's lifetime, including records
    /// that were later redistributed.
    pub fn tuples_spilled(&self) -> u64 {
        self.tuples_spilled.load(Ordering::Relaxed)
    }

    pub fn bytes_spilled(&self) -> u64 {
        self.bytes_spilled.load(Ordering::Relaxed)
    }
}
