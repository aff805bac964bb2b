use std::sync::Arc;

use log::trace;
use parking_lot::Mutex;

use crate::common::exception::Result;
use crate::container::hash_function::HashFunction;
use crate::execution::executors::abstract_executor::RowSource;
use crate::execution::expressions::join_keys::JoinKeys;
use crate::storage::table::tuple::Tuple;

/// A row paired with the hash of its join key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedTuple {
    pub tuple: Tuple,
    /// `None` when a key column is NULL; such rows can never match.
    pub hash: Option<u32>,
}

/// Pulls rows from one join input and hashes their key columns.
pub struct InputAdapter {
    source: Box<dyn RowSource>,
    key_columns: Vec<usize>,
    hash_function: HashFunction,
    rows_read: usize,
    exhausted: bool,
}

impl InputAdapter {
    pub fn new(source: Box<dyn RowSource>, key_columns: Vec<usize>, hash_function: HashFunction) -> Self {
        Self {
            source,
            key_columns,
            hash_function,
            rows_read: 0,
            exhausted: false,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.source.init()
    }

    /// Next row and its key hash, or `None` once the input is exhausted.
    ///
    /// After the first `None` the source is not polled again until
    /// [`InputAdapter::rescan`].
    pub fn next(&mut self) -> Result<Option<HashedTuple>> {
        if self.exhausted {
            return Ok(None);
        }
        let Some(tuple) = self.source.next()? else {
            trace!("Input exhausted after {} rows", self.rows_read);
            self.exhausted = true;
            return Ok(None);
        };
        self.rows_read += 1;
        let hash = JoinKeys::hash_columns(&self.hash_function, &tuple, &self.key_columns)?;
        Ok(Some(HashedTuple { tuple, hash }))
    }

    pub fn rescan(&mut self) -> Result<()> {
        self.source.rescan()?;
        self.rows_read = 0;
        self.exhausted = false;
        Ok(())
    }

    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

struct SharedSourceInner {
    source: Box<dyn RowSource>,
    initialized: bool,
    exhausted: bool,
}

/// A row source shared by cooperating workers.
///
/// Every row is handed to exactly one caller. Initialisation happens once,
/// on the first `init` from any clone, and once the source runs dry every
/// clone keeps seeing the end.
#[derive(Clone)]
pub struct SharedSource {
    inner: Arc<Mutex<SharedSourceInner>>,
}

impl SharedSource {
    pub fn new(source: Box<dyn RowSource>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SharedSourceInner {
                source,
                initialized: false,
                exhausted: false,
            })),
        }
    }
}

impl RowSource for SharedSource {
    fn init(&mut self) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.initialized {
            inner.source.init()?;
            inner.initialized = true;
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        let mut inner = self.inner.lock();
        if inner.exhausted {
            return Ok(None);
        }
        let row = inner.source.next()?;
        inner.exhausted = row.is_none();
        Ok(row)
    }

    fn rescan(&mut self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.source.rescan()?;
        inner.exhausted = false;
        Ok(())
    }
}
