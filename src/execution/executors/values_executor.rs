use log::debug;

use crate::common::exception::Result;
use crate::execution::executors::abstract_executor::RowSource;
use crate::storage::table::tuple::Tuple;

/// Produces a fixed list of rows.
pub struct ValuesExecutor {
    rows: Vec<Tuple>,
    current_row: usize,
    initialized: bool,
    rescans: usize,
}

impl ValuesExecutor {
    pub fn new(rows: Vec<Tuple>) -> Self {
        Self {
            rows,
            current_row: 0,
            initialized: false,
            rescans: 0,
        }
    }

    pub fn get_row_count(&self) -> usize {
        self.rows.len()
    }

    /// How many times this source was rescanned.
    pub fn rescan_count(&self) -> usize {
        self.rescans
    }
}

impl From<Vec<Tuple>> for ValuesExecutor {
    fn from(rows: Vec<Tuple>) -> Self {
        Self::new(rows)
    }
}

impl RowSource for ValuesExecutor {
    fn init(&mut self) -> Result<()> {
        if !self.initialized {
            debug!("Initializing values executor with {} rows", self.rows.len());
            self.current_row = 0;
            self.initialized = true;
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        if !self.initialized {
            self.init()?;
        }

        let Some(row) = self.rows.get(self.current_row) else {
            return Ok(None);
        };
        self.current_row += 1;
        Ok(Some(row.clone()))
    }

    fn rescan(&mut self) -> Result<()> {
        self.current_row = 0;
        self.initialized = true;
        self.rescans += 1;
        Ok(())
    }
}
