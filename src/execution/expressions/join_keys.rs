use crate::common::exception::{JoinError, Result};
use crate::container::hash_function::HashFunction;
use crate::storage::table::tuple::Tuple;
use crate::types_db::value::Value;

/// The equi-join key columns of both inputs.
///
/// Key `i` of the outer side is compared with key `i` of the inner side.
/// Both sides hash through the same [`HashFunction`].
#[derive(Debug, Clone)]
pub struct JoinKeys {
    outer_columns: Vec<usize>,
    inner_columns: Vec<usize>,
    hash_function: HashFunction,
}

impl JoinKeys {
    /// # Errors
    ///
    /// `JoinError::Unsupported` if the two key lists differ in length or are
    /// empty.
    pub fn new(outer_columns: Vec<usize>, inner_columns: Vec<usize>) -> Result<Self> {
        if outer_columns.len() != inner_columns.len() || outer_columns.is_empty() {
            return Err(JoinError::Unsupported(format!(
                "{} outer keys cannot be paired with {} inner keys",
                outer_columns.len(),
                inner_columns.len()
            )));
        }
        Ok(Self {
            outer_columns,
            inner_columns,
            hash_function: HashFunction::new(),
        })
    }

    /// Single-column equi-join.
    pub fn single(outer_column: usize, inner_column: usize) -> Self {
        Self {
            outer_columns: vec![outer_column],
            inner_columns: vec![inner_column],
            hash_function: HashFunction::new(),
        }
    }

    pub fn with_hash_function(mut self, hash_function: HashFunction) -> Self {
        self.hash_function = hash_function;
        self
    }

    pub fn outer_columns(&self) -> &[usize] {
        &self.outer_columns
    }

    pub fn inner_columns(&self) -> &[usize] {
        &self.inner_columns
    }

    pub fn hash_function(&self) -> HashFunction {
        self.hash_function
    }

    /// Hash of the key columns `columns` of `tuple`, or `None` if any of them
    /// is NULL.
    pub fn hash_columns(
        hash_function: &HashFunction,
        tuple: &Tuple,
        columns: &[usize],
    ) -> Result<Option<u32>> {
        let mut keys = Vec::with_capacity(columns.len());
        for &column in columns {
            let value = tuple.get_value(column)?;
            if value.is_null() {
                return Ok(None);
            }
            keys.push(value);
        }
        Ok(Some(hash_function.get_hash(keys)))
    }

    pub fn outer_hash(&self, tuple: &Tuple) -> Result<Option<u32>> {
        Self::hash_columns(&self.hash_function, tuple, &self.outer_columns)
    }

    pub fn inner_hash(&self, tuple: &Tuple) -> Result<Option<u32>> {
        Self::hash_columns(&self.hash_function, tuple, &self.inner_columns)
    }

    /// Hash of a key given directly as values, such as a skew hint entry.
    pub fn hash_values(&self, values: &[Value]) -> u32 {
        self.hash_function.get_hash(values)
    }

    /// True if every outer key equals its inner counterpart. NULL never
    /// equals anything.
    pub fn keys_equal(&self, outer: &Tuple, inner: &Tuple) -> Result<bool> {
        for (&o, &i) in self.outer_columns.iter().zip(&self.inner_columns) {
            if !outer.get_value(o)?.join_eq(inner.get_value(i)?) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
