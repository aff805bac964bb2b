use std::fmt::{Display, Formatter};

use bincode::{Decode, Encode};

use crate::common::config::{HASH_ENTRY_OVERHEAD, spill_bincode_config};
use crate::common::exception::{JoinError, Result};
use crate::types_db::value::Value;

/// Represents a row flowing through the join.
///
/// `Tuple` has value semantics: cloning a tuple clones its values. Columns are
/// addressed by index; the join never interprets them beyond key comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode)]
pub struct Tuple {
    values: Vec<Value>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// A tuple of `width` NULLs, used to pad the missing side of an outer join.
    pub fn null(width: usize) -> Self {
        Self {
            values: vec![Value::Null; width],
        }
    }

    /// Returns a reference to the value at the given column index.
    ///
    /// # Errors
    ///
    /// Returns `JoinError::Input` if the index is out of bounds.
    pub fn get_value(&self, column_index: usize) -> Result<&Value> {
        self.values.get(column_index).ok_or_else(|| {
            JoinError::Input(format!(
                "column {} out of range for tuple of width {}",
                column_index,
                self.values.len()
            ))
        })
    }

    pub fn get_values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn width(&self) -> usize {
        self.values.len()
    }

    /// Concatenates `self` (outer side) with `other` (inner side).
    pub fn combine(&self, other: &Tuple) -> Tuple {
        let mut values = Vec::with_capacity(self.values.len() + other.values.len());
        values.extend_from_slice(&self.values);
        values.extend_from_slice(&other.values);
        Tuple { values }
    }

    /// Bytes charged against the work memory when this tuple is resident.
    pub fn memory_footprint(&self) -> usize {
        HASH_ENTRY_OVERHEAD
            + self
                .values
                .iter()
                .map(Value::get_storage_size)
                .sum::<usize>()
    }

    /// Serializes the tuple for a spill file.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(bincode::encode_to_vec(self, spill_bincode_config())?)
    }

    /// Deserializes a tuple previously written by [`Tuple::serialize`].
    ///
    /// # Errors
    ///
    /// Returns `JoinError::Decode` if the bytes are not a complete tuple.
    pub fn deserialize(storage: &[u8]) -> Result<Self> {
        let (tuple, read) = bincode::decode_from_slice(storage, spill_bincode_config())?;
        if read != storage.len() {
            return Err(JoinError::Decode(format!(
                "trailing bytes after tuple: decoded {} of {}",
                read,
                storage.len()
            )));
        }
        Ok(tuple)
    }
}

impl Display for Tuple {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}

impl From<Vec<Value>> for Tuple {
    fn from(values: Vec<Value>) -> Self {
        Tuple::new(values)
    }
}
