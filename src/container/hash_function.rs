use std::hash::Hasher;

use xxhash_rust::xxh3;

use crate::types_db::value::Value;

const NULL_TAG: u8 = 0;
const BOOLEAN_TAG: u8 = 1;
const INTEGER_TAG: u8 = 2;
const VARCHAR_TAG: u8 = 3;
const BINARY_TAG: u8 = 4;

/// Hashes join keys to the 32-bit values the hash table partitions on.
///
/// Both sides of a join must use the same `HashFunction` (same seed) so that
/// equal keys land in the same bucket and batch.
#[derive(Debug, Clone, Copy)]
pub struct HashFunction {
    seed: u64,
}

impl Default for HashFunction {
    fn default() -> Self {
        Self::new()
    }
}

impl HashFunction {
    /// Creates a new `HashFunction` with the default seed.
    pub fn new() -> Self {
        Self { seed: 0 }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    /// Returns the hash value of the given key columns.
    ///
    /// # Parameters
    /// - `keys`: The key values, in key-column order.
    ///
    /// # Returns
    /// The 64-bit digest folded to 32 bits.
    pub fn get_hash<'a>(&self, keys: impl IntoIterator<Item = &'a Value>) -> u32 {
        let mut hasher = xxh3::Xxh3::with_seed(self.seed);

        for key in keys {
            match key {
                Value::Null => hasher.write_u8(NULL_TAG),
                Value::Boolean(b) => {
                    hasher.write_u8(BOOLEAN_TAG);
                    hasher.write_u8(*b as u8);
                }
                Value::Integer(i) => {
                    hasher.write_u8(INTEGER_TAG);
                    hasher.write_i64(*i);
                }
                Value::VarChar(s) => {
                    hasher.write_u8(VARCHAR_TAG);
                    hasher.write_u32(s.len() as u32);
                    hasher.write(s.as_bytes());
                }
                Value::Binary(b) => {
                    hasher.write_u8(BINARY_TAG);
                    hasher.write_u32(b.len() as u32);
                    hasher.write(b);
                }
            }
        }

        let digest = hasher.finish();
        (digest ^ (digest >> 32)) as u32
    }
}
