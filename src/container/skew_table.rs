use log::debug;

use crate::common::config::{BUCKET_SLOT_SIZE, SKEW_BUCKET_OVERHEAD};
use crate::container::bucket_store::HashEntry;
use crate::container::hash_function::HashFunction;
use crate::storage::table::tuple::Tuple;
use crate::types_db::value::Value;

/// A most-common outer key value and the fraction of outer rows carrying it.
#[derive(Debug, Clone, PartialEq)]
pub struct SkewValue {
    pub key: Vec<Value>,
    pub frequency: f64,
}

/// Statistics hint listing the most common outer join keys, most common
/// first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SkewHint {
    values: Vec<SkewValue>,
}

impl SkewHint {
    pub fn new(values: Vec<SkewValue>) -> Self {
        Self { values }
    }

    pub fn push(mut self, key: Vec<Value>, frequency: f64) -> Self {
        self.values.push(SkewValue { key, frequency });
        self
    }

    pub fn values(&self) -> &[SkewValue] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Resident tuples of one frequent outer key.
#[derive(Debug)]
pub struct SkewBucket {
    hash: u32,
    entries: Vec<HashEntry>,
}

impl SkewBucket {
    pub fn hash(&self) -> u32 {
        self.hash
    }

    pub fn entries(&self) -> &[HashEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<HashEntry> {
        self.entries
    }
}

/// Open-addressed table of skew buckets keyed by hash value.
///
/// Buckets are created most common first and removed in the reverse order,
/// so clearing the removed slot never breaks the probe sequence of a bucket
/// that is still present.
#[derive(Debug)]
pub struct SkewTable {
    slots: Vec<Option<SkewBucket>>,
    /// Occupied slots, most common value first.
    order: Vec<usize>,
    space_used: usize,
    space_allowed: usize,
}

impl SkewTable {
    /// Builds the skew buckets for `hint`, or returns `None` when the hint is
    /// not worth it.
    ///
    /// At most `max_values` values are used, and together they must cover at
    /// least `min_fraction` of the outer relation.
    pub fn build(
        hint: &SkewHint,
        hash_function: &HashFunction,
        max_values: usize,
        min_fraction: f64,
        space_allowed: usize,
    ) -> Option<Self> {
        let nvalues = hint.values().len().min(max_values);
        if nvalues == 0 {
            return None;
        }

        let fraction: f64 = hint.values()[..nvalues].iter().map(|v| v.frequency).sum();
        if fraction < min_fraction {
            debug!(
                "Skew hint covers {:.4} of the outer side, below {:.4}; not building skew buckets",
                fraction, min_fraction
            );
            return None;
        }

        // Keep the load factor under one half.
        let mut nslots = 2;
        while nslots <= nvalues {
            nslots <<= 1;
        }
        nslots <<= 1;

        let mut table = Self {
            slots: (0..nslots).map(|_| None).collect(),
            order: Vec::with_capacity(nvalues),
            space_used: nslots * BUCKET_SLOT_SIZE,
            space_allowed,
        };

        for value in &hint.values()[..nvalues] {
            let hash = hash_function.get_hash(&value.key);
            let slot = table.probe(hash);
            // Two frequent values may share a hash; the first one owns the bucket.
            if table.slots[slot].is_some() {
                continue;
            }
            table.slots[slot] = Some(SkewBucket {
                hash,
                entries: Vec::new(),
            });
            table.order.push(slot);
            table.space_used += SKEW_BUCKET_OVERHEAD;
        }

        debug!(
            "Built {} skew buckets in {} slots for {:.4} of the outer side",
            table.order.len(),
            nslots,
            fraction
        );
        Some(table)
    }

    /// Slot holding `hash`, or the empty slot that ends its probe sequence.
    fn probe(&self, hash: u32) -> usize {
        let mask = self.slots.len() - 1;
        let mut slot = hash as usize & mask;
        while let Some(bucket) = &self.slots[slot] {
            if bucket.hash == hash {
                break;
            }
            slot = (slot + 1) & mask;
        }
        slot
    }

    /// Skew bucket slot for `hash`, if `hash` belongs to a frequent value.
    pub fn lookup(&self, hash: u32) -> Option<usize> {
        let slot = self.probe(hash);
        self.slots[slot].as_ref().map(|_| slot)
    }

    pub fn bucket(&self, slot: usize) -> Option<&SkewBucket> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn entry(&self, slot: usize, index: usize) -> Option<&HashEntry> {
        self.bucket(slot).and_then(|b| b.entries.get(index))
    }

    pub fn entry_mut(&mut self, slot: usize, index: usize) -> Option<&mut HashEntry> {
        self.slots
            .get_mut(slot)
            .and_then(Option::as_mut)
            .and_then(|b| b.entries.get_mut(index))
    }

    /// Adds a tuple to the bucket in `slot` and returns the bytes charged.
    pub fn insert(&mut self, slot: usize, hash: u32, tuple: Tuple) -> usize {
        let size = tuple.memory_footprint();
        if let Some(bucket) = self.slots.get_mut(slot).and_then(Option::as_mut) {
            bucket.entries.push(HashEntry::new(hash, tuple));
            self.space_used += size;
        }
        size
    }

    pub fn over_budget(&self) -> bool {
        self.space_used > self.space_allowed
    }

    /// Removes the least common remaining bucket and returns it.
    pub fn remove_least_common(&mut self) -> Option<SkewBucket> {
        let slot = self.order.pop()?;
        let bucket = self.slots[slot].take()?;
        let tuple_bytes: usize = bucket
            .entries
            .iter()
            .map(|e| e.tuple().memory_footprint())
            .sum();
        self.space_used = self
            .space_used
            .saturating_sub(tuple_bytes + SKEW_BUCKET_OVERHEAD);
        Some(bucket)
    }

    pub fn num_buckets(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Slots of the live buckets, most common first.
    pub fn slots(&self) -> &[usize] {
        &self.order
    }

    pub fn space_used(&self) -> usize {
        self.space_used
    }

    pub fn tuple_count(&self) -> usize {
        self.order
            .iter()
            .filter_map(|&slot| self.bucket(slot))
            .map(|b| b.entries.len())
            .sum()
    }

    pub fn reset_match_flags(&mut self) {
        for bucket in self.slots.iter_mut().flatten() {
            bucket.entries.iter_mut().for_each(HashEntry::reset_matched);
        }
    }
}
