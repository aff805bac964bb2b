use crate::common::config::BUCKET_SLOT_SIZE;
use crate::storage::table::tuple::Tuple;

/// One resident tuple together with its join-key hash.
#[derive(Debug, Clone)]
pub struct HashEntry {
    hash: u32,
    tuple: Tuple,
    matched: bool,
    next: Option<usize>,
}

impl HashEntry {
    pub fn new(hash: u32, tuple: Tuple) -> Self {
        Self {
            hash,
            tuple,
            matched: false,
            next: None,
        }
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }

    pub fn tuple(&self) -> &Tuple {
        &self.tuple
    }

    pub fn into_tuple(self) -> Tuple {
        self.tuple
    }

    pub fn is_matched(&self) -> bool {
        self.matched
    }

    pub fn set_matched(&mut self) {
        self.matched = true;
    }

    pub(crate) fn reset_matched(&mut self) {
        self.matched = false;
    }
}

/// Bucket array over an insertion-ordered entry arena.
///
/// Entries live in one `Vec` in the order they were inserted. Every bucket
/// keeps the first and last entry of its chain, and entries link forward, so
/// walking a chain yields the bucket's tuples in insertion order. Relinking
/// after a resize walks the arena front to back, which keeps that order.
#[derive(Debug)]
pub struct BucketStore {
    entries: Vec<HashEntry>,
    heads: Vec<Option<usize>>,
    tails: Vec<Option<usize>>,
    log2_nbuckets: u32,
    tuple_bytes: usize,
}

impl BucketStore {
    /// Creates an empty store. `nbuckets` must be a power of two.
    pub fn new(nbuckets: usize) -> Self {
        debug_assert!(nbuckets.is_power_of_two());
        Self {
            entries: Vec::new(),
            heads: vec![None; nbuckets],
            tails: vec![None; nbuckets],
            log2_nbuckets: nbuckets.trailing_zeros(),
            tuple_bytes: 0,
        }
    }

    pub fn nbuckets(&self) -> usize {
        self.heads.len()
    }

    pub fn log2_nbuckets(&self) -> u32 {
        self.log2_nbuckets
    }

    pub fn bucket_of(&self, hash: u32) -> usize {
        hash as usize & (self.nbuckets() - 1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes charged for resident tuples.
    pub fn tuple_bytes(&self) -> usize {
        self.tuple_bytes
    }

    /// Bytes charged for the bucket array.
    pub fn bucket_bytes(&self) -> usize {
        self.nbuckets() * BUCKET_SLOT_SIZE
    }

    pub fn space_used(&self) -> usize {
        self.tuple_bytes + self.bucket_bytes()
    }

    /// Appends a tuple to the tail of its bucket's chain and returns its
    /// position in the arena.
    pub fn insert(&mut self, hash: u32, tuple: Tuple) -> usize {
        self.tuple_bytes += tuple.memory_footprint();
        self.push_entry(HashEntry::new(hash, tuple))
    }

    fn push_entry(&mut self, entry: HashEntry) -> usize {
        let bucket = self.bucket_of(entry.hash);
        let idx = self.entries.len();
        self.entries.push(entry);
        self.link(bucket, idx);
        idx
    }

    fn link(&mut self, bucket: usize, idx: usize) {
        self.entries[idx].next = None;
        match self.tails[bucket] {
            Some(tail) => self.entries[tail].next = Some(idx),
            None => self.heads[bucket] = Some(idx),
        }
        self.tails[bucket] = Some(idx);
    }

    fn relink(&mut self) {
        self.heads.iter_mut().for_each(|h| *h = None);
        self.tails.iter_mut().for_each(|t| *t = None);
        for idx in 0..self.entries.len() {
            let bucket = self.bucket_of(self.entries[idx].hash);
            self.link(bucket, idx);
        }
    }

    /// First entry of the chain `hash` maps to.
    pub fn chain_head(&self, hash: u32) -> Option<usize> {
        self.heads[self.bucket_of(hash)]
    }

    pub fn next_in_chain(&self, idx: usize) -> Option<usize> {
        self.entries.get(idx).and_then(|e| e.next)
    }

    pub fn entry(&self, idx: usize) -> Option<&HashEntry> {
        self.entries.get(idx)
    }

    pub fn entry_mut(&mut self, idx: usize) -> Option<&mut HashEntry> {
        self.entries.get_mut(idx)
    }

    pub fn entries(&self) -> impl Iterator<Item = &HashEntry> {
        self.entries.iter()
    }

    /// Replaces the bucket array with one of `nbuckets` slots and relinks
    /// every chain.
    pub fn resize(&mut self, nbuckets: usize) {
        debug_assert!(nbuckets.is_power_of_two());
        self.heads = vec![None; nbuckets];
        self.tails = vec![None; nbuckets];
        self.log2_nbuckets = nbuckets.trailing_zeros();
        self.relink();
    }

    /// Removes every entry for which `evict` returns true and hands them back
    /// in arena order. The remaining entries keep their relative order.
    pub fn drain_where(&mut self, mut evict: impl FnMut(&HashEntry) -> bool) -> Vec<HashEntry> {
        let (evicted, kept): (Vec<HashEntry>, Vec<HashEntry>) =
            std::mem::take(&mut self.entries).into_iter().partition(|e| evict(e));
        self.entries = kept;
        self.tuple_bytes = self
            .entries
            .iter()
            .map(|e| e.tuple.memory_footprint())
            .sum();
        self.relink();
        evicted
    }

    /// Drops every entry; the bucket array keeps its size.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.tuple_bytes = 0;
        self.heads.iter_mut().for_each(|h| *h = None);
        self.tails.iter_mut().for_each(|t| *t = None);
    }

    pub fn reset_match_flags(&mut self) {
        self.entries.iter_mut().for_each(HashEntry::reset_matched);
    }

    /// Position of the first unmatched entry at or after `from`.
    pub fn next_unmatched(&self, from: usize) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, e)| !e.matched)
            .map(|(idx, _)| idx)
    }
}
