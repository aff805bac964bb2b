use std::sync::Arc;

use log::{debug, info, trace, warn};

use crate::common::config::{BUCKET_SLOT_SIZE, HASH_ENTRY_OVERHEAD, JoinConfig, SKEW_BUCKET_OVERHEAD};
use crate::common::exception::{JoinError, Result};
use crate::container::bucket_store::{BucketStore, HashEntry};
use crate::container::hash_function::HashFunction;
use crate::container::skew_table::{SkewHint, SkewTable};
use crate::storage::disk::batch_spill_manager::{BatchSide, BatchSpillManager, SpillDirectory};
use crate::storage::table::tuple::Tuple;

/// Largest bucket array a table will grow to.
const MAX_LOG2_BUCKETS: u32 = 30;

/// Bucket and batch numbers share the 32 hash bits.
const HASH_BITS: u32 = 32;

/// How a table reacts when an insert pushes it past a growth threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthMode {
    /// Grow buckets or batches inside `insert`.
    Inline,
    /// Only report the growth through [`HashJoinTable::growth_needed`]; a
    /// coordinator performs it once every writer has stopped.
    Deferred,
    /// Never split into batches; bucket growth still happens inline and
    /// exceeding the budget is only logged.
    InMemory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growth {
    Buckets,
    Batches,
}

/// Location of a resident entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRef {
    Main(usize),
    Skew { slot: usize, index: usize },
}

/// Where an inserted tuple ended up.
///
/// A `Resident` reference stays valid until the next batch growth, which
/// compacts the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Resident(EntryRef),
    Spilled(usize),
    /// NULL join key on a side whose unmatched rows are never emitted.
    Discarded,
}

/// Initial bucket and batch counts for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashTableSizing {
    pub nbuckets: usize,
    pub nbatch: usize,
    /// How many most-common values the skew table may hold; zero disables it.
    pub num_skew_mcvs: usize,
}

impl HashTableSizing {
    /// Picks bucket and batch counts for roughly `estimated_rows` tuples of
    /// `row_width` bytes each.
    ///
    /// If the estimated inner relation fits the budget there is one batch and
    /// one bucket per `ntup_per_bucket` tuples. Otherwise the bucket array is
    /// sized for a budget-full batch and `nbatch` is the power of two that
    /// splits the relation into batches of that size.
    pub fn choose(
        estimated_rows: usize,
        row_width: usize,
        config: &JoinConfig,
        use_skew: bool,
    ) -> Self {
        let tuple_size = HASH_ENTRY_OVERHEAD + row_width;
        let ntup = config.ntup_per_bucket.max(1);
        let inner_bytes = estimated_rows.saturating_mul(tuple_size);
        let mut table_bytes = config.work_mem.max(2 * BUCKET_SLOT_SIZE);

        let mut num_skew_mcvs = 0;
        if use_skew {
            let skew_bytes = config.skew_budget();
            num_skew_mcvs =
                skew_bytes / (tuple_size + 8 * BUCKET_SLOT_SIZE + SKEW_BUCKET_OVERHEAD);
            if num_skew_mcvs > 0 {
                table_bytes -= skew_bytes;
            }
        }

        // The bucket array never takes more than half of the budget.
        let max_buckets = prev_power_of_two((table_bytes / 2 / BUCKET_SLOT_SIZE).max(1))
            .min(1 << MAX_LOG2_BUCKETS);

        let mut nbuckets = (estimated_rows / ntup)
            .max(config.min_buckets)
            .max(1)
            .checked_next_power_of_two()
            .unwrap_or(max_buckets)
            .min(max_buckets);
        let mut nbatch = 1;

        if inner_bytes.saturating_add(nbuckets * BUCKET_SLOT_SIZE) > table_bytes {
            let bucket_size = tuple_size * ntup + BUCKET_SLOT_SIZE;
            nbuckets = (table_bytes / bucket_size)
                .max(1)
                .checked_next_power_of_two()
                .unwrap_or(max_buckets)
                .min(max_buckets);

            let batch_bytes = table_bytes - nbuckets * BUCKET_SLOT_SIZE;
            let min_batches = inner_bytes.div_ceil(batch_bytes).max(2);
            nbatch = min_batches
                .checked_next_power_of_two()
                .unwrap_or(config.max_batches)
                .min(prev_power_of_two(config.max_batches.max(1)));

            let max_log2_nbatch = HASH_BITS - nbuckets.trailing_zeros();
            while nbatch.trailing_zeros() > max_log2_nbatch {
                nbatch >>= 1;
            }
        }

        Self {
            nbuckets,
            nbatch: nbatch.max(1),
            num_skew_mcvs,
        }
    }
}

fn prev_power_of_two(n: usize) -> usize {
    if n == 0 {
        return 1;
    }
    1 << (usize::BITS - 1 - n.leading_zeros())
}

/// Spill managers of one table, created on the first spill.
pub struct SpillFiles {
    pub inner: Arc<BatchSpillManager>,
    pub outer: Arc<BatchSpillManager>,
}

impl SpillFiles {
    fn create(config: &JoinConfig) -> Result<Self> {
        let dir = SpillDirectory::create(config.spill_dir.as_deref())?;
        Ok(Self {
            inner: Arc::new(BatchSpillManager::new(BatchSide::Inner, Arc::clone(&dir))),
            outer: Arc::new(BatchSpillManager::new(BatchSide::Outer, dir)),
        })
    }

    pub fn side(&self, side: BatchSide) -> &Arc<BatchSpillManager> {
        match side {
            BatchSide::Inner => &self.inner,
            BatchSide::Outer => &self.outer,
        }
    }
}

/// Counters describing what a table did over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HashTableStats {
    pub nbuckets: usize,
    pub nbatch: usize,
    pub nbatch_original: usize,
    pub total_tuples: usize,
    pub space_peak: usize,
    pub batch_growths: usize,
    pub bucket_growths: usize,
    pub skew_buckets: usize,
}

/// The build side of a hybrid hash join.
///
/// Hashes split into a bucket number (low `log2(nbuckets)` bits) and a batch
/// number (the next `log2(nbatch)` bits). Only the current batch is resident;
/// inner tuples of every other batch go to that batch's spill file. Frequent
/// outer keys named by a skew hint get their own resident buckets while
/// batch 0 is current.
pub struct HashJoinTable {
    config: JoinConfig,
    hash_function: HashFunction,
    mode: GrowthMode,
    keep_nulls: bool,

    store: BucketStore,
    skew: Option<SkewTable>,

    nbatch: usize,
    log2_nbatch: u32,
    nbatch_original: usize,
    curbatch: usize,

    space_allowed: usize,
    space_peak: usize,
    grow_enabled: bool,
    over_budget_logged: bool,

    total_tuples: usize,
    batch_growths: usize,
    bucket_growths: usize,

    spill: Option<SpillFiles>,
}

impl HashJoinTable {
    /// Creates a table sized for `estimated_rows` inner tuples of about
    /// `row_width` bytes.
    ///
    /// Skew buckets are only built when the table starts out with several
    /// batches, since a single-batch table keeps everything resident anyway.
    pub fn create(
        estimated_rows: usize,
        row_width: usize,
        config: &JoinConfig,
        keep_nulls: bool,
        skew_hint: Option<&SkewHint>,
        hash_function: HashFunction,
    ) -> Result<Self> {
        let use_skew = config.enable_skew && skew_hint.is_some_and(|h| !h.is_empty());
        let sizing = HashTableSizing::choose(estimated_rows, row_width, config, use_skew);
        let mut table = Self::with_sizing(sizing, config, keep_nulls, hash_function)?;

        if let Some(hint) = skew_hint {
            if use_skew && sizing.nbatch > 1 && sizing.num_skew_mcvs > 0 {
                table.skew = SkewTable::build(
                    hint,
                    &table.hash_function,
                    sizing.num_skew_mcvs,
                    config.skew_min_outer_fraction,
                    config.skew_budget(),
                );
            }
        }
        Ok(table)
    }

    /// Creates a table with explicit bucket and batch counts.
    pub fn with_sizing(
        sizing: HashTableSizing,
        config: &JoinConfig,
        keep_nulls: bool,
        hash_function: HashFunction,
    ) -> Result<Self> {
        if !sizing.nbuckets.is_power_of_two() || !sizing.nbatch.is_power_of_two() {
            return Err(JoinError::Internal(format!(
                "bucket count {} and batch count {} must be powers of two",
                sizing.nbuckets, sizing.nbatch
            )));
        }
        let log2_nbatch = sizing.nbatch.trailing_zeros();
        if sizing.nbuckets.trailing_zeros() + log2_nbatch > HASH_BITS {
            return Err(JoinError::Internal(format!(
                "{} buckets and {} batches need more than {} hash bits",
                sizing.nbuckets, sizing.nbatch, HASH_BITS
            )));
        }

        debug!(
            "Creating hash table with {} buckets and {} batches (work_mem {} bytes)",
            sizing.nbuckets, sizing.nbatch, config.work_mem
        );

        let spill = if sizing.nbatch > 1 {
            Some(SpillFiles::create(config)?)
        } else {
            None
        };

        Ok(Self {
            config: config.clone(),
            hash_function,
            mode: GrowthMode::Inline,
            keep_nulls,
            store: BucketStore::new(sizing.nbuckets),
            skew: None,
            nbatch: sizing.nbatch,
            log2_nbatch,
            nbatch_original: sizing.nbatch,
            curbatch: 0,
            space_allowed: config.work_mem,
            space_peak: 0,
            grow_enabled: true,
            over_budget_logged: false,
            total_tuples: 0,
            batch_growths: 0,
            bucket_growths: 0,
            spill,
        })
    }

    pub fn with_growth_mode(mut self, mode: GrowthMode) -> Self {
        self.set_growth_mode(mode);
        self
    }

    pub fn set_growth_mode(&mut self, mode: GrowthMode) {
        if mode != GrowthMode::Inline && self.skew.take().is_some() {
            debug!("Dropping skew buckets: only inline growth keeps them");
        }
        self.mode = mode;
    }

    pub fn growth_mode(&self) -> GrowthMode {
        self.mode
    }

    pub fn hash_function(&self) -> &HashFunction {
        &self.hash_function
    }

    pub fn nbuckets(&self) -> usize {
        self.store.nbuckets()
    }

    pub fn log2_nbuckets(&self) -> u32 {
        self.store.log2_nbuckets()
    }

    pub fn nbatch(&self) -> usize {
        self.nbatch
    }

    pub fn current_batch(&self) -> usize {
        self.curbatch
    }

    pub fn keep_nulls(&self) -> bool {
        self.keep_nulls
    }

    pub fn grow_enabled(&self) -> bool {
        self.grow_enabled
    }

    /// Stops any further batch growth.
    pub fn disable_growth(&mut self) {
        self.grow_enabled = false;
    }

    pub fn space_allowed(&self) -> usize {
        self.space_allowed
    }

    /// Bytes charged for resident tuples, the bucket array and skew buckets.
    pub fn space_used(&self) -> usize {
        self.store.space_used() + self.skew.as_ref().map_or(0, SkewTable::space_used)
    }

    /// Inner tuples inserted since the table was created, spilled ones included.
    pub fn total_tuples(&self) -> usize {
        self.total_tuples
    }

    /// Number of resident tuples, skew buckets included.
    pub fn resident_tuples(&self) -> usize {
        self.store.len() + self.skew.as_ref().map_or(0, SkewTable::tuple_count)
    }

    pub fn skew_enabled(&self) -> bool {
        self.skew.is_some()
    }

    pub fn stats(&self) -> HashTableStats {
        HashTableStats {
            nbuckets: self.nbuckets(),
            nbatch: self.nbatch,
            nbatch_original: self.nbatch_original,
            total_tuples: self.total_tuples,
            space_peak: self.space_peak,
            batch_growths: self.batch_growths,
            bucket_growths: self.bucket_growths,
            skew_buckets: self.skew.as_ref().map_or(0, SkewTable::num_buckets),
        }
    }

    pub fn bucket_of(&self, hash: u32) -> usize {
        self.store.bucket_of(hash)
    }

    pub fn batch_of(&self, hash: u32) -> usize {
        if self.nbatch == 1 {
            return 0;
        }
        ((hash as u64 >> self.store.log2_nbuckets()) & (self.nbatch as u64 - 1)) as usize
    }

    /// Spill managers, if anything was ever spilled or the table started
    /// with several batches.
    pub fn spill_files(&self) -> Option<&SpillFiles> {
        self.spill.as_ref()
    }

    /// Spill managers, created on first use.
    pub fn ensure_spill_files(&mut self) -> Result<&SpillFiles> {
        if self.spill.is_none() {
            self.spill = Some(SpillFiles::create(&self.config)?);
        }
        self.spill
            .as_ref()
            .ok_or_else(|| JoinError::Internal("spill files vanished after creation".into()))
    }

    pub fn inner_batches(&self) -> Option<Arc<BatchSpillManager>> {
        self.spill.as_ref().map(|s| Arc::clone(&s.inner))
    }

    pub fn outer_batches(&self) -> Option<Arc<BatchSpillManager>> {
        self.spill.as_ref().map(|s| Arc::clone(&s.outer))
    }

    /// Inserts one build-side tuple.
    ///
    /// `hash` is `None` for a NULL join key; such tuples are kept under hash
    /// 0 when the table keeps NULLs (they can never match) and dropped
    /// otherwise.
    pub fn insert(&mut self, hash: Option<u32>, tuple: Tuple) -> Result<Placement> {
        let hash = match hash {
            Some(hash) => hash,
            None if self.keep_nulls => 0,
            None => return Ok(Placement::Discarded),
        };
        self.total_tuples += 1;

        if let Some(slot) = self.skew_bucket_for(hash) {
            return self.insert_skew(slot, hash, tuple);
        }
        self.insert_hashed(hash, tuple)
    }

    fn insert_hashed(&mut self, hash: u32, tuple: Tuple) -> Result<Placement> {
        let batchno = self.batch_of(hash);
        if batchno == self.curbatch {
            return self.insert_resident(hash, tuple);
        }
        if batchno < self.curbatch {
            return Err(JoinError::Internal(format!(
                "tuple with hash {:#010x} belongs to finished batch {} (current {})",
                hash, batchno, self.curbatch
            )));
        }
        trace!("Spilling inner tuple {} to batch {}", tuple, batchno);
        self.ensure_spill_files()?.inner.append(batchno, hash, &tuple)?;
        Ok(Placement::Spilled(batchno))
    }

    fn insert_resident(&mut self, hash: u32, tuple: Tuple) -> Result<Placement> {
        let idx = self.store.insert(hash, tuple);
        self.note_space();

        match self.mode {
            GrowthMode::Inline => {
                if self.bucket_growth_needed() {
                    self.grow_buckets();
                }
                if self.space_used() > self.space_allowed {
                    self.grow_batches()?;
                }
            }
            GrowthMode::InMemory => {
                if self.bucket_growth_needed() {
                    self.grow_buckets();
                }
                if self.space_used() > self.space_allowed && !self.over_budget_logged {
                    warn!(
                        "In-memory hash table exceeds work_mem: {} of {} bytes used by {} tuples",
                        self.space_used(),
                        self.space_allowed,
                        self.store.len()
                    );
                    self.over_budget_logged = true;
                }
            }
            GrowthMode::Deferred => {}
        }
        Ok(Placement::Resident(EntryRef::Main(idx)))
    }

    fn insert_skew(&mut self, slot: usize, hash: u32, tuple: Tuple) -> Result<Placement> {
        let Some(skew) = self.skew.as_mut() else {
            return self.insert_hashed(hash, tuple);
        };
        skew.insert(slot, hash, tuple);
        let index = skew
            .bucket(slot)
            .map(|b| b.entries().len().saturating_sub(1))
            .unwrap_or(0);
        self.note_space();

        if self.space_used() > self.space_allowed {
            self.grow_batches()?;
        }
        while self.skew.as_ref().is_some_and(SkewTable::over_budget) {
            self.remove_next_skew_bucket()?;
        }
        Ok(Placement::Resident(EntryRef::Skew { slot, index }))
    }

    fn note_space(&mut self) {
        self.space_peak = self.space_peak.max(self.space_used());
    }

    /// Growth the table needs before more tuples should be added.
    pub fn growth_needed(&self) -> Option<Growth> {
        if self.grow_enabled && self.mode != GrowthMode::InMemory && self.space_used() > self.space_allowed {
            Some(Growth::Batches)
        } else if self.bucket_growth_needed() {
            Some(Growth::Buckets)
        } else {
            None
        }
    }

    fn bucket_growth_needed(&self) -> bool {
        self.nbatch == 1
            && self.store.log2_nbuckets() < MAX_LOG2_BUCKETS
            && self.store.len() > self.store.nbuckets() * self.config.ntup_per_bucket.max(1)
    }

    /// Performs whichever growth [`HashJoinTable::growth_needed`] reports.
    pub fn grow(&mut self, growth: Growth) -> Result<bool> {
        match growth {
            Growth::Buckets => Ok(self.grow_buckets()),
            Growth::Batches => self.grow_batches(),
        }
    }

    /// Doubles the bucket array. Only possible while there is a single
    /// batch, because the batch number is taken from the bits above the
    /// bucket number.
    pub fn grow_buckets(&mut self) -> bool {
        if self.nbatch != 1 || self.store.log2_nbuckets() >= MAX_LOG2_BUCKETS {
            return false;
        }
        let old = self.store.nbuckets();
        self.store.resize(old * 2);
        self.bucket_growths += 1;
        self.note_space();
        debug!(
            "Increased number of buckets from {} to {} for {} tuples",
            old,
            old * 2,
            self.store.len()
        );
        true
    }

    /// Doubles the number of batches.
    ///
    /// Resident tuples whose batch number changes are written to their new
    /// batch's inner file, and the spill files of every batch after the
    /// current one are rewritten so that each holds only its own tuples. The
    /// current batch's outer file is left alone; its reader re-spills rows
    /// that moved.
    ///
    /// Returns false when growth is disabled or out of hash bits. A split
    /// that moves none or all of the resident tuples disables further growth,
    /// since those tuples share all the bits that could tell them apart.
    pub fn grow_batches(&mut self) -> Result<bool> {
        if !self.grow_enabled || self.mode == GrowthMode::InMemory {
            return Ok(false);
        }

        let old_nbatch = self.nbatch;
        if old_nbatch * 2 > self.config.max_batches
            || self.store.log2_nbuckets() + self.log2_nbatch + 1 > HASH_BITS
        {
            warn!(
                "Cannot increase number of batches beyond {}; hash table will exceed work_mem ({} of {} bytes)",
                old_nbatch,
                self.space_used(),
                self.space_allowed
            );
            self.grow_enabled = false;
            return Ok(false);
        }

        self.nbatch = old_nbatch * 2;
        self.log2_nbatch += 1;
        self.batch_growths += 1;
        info!(
            "Increasing number of batches from {} to {} (space used {} of {} bytes)",
            old_nbatch,
            self.nbatch,
            self.space_used(),
            self.space_allowed
        );

        let curbatch = self.curbatch;
        let log2_nbuckets = self.store.log2_nbuckets();
        let nbatch = self.nbatch;
        let batch_of = move |hash: u32| ((hash as u64 >> log2_nbuckets) & (nbatch as u64 - 1)) as usize;

        let in_memory = self.store.len();
        let evicted: Vec<HashEntry> = self.store.drain_where(|e| batch_of(e.hash()) != curbatch);
        let freed = evicted.len();

        if !evicted.is_empty() {
            let inner = Arc::clone(&self.ensure_spill_files()?.inner);
            for entry in evicted {
                let hash = entry.hash();
                inner.append(batch_of(hash), hash, entry.tuple())?;
            }
        }

        if let Some(spill) = &self.spill {
            for batchno in (curbatch + 1)..old_nbatch {
                for manager in [&spill.inner, &spill.outer] {
                    if let Some(mut file) = manager.take(batchno)? {
                        while let Some((hash, tuple)) = file.read_next()? {
                            manager.append(batch_of(hash), hash, &tuple)?;
                        }
                    }
                }
            }
        }

        debug!(
            "Batch split freed {} of {} resident tuples; {} bytes now used",
            freed,
            in_memory,
            self.space_used()
        );
        if freed == 0 || freed == in_memory {
            self.grow_enabled = false;
            warn!(
                "Disabling further increase of nbatch: split of {} resident tuples moved {}; hash table may exceed work_mem",
                in_memory, freed
            );
        }
        Ok(true)
    }

    /// Evicts the least common skew bucket. Its tuples go to the main table
    /// or to their batch file.
    fn remove_next_skew_bucket(&mut self) -> Result<()> {
        let Some(bucket) = self.skew.as_mut().and_then(SkewTable::remove_least_common) else {
            return Ok(());
        };
        debug!(
            "Removing skew bucket for hash {:#010x} with {} tuples",
            bucket.hash(),
            bucket.entries().len()
        );
        for entry in bucket.into_entries() {
            let hash = entry.hash();
            let batchno = self.batch_of(hash);
            if batchno == self.curbatch {
                self.store.insert(hash, entry.into_tuple());
            } else {
                self.ensure_spill_files()?
                    .inner
                    .append(batchno, hash, entry.tuple())?;
            }
        }
        if self.skew.as_ref().is_some_and(SkewTable::is_empty) {
            debug!("All skew buckets removed; disabling skew optimization");
            self.skew = None;
        }
        Ok(())
    }

    /// Skew bucket slot that owns `hash`, while skew buckets exist.
    pub fn skew_bucket_for(&self, hash: u32) -> Option<usize> {
        self.skew.as_ref().and_then(|s| s.lookup(hash))
    }

    /// First candidate entry for `hash`: the skew bucket's first tuple when
    /// `skew_slot` is set, the head of the main chain otherwise.
    pub fn chain_start(&self, hash: u32, skew_slot: Option<usize>) -> Option<EntryRef> {
        match skew_slot {
            Some(slot) => self
                .skew
                .as_ref()
                .and_then(|s| s.entry(slot, 0))
                .map(|_| EntryRef::Skew { slot, index: 0 }),
            None => self.store.chain_head(hash).map(EntryRef::Main),
        }
    }

    pub fn successor(&self, entry: EntryRef) -> Option<EntryRef> {
        match entry {
            EntryRef::Main(idx) => self.store.next_in_chain(idx).map(EntryRef::Main),
            EntryRef::Skew { slot, index } => self
                .skew
                .as_ref()
                .and_then(|s| s.entry(slot, index + 1))
                .map(|_| EntryRef::Skew {
                    slot,
                    index: index + 1,
                }),
        }
    }

    /// First entry at or after `from` in its chain whose stored hash equals
    /// `hash`. Equal hashes are necessary but not sufficient for a match.
    pub fn find_candidate(&self, hash: u32, from: Option<EntryRef>) -> Option<EntryRef> {
        let mut cursor = from;
        while let Some(entry) = cursor {
            if self.entry(entry).is_some_and(|e| e.hash() == hash) {
                return Some(entry);
            }
            cursor = self.successor(entry);
        }
        None
    }

    pub fn entry(&self, entry: EntryRef) -> Option<&HashEntry> {
        match entry {
            EntryRef::Main(idx) => self.store.entry(idx),
            EntryRef::Skew { slot, index } => self.skew.as_ref().and_then(|s| s.entry(slot, index)),
        }
    }

    pub fn mark_matched(&mut self, entry: EntryRef) {
        let entry = match entry {
            EntryRef::Main(idx) => self.store.entry_mut(idx),
            EntryRef::Skew { slot, index } => self.skew.as_mut().and_then(|s| s.entry_mut(slot, index)),
        };
        if let Some(entry) = entry {
            entry.set_matched();
        }
    }

    pub fn reset_match_flags(&mut self) {
        self.store.reset_match_flags();
        if let Some(skew) = self.skew.as_mut() {
            skew.reset_match_flags();
        }
    }

    /// Next resident entry without a match: main arena first, then skew
    /// buckets from most to least common.
    pub fn next_unmatched(&self, cursor: &mut UnmatchedCursor) -> Option<EntryRef> {
        if let Some(idx) = self.store.next_unmatched(cursor.main) {
            cursor.main = idx + 1;
            return Some(EntryRef::Main(idx));
        }
        cursor.main = self.store.len();

        let skew = self.skew.as_ref()?;
        while let Some(&slot) = skew.slots().get(cursor.skew_bucket) {
            let entries = skew.bucket(slot).map(|b| b.entries()).unwrap_or(&[]);
            while cursor.skew_index < entries.len() {
                let index = cursor.skew_index;
                cursor.skew_index += 1;
                if !entries[index].is_matched() {
                    return Some(EntryRef::Skew { slot, index });
                }
            }
            cursor.skew_bucket += 1;
            cursor.skew_index = 0;
        }
        None
    }

    /// Makes `batchno` the current batch and loads its inner tuples.
    ///
    /// Skew buckets only live through batch 0. Reloading may itself grow the
    /// number of batches, in which case tuples that moved are written back
    /// out to their new batch.
    pub fn reset_for_new_batch(&mut self, batchno: usize) -> Result<()> {
        if batchno >= self.nbatch || batchno < self.curbatch {
            return Err(JoinError::Internal(format!(
                "cannot switch from batch {} to batch {} of {}",
                self.curbatch, batchno, self.nbatch
            )));
        }
        if self.skew.take().is_some() {
            debug!("Discarding skew buckets after batch 0");
        }

        self.curbatch = batchno;
        self.store.clear();

        let Some(inner) = self.inner_batches() else {
            return Ok(());
        };
        if let Some(mut file) = inner.take(batchno)? {
            debug!(
                "Loading {} inner tuples of batch {}",
                file.tuples_written(),
                batchno
            );
            while let Some((hash, tuple)) = file.read_next()? {
                self.insert_hashed(hash, tuple)?;
            }
        }
        Ok(())
    }

    /// Hands the resident arena to the caller, leaving an empty one with the
    /// same bucket count in its place.
    pub fn take_store(&mut self) -> BucketStore {
        let nbuckets = self.store.nbuckets();
        std::mem::replace(&mut self.store, BucketStore::new(nbuckets))
    }

    /// An empty arena with this table's bucket count.
    pub fn new_store(&self) -> BucketStore {
        BucketStore::new(self.store.nbuckets())
    }

    /// Releases both spill files of `batchno`.
    pub fn close_batch(&self, batchno: usize) {
        if let Some(spill) = &self.spill {
            spill.inner.close(batchno);
            spill.outer.close(batchno);
        }
    }
}

/// Position of a fill pass over the unmatched resident entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnmatchedCursor {
    main: usize,
    skew_bucket: usize,
    skew_index: usize,
}
