use std::path::PathBuf;

use bincode::config as bincode_config;

/// Default work memory for one hash table, in bytes.
pub const DEFAULT_WORK_MEM: usize = 4 * 1024 * 1024;

/// Smallest bucket array a hash table is created with.
pub const DEFAULT_MIN_BUCKETS: usize = 1024;

/// Target load factor: tuples per bucket before the bucket array doubles.
pub const NTUP_PER_BUCKET: usize = 1;

/// Share of the work memory reserved for skew buckets.
pub const SKEW_WORK_MEM_PERCENT: usize = 2;

/// The most-common outer values must cover at least this fraction of the
/// outer relation before skew buckets are worth building.
pub const SKEW_MIN_OUTER_FRACTION: f64 = 0.01;

/// Hard ceiling on the number of batches.
pub const MAX_BATCHES: usize = 1 << 20;

/// Fixed bookkeeping bytes charged for every resident tuple
/// (hash, chain link, match flag, arena slot).
pub const HASH_ENTRY_OVERHEAD: usize = 24;

/// Bytes charged per slot of the bucket array (head and tail links).
pub const BUCKET_SLOT_SIZE: usize = 16;

/// Bytes charged per skew bucket on top of its tuples.
pub const SKEW_BUCKET_OVERHEAD: usize = 32;

/// Per-join tunables.
///
/// Everything the engines consult at runtime is carried here and threaded into
/// the executors at construction time; there is no process-wide mutable state.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinConfig {
    /// Memory budget for one hash table, in bytes.
    pub work_mem: usize,
    /// Lower bound for the initial bucket array size (rounded to a power of two).
    pub min_buckets: usize,
    /// Average chain length that triggers bucket growth.
    pub ntup_per_bucket: usize,
    /// Percentage of `work_mem` reserved for skew buckets.
    pub skew_work_mem_percent: usize,
    /// Minimum total frequency of the skew hint before skew buckets are built.
    pub skew_min_outer_fraction: f64,
    /// Whether skew buckets may be built at all.
    pub enable_skew: bool,
    /// Parent directory for spill files; the OS temp directory when `None`.
    pub spill_dir: Option<PathBuf>,
    /// Upper bound on `nbatch`.
    pub max_batches: usize,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            work_mem: DEFAULT_WORK_MEM,
            min_buckets: DEFAULT_MIN_BUCKETS,
            ntup_per_bucket: NTUP_PER_BUCKET,
            skew_work_mem_percent: SKEW_WORK_MEM_PERCENT,
            skew_min_outer_fraction: SKEW_MIN_OUTER_FRACTION,
            enable_skew: true,
            spill_dir: None,
            max_batches: MAX_BATCHES,
        }
    }
}

impl JoinConfig {
    pub fn with_work_mem(mut self, work_mem: usize) -> Self {
        self.work_mem = work_mem;
        self
    }

    pub fn with_min_buckets(mut self, min_buckets: usize) -> Self {
        self.min_buckets = min_buckets.max(1);
        self
    }

    pub fn with_spill_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spill_dir = Some(dir.into());
        self
    }

    pub fn with_skew(mut self, enable: bool) -> Self {
        self.enable_skew = enable;
        self
    }

    /// Bytes of `work_mem` set aside for skew buckets.
    pub fn skew_budget(&self) -> usize {
        self.work_mem * self.skew_work_mem_percent / 100
    }
}

/// Bincode configuration for spilled tuples.
///
/// Spill files never outlive the join, but reader and writer must agree, so
/// the encoding is pinned in one place.
#[inline]
pub(crate) fn spill_bincode_config() -> impl bincode_config::Config {
    bincode_config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
}
