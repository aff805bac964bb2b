use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use log::{debug, info};
use parking_lot::RwLock;

use crate::common::config::JoinConfig;
use crate::common::exception::{JoinError, Result};
use crate::concurrency::barrier::Barrier;
use crate::container::bucket_store::BucketStore;
use crate::container::hash_join_table::{Growth, GrowthMode, HashJoinTable, HashTableStats};
use crate::execution::executors::abstract_executor::RowSource;
use crate::execution::executors::input_adapter::SharedSource;
use crate::execution::plans::hash_join_plan::{HashJoinPlan, JoinType};

/// Phases of the shared build, in barrier order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    /// One worker is elected to create the table.
    Electing,
    Allocating,
    /// Every worker inserts inner rows; growth may interrupt.
    HashingInner,
    /// Outer rows are partitioned into batch files. A single-batch build
    /// leaves from here straight away, since the outer side is probed as it
    /// streams in.
    HashingOuter,
    Done,
}

impl BuildPhase {
    pub fn from_phase(phase: u64) -> Self {
        match phase {
            0 => BuildPhase::Electing,
            1 => BuildPhase::Allocating,
            2 => BuildPhase::HashingInner,
            3 => BuildPhase::HashingOuter,
            _ => BuildPhase::Done,
        }
    }
}

/// Phases of one growth round; rounds repeat for as long as the build runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowPhase {
    /// Workers stop inserting and wait for each other.
    Electing,
    /// The elected worker splits batches while the rest wait.
    GrowingBatches,
    /// The elected worker doubles the bucket array while the rest wait.
    GrowingBuckets,
}

impl GrowPhase {
    pub fn from_phase(phase: u64) -> Self {
        match phase % 3 {
            0 => GrowPhase::Electing,
            1 => GrowPhase::GrowingBatches,
            _ => GrowPhase::GrowingBuckets,
        }
    }
}

/// Phases of one batch after the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Electing,
    Allocating,
    Loading,
    Probing,
    Done,
}

impl BatchPhase {
    pub fn from_phase(phase: u64) -> Self {
        match phase {
            0 => BatchPhase::Electing,
            1 => BatchPhase::Allocating,
            2 => BatchPhase::Loading,
            3 => BatchPhase::Probing,
            _ => BatchPhase::Done,
        }
    }

    pub fn as_phase(self) -> u64 {
        match self {
            BatchPhase::Electing => 0,
            BatchPhase::Allocating => 1,
            BatchPhase::Loading => 2,
            BatchPhase::Probing => 3,
            BatchPhase::Done => 4,
        }
    }
}

/// Shared state of one batch: its barrier and, while it is being joined,
/// its resident inner tuples.
pub struct ParallelBatch {
    batchno: usize,
    barrier: Barrier,
    store: RwLock<Option<BucketStore>>,
    done: AtomicBool,
}

impl ParallelBatch {
    fn new(batchno: usize, store: Option<BucketStore>) -> Self {
        // Batch 0 was loaded by the build itself.
        let barrier = if store.is_some() {
            Barrier::with_phase(BatchPhase::Probing.as_phase())
        } else {
            Barrier::new()
        };
        Self {
            batchno,
            barrier,
            store: RwLock::new(store),
            done: AtomicBool::new(false),
        }
    }

    pub fn batchno(&self) -> usize {
        self.batchno
    }

    pub fn barrier(&self) -> &Barrier {
        &self.barrier
    }

    pub fn store(&self) -> &RwLock<Option<BucketStore>> {
        &self.store
    }

    /// Set once every worker has finished probing this batch.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

/// Everything the workers of one parallel hash join share.
///
/// Workers are [`ParallelHashJoinExecutor`]s holding an `Arc` of this state.
/// Single-writer steps (creating the table, growing it, finishing the build,
/// allocating a batch) are only run by the worker a barrier elected, while
/// every other attached worker waits at that barrier.
///
/// [`ParallelHashJoinExecutor`]: crate::execution::executors::parallel_hash_join_executor::ParallelHashJoinExecutor
pub struct ParallelHashJoinState {
    plan: Arc<HashJoinPlan>,
    config: JoinConfig,
    build_barrier: Barrier,
    grow_barrier: Barrier,
    growth_requested: AtomicBool,
    aborted: AtomicBool,
    distributor: AtomicUsize,
    table: RwLock<Option<HashJoinTable>>,
    batches: RwLock<Vec<Arc<ParallelBatch>>>,
    outer: SharedSource,
    inner: SharedSource,
}

impl ParallelHashJoinState {
    /// Shared state for a join of `outer` and `inner`.
    ///
    /// Only join types that never emit unmatched inner rows can run in
    /// parallel, since each worker only sees the match flags of its own probes.
    pub fn new(
        plan: Arc<HashJoinPlan>,
        outer: Box<dyn RowSource>,
        inner: Box<dyn RowSource>,
        config: JoinConfig,
    ) -> Result<Arc<Self>> {
        match plan.get_join_type() {
            JoinType::Inner | JoinType::Left | JoinType::Semi | JoinType::Anti => {}
            other => {
                return Err(JoinError::Unsupported(format!(
                    "{} join cannot run as a parallel hash join",
                    other
                )));
            }
        }
        Ok(Arc::new(Self {
            plan,
            config,
            build_barrier: Barrier::new(),
            grow_barrier: Barrier::new(),
            growth_requested: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
            distributor: AtomicUsize::new(0),
            table: RwLock::new(None),
            batches: RwLock::new(Vec::new()),
            outer: SharedSource::new(outer),
            inner: SharedSource::new(inner),
        }))
    }

    pub fn plan(&self) -> &Arc<HashJoinPlan> {
        &self.plan
    }

    pub fn config(&self) -> &JoinConfig {
        &self.config
    }

    pub fn build_barrier(&self) -> &Barrier {
        &self.build_barrier
    }

    pub fn grow_barrier(&self) -> &Barrier {
        &self.grow_barrier
    }

    pub fn table(&self) -> &RwLock<Option<HashJoinTable>> {
        &self.table
    }

    pub fn outer_source(&self) -> SharedSource {
        self.outer.clone()
    }

    pub fn inner_source(&self) -> SharedSource {
        self.inner.clone()
    }

    pub fn request_growth(&self) {
        self.growth_requested.store(true, Ordering::Release);
    }

    pub fn growth_requested(&self) -> bool {
        self.growth_requested.load(Ordering::Acquire)
    }

    /// Marks the join as failed; every worker stops at its next check.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    pub fn nbatch(&self) -> usize {
        self.batches.read().len()
    }

    pub fn batch(&self, batchno: usize) -> Option<Arc<ParallelBatch>> {
        self.batches.read().get(batchno).cloned()
    }

    /// Batch a worker should start probing with, so that workers spread over
    /// the batches instead of all piling onto batch 0.
    pub fn next_start_batch(&self) -> usize {
        let nbatch = self.nbatch().max(1);
        self.distributor.fetch_add(1, Ordering::Relaxed) % nbatch
    }

    pub fn stats(&self) -> Option<HashTableStats> {
        self.table.read().as_ref().map(HashJoinTable::stats)
    }

    /// Creates the shared table. Run by the worker elected in
    /// [`BuildPhase::Electing`].
    pub fn create_table(&self) -> Result<()> {
        let table = HashJoinTable::create(
            self.plan.get_estimated_inner_rows(),
            self.plan.get_inner_row_width(),
            &self.config,
            false,
            None,
            self.plan.get_keys().hash_function(),
        )?
        .with_growth_mode(GrowthMode::Deferred);
        debug!(
            "Created shared hash table with {} buckets and {} batches",
            table.nbuckets(),
            table.nbatch()
        );
        *self.table.write() = Some(table);
        Ok(())
    }

    /// Splits batches until the table fits its budget or cannot split any
    /// further. Run by the worker elected at the end of [`GrowPhase::Electing`].
    pub fn grow_batches(&self) -> Result<()> {
        self.growth_requested.store(false, Ordering::Release);
        let mut guard = self.table.write();
        let table = guard.as_mut().ok_or_else(missing_table)?;
        while table.growth_needed() == Some(Growth::Batches) {
            if !table.grow_batches()? {
                break;
            }
        }
        Ok(())
    }

    /// Doubles the bucket array until chains are short enough again. Run by
    /// the worker elected at the end of [`GrowPhase::GrowingBatches`].
    pub fn grow_buckets(&self) -> Result<()> {
        let mut guard = self.table.write();
        let table = guard.as_mut().ok_or_else(missing_table)?;
        while table.growth_needed() == Some(Growth::Buckets) {
            if !table.grow_buckets() {
                break;
            }
        }
        Ok(())
    }

    /// Freezes the table after the inner input is consumed and sets up the
    /// per-batch state. Batch 0's tuples move into its batch store.
    pub fn finish_build(&self) -> Result<()> {
        let mut guard = self.table.write();
        let table = guard.as_mut().ok_or_else(missing_table)?;
        table.disable_growth();
        while table.growth_needed() == Some(Growth::Buckets) {
            if !table.grow_buckets() {
                break;
            }
        }

        let nbatch = table.nbatch();
        let resident = table.resident_tuples();
        let mut batch_zero = Some(table.take_store());
        let batches: Vec<Arc<ParallelBatch>> = (0..nbatch)
            .map(|batchno| Arc::new(ParallelBatch::new(batchno, batch_zero.take())))
            .collect();
        *self.batches.write() = batches;

        info!(
            "Parallel build finished: {} inner tuples, {} resident, {} buckets, {} batches",
            table.total_tuples(),
            resident,
            table.nbuckets(),
            nbatch
        );
        Ok(())
    }

    /// Gives `batch` an empty store. Run by the worker elected in
    /// [`BatchPhase::Electing`].
    pub fn allocate_batch(&self, batch: &ParallelBatch) -> Result<()> {
        let store = self
            .table
            .read()
            .as_ref()
            .ok_or_else(missing_table)?
            .new_store();
        debug!("Allocated store for batch {}", batch.batchno);
        *batch.store.write() = Some(store);
        Ok(())
    }

    /// Returns the state to where a fresh execution starts: no table, no
    /// batches, every barrier at phase 0 and both inputs rewound.
    ///
    /// Workers must all have left; their executors are then rescanned
    /// individually before they run again.
    pub fn reset_for_rescan(&self) -> Result<()> {
        let mut batches = self.batches.write();
        let attached = self.build_barrier.participants()
            + self.grow_barrier.participants()
            + batches.iter().map(|b| b.barrier.participants()).sum::<usize>();
        if attached > 0 {
            return Err(JoinError::Internal(format!(
                "cannot rescan a parallel hash join with {} workers still attached",
                attached
            )));
        }

        batches.clear();
        drop(batches);
        // Dropping the table removes its spill directory.
        *self.table.write() = None;
        self.build_barrier.reset();
        self.grow_barrier.reset();
        self.distributor.store(0, Ordering::Relaxed);
        self.growth_requested.store(false, Ordering::Release);
        self.aborted.store(false, Ordering::Release);

        self.outer.clone().rescan()?;
        self.inner.clone().rescan()?;
        debug!("Parallel hash join reset for rescan");
        Ok(())
    }

    /// Frees the memory and files of a batch every worker is done with.
    pub fn release_batch(&self, batch: &ParallelBatch) {
        batch.done.store(true, Ordering::Release);
        *batch.store.write() = None;
        if let Some(table) = self.table.read().as_ref() {
            table.close_batch(batch.batchno);
        }
        debug!("Released batch {}", batch.batchno);
    }
}

fn missing_table() -> JoinError {
    JoinError::Internal("shared hash table used before it was created".into())
}
