use std::sync::Arc;

use log::{debug, trace, warn};

use crate::common::exception::{JoinError, Result};
use crate::concurrency::barrier::Barrier;
use crate::concurrency::parallel_hash_join_state::{
    BatchPhase, BuildPhase, GrowPhase, ParallelBatch, ParallelHashJoinState,
};
use crate::execution::executors::abstract_executor::RowSource;
use crate::execution::executors::input_adapter::{HashedTuple, InputAdapter};
use crate::execution::plans::hash_join_plan::{HashJoinPlan, JoinType};
use crate::storage::disk::batch_spill_manager::BatchSpillManager;
use crate::storage::table::tuple::Tuple;

enum WorkerPhase {
    Build,
    SelectBatch,
    Probe(Arc<ParallelBatch>),
    Done,
}

struct ParallelProbe {
    tuple: Tuple,
    hash: u32,
    cursor: Option<usize>,
    matched: bool,
}

/// One worker of a parallel hash join.
///
/// Every worker is a full participant: it helps build the shared table,
/// then joins batches until none is left, returning its share of the output.
/// The union of all workers' output is the join result.
pub struct ParallelHashJoinExecutor {
    shared: Arc<ParallelHashJoinState>,
    plan: Arc<HashJoinPlan>,
    worker_id: usize,
    outer: InputAdapter,
    inner: InputAdapter,
    phase: WorkerPhase,
    probe: Option<ParallelProbe>,

    nbatch: usize,
    inner_files: Option<Arc<BatchSpillManager>>,
    outer_files: Option<Arc<BatchSpillManager>>,
    next_batch: Option<usize>,
    batches_visited: usize,

    attached_build: bool,
    attached_grow: bool,
    attached_batch: Option<Arc<ParallelBatch>>,
    rows_emitted: usize,
    initialized: bool,
}

impl ParallelHashJoinExecutor {
    pub fn new(shared: Arc<ParallelHashJoinState>, worker_id: usize) -> Self {
        let plan = Arc::clone(shared.plan());
        let keys = plan.get_keys();
        let outer = InputAdapter::new(
            Box::new(shared.outer_source()),
            keys.outer_columns().to_vec(),
            keys.hash_function(),
        );
        let inner = InputAdapter::new(
            Box::new(shared.inner_source()),
            keys.inner_columns().to_vec(),
            keys.hash_function(),
        );
        Self {
            shared,
            plan,
            worker_id,
            outer,
            inner,
            phase: WorkerPhase::Build,
            probe: None,
            nbatch: 0,
            inner_files: None,
            outer_files: None,
            next_batch: None,
            batches_visited: 0,
            attached_build: false,
            attached_grow: false,
            attached_batch: None,
            rows_emitted: 0,
            initialized: false,
        }
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn rows_emitted(&self) -> usize {
        self.rows_emitted
    }

    fn join_type(&self) -> JoinType {
        self.plan.get_join_type()
    }

    fn check_aborted(&self) -> Result<()> {
        if self.shared.is_aborted() {
            return Err(JoinError::Internal(format!(
                "worker {}: parallel hash join aborted by another worker",
                self.worker_id
            )));
        }
        Ok(())
    }

    /// Runs the build from whatever phase the build barrier is in.
    fn build(&mut self) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let barrier = shared.build_barrier();
        let mut phase = barrier.attach();
        self.attached_build = true;
        debug!(
            "Worker {} joined the build at {:?}",
            self.worker_id,
            BuildPhase::from_phase(phase)
        );

        loop {
            match BuildPhase::from_phase(phase) {
                BuildPhase::Electing => {
                    if barrier.arrive_and_wait() {
                        shared.create_table()?;
                    }
                }
                BuildPhase::Allocating => {
                    barrier.arrive_and_wait();
                }
                BuildPhase::HashingInner => {
                    self.hash_inner()?;
                    if barrier.arrive_and_wait() {
                        shared.finish_build()?;
                    }
                }
                BuildPhase::HashingOuter if shared.nbatch() == 1 => {
                    // Nothing to partition: every worker leaves without
                    // arriving, so the phase is never waited on.
                    barrier.detach();
                    self.attached_build = false;
                    break;
                }
                BuildPhase::HashingOuter => {
                    self.partition_outer()?;
                    barrier.arrive_and_wait();
                }
                BuildPhase::Done => {
                    barrier.detach();
                    self.attached_build = false;
                    break;
                }
            }
            self.check_aborted()?;
            phase += 1;
        }

        let table = shared.table().read();
        let table = table
            .as_ref()
            .ok_or_else(|| JoinError::Internal("parallel build finished without a table".into()))?;
        self.nbatch = table.nbatch();
        self.inner_files = table.inner_batches();
        self.outer_files = table.outer_batches();
        Ok(())
    }

    /// Inserts this worker's share of the inner input, joining in whenever
    /// any worker asks for the table to grow.
    fn hash_inner(&mut self) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let grow_barrier = shared.grow_barrier();
        let phase = grow_barrier.attach();
        self.attached_grow = true;
        if GrowPhase::from_phase(phase) != GrowPhase::Electing {
            // A growth round is under way; see it through like everyone else.
            self.help_grow(grow_barrier, phase)?;
        }

        let mut inserted = 0;
        loop {
            self.check_aborted()?;
            if shared.growth_requested() {
                self.help_grow(grow_barrier, grow_barrier.phase())?;
                continue;
            }
            let Some(row) = self.inner.next()? else {
                break;
            };
            let Some(hash) = row.hash else {
                continue;
            };

            let growth = {
                let mut guard = shared.table().write();
                let table = guard
                    .as_mut()
                    .ok_or_else(|| JoinError::Internal("inner row arrived before the table".into()))?;
                table.insert(Some(hash), row.tuple)?;
                table.growth_needed()
            };
            inserted += 1;
            if let Some(growth) = growth {
                trace!("Worker {} requests {:?} growth", self.worker_id, growth);
                shared.request_growth();
                self.help_grow(grow_barrier, grow_barrier.phase())?;
            }
        }

        grow_barrier.detach();
        self.attached_grow = false;
        debug!("Worker {} inserted {} inner tuples", self.worker_id, inserted);
        Ok(())
    }

    /// Takes part in the current growth round from `phase` to its end. Each
    /// growing phase is worked by whoever the previous phase elected.
    fn help_grow(&self, grow_barrier: &Barrier, mut phase: u64) -> Result<()> {
        loop {
            match GrowPhase::from_phase(phase) {
                GrowPhase::Electing => {
                    if grow_barrier.arrive_and_wait() {
                        self.shared.grow_batches()?;
                    }
                }
                GrowPhase::GrowingBatches => {
                    if grow_barrier.arrive_and_wait() {
                        self.shared.grow_buckets()?;
                    }
                }
                GrowPhase::GrowingBuckets => {
                    grow_barrier.arrive_and_wait();
                    break;
                }
            }
            phase += 1;
        }
        self.check_aborted()
    }

    /// Writes this worker's share of the outer input to the batch files.
    /// NULL-key rows only survive when they are emitted unmatched.
    fn partition_outer(&mut self) -> Result<()> {
        let outer_files = {
            let table = self.shared.table().read();
            let table = table
                .as_ref()
                .ok_or_else(|| JoinError::Internal("outer partitioning without a table".into()))?;
            table
                .outer_batches()
                .ok_or_else(|| JoinError::Internal("multi-batch table has no spill files".into()))?
        };

        let fills_outer = self.join_type().fills_outer();
        let mut partitioned = 0;
        while let Some(row) = self.outer.next()? {
            self.check_aborted()?;
            let hash = match row.hash {
                Some(hash) => hash,
                None if fills_outer => 0,
                None => continue,
            };
            let batchno = match self.shared.table().read().as_ref() {
                Some(table) => table.batch_of(hash),
                None => return Err(JoinError::Internal("hash table dropped during partitioning".into())),
            };
            outer_files.append(batchno, hash, &row.tuple)?;
            partitioned += 1;
        }
        debug!("Worker {} partitioned {} outer tuples", self.worker_id, partitioned);
        Ok(())
    }

    /// Attaches to the next batch that still needs work and brings it up to
    /// the probing phase.
    fn select_batch(&mut self) -> Result<Option<Arc<ParallelBatch>>> {
        if self.nbatch == 0 {
            return Ok(None);
        }
        let start = match self.next_batch {
            Some(next) => next,
            None => self.shared.next_start_batch(),
        };
        let mut batchno = start;
        while self.batches_visited < self.nbatch {
            let current = batchno % self.nbatch;
            batchno += 1;
            self.batches_visited += 1;
            self.next_batch = Some(batchno);

            let batch = self
                .shared
                .batch(current)
                .ok_or_else(|| JoinError::Internal(format!("batch {} does not exist", current)))?;
            if batch.is_done() {
                continue;
            }
            if self.attach_batch(&batch)? {
                return Ok(Some(batch));
            }
        }
        Ok(None)
    }

    /// Follows `batch` from the phase its barrier is in. Returns false if the
    /// batch turned out to be finished.
    fn attach_batch(&mut self, batch: &Arc<ParallelBatch>) -> Result<bool> {
        let barrier = batch.barrier();
        let mut phase = barrier.attach();
        self.attached_batch = Some(Arc::clone(batch));

        loop {
            match BatchPhase::from_phase(phase) {
                BatchPhase::Electing => {
                    if barrier.arrive_and_wait() {
                        self.shared.allocate_batch(batch)?;
                    }
                }
                BatchPhase::Allocating => {
                    barrier.arrive_and_wait();
                }
                BatchPhase::Loading => {
                    self.load_batch(batch)?;
                    barrier.arrive_and_wait();
                }
                BatchPhase::Probing => {
                    debug!("Worker {} probing batch {}", self.worker_id, batch.batchno());
                    return Ok(true);
                }
                BatchPhase::Done => {
                    barrier.detach();
                    self.attached_batch = None;
                    return Ok(false);
                }
            }
            self.check_aborted()?;
            phase += 1;
        }
    }

    fn load_batch(&self, batch: &ParallelBatch) -> Result<()> {
        let Some(inner_files) = &self.inner_files else {
            return Ok(());
        };
        let mut loaded = 0;
        while let Some((hash, tuple)) = inner_files.read_next(batch.batchno())? {
            let mut store = batch.store().write();
            store
                .as_mut()
                .ok_or_else(|| JoinError::Internal(format!("batch {} has no store", batch.batchno())))?
                .insert(hash, tuple);
            loaded += 1;
        }
        trace!(
            "Worker {} loaded {} inner tuples into batch {}",
            self.worker_id,
            loaded,
            batch.batchno()
        );
        Ok(())
    }

    fn next_outer_row(&mut self, batch: &ParallelBatch) -> Result<Option<HashedTuple>> {
        if self.nbatch == 1 {
            return self.outer.next();
        }
        let Some(outer_files) = &self.outer_files else {
            return Ok(None);
        };
        Ok(outer_files
            .read_next(batch.batchno())?
            .map(|(hash, tuple)| HashedTuple {
                tuple,
                hash: Some(hash),
            }))
    }

    /// Next output row of `batch`, or `None` once its outer side is used up.
    fn probe_batch(&mut self, batch: &ParallelBatch) -> Result<Option<Tuple>> {
        let join_type = self.join_type();
        let single_match = self.plan.single_match();

        loop {
            if self.probe.is_none() {
                let Some(row) = self.next_outer_row(batch)? else {
                    return Ok(None);
                };
                let Some(hash) = row.hash else {
                    if join_type.fills_outer() {
                        if let Some(output) = self.plan.project_outer_unmatched(&row.tuple)? {
                            return Ok(Some(output));
                        }
                    }
                    continue;
                };
                let cursor = batch.store().read().as_ref().and_then(|s| s.chain_head(hash));
                self.probe = Some(ParallelProbe {
                    tuple: row.tuple,
                    hash,
                    cursor,
                    matched: false,
                });
            }

            let guard = batch.store().read();
            let store = guard
                .as_ref()
                .ok_or_else(|| JoinError::Internal(format!("batch {} probed without a store", batch.batchno())))?;
            let Some(probe) = self.probe.as_mut() else {
                continue;
            };
            while let Some(idx) = probe.cursor {
                probe.cursor = store.next_in_chain(idx);
                let Some(entry) = store.entry(idx) else {
                    break;
                };
                if entry.hash() != probe.hash || !self.plan.matches(&probe.tuple, entry.tuple())? {
                    continue;
                }
                probe.matched = true;
                let output = if join_type == JoinType::Anti {
                    None
                } else {
                    self.plan.project_match(&probe.tuple, entry.tuple())?
                };
                if single_match {
                    probe.cursor = None;
                }
                if let Some(output) = output {
                    return Ok(Some(output));
                }
            }
            drop(guard);

            if let Some(probe) = self.probe.take() {
                if !probe.matched && join_type.fills_outer() {
                    if let Some(output) = self.plan.project_outer_unmatched(&probe.tuple)? {
                        return Ok(Some(output));
                    }
                }
            }
        }
    }

    /// Leaves a batch whose outer side this worker has run out of; the last
    /// worker out frees it.
    fn finish_batch(&mut self, batch: &ParallelBatch) {
        self.probe = None;
        self.attached_batch = None;
        if batch.barrier().arrive_and_detach() {
            self.shared.release_batch(batch);
        }
    }

    fn step(&mut self) -> Result<Option<Tuple>> {
        loop {
            match &self.phase {
                WorkerPhase::Build => {
                    self.build()?;
                    self.phase = WorkerPhase::SelectBatch;
                }
                WorkerPhase::SelectBatch => {
                    self.check_aborted()?;
                    self.phase = match self.select_batch()? {
                        Some(batch) => WorkerPhase::Probe(batch),
                        None => {
                            debug!(
                                "Worker {} finished after emitting {} rows",
                                self.worker_id, self.rows_emitted
                            );
                            WorkerPhase::Done
                        }
                    };
                }
                WorkerPhase::Probe(batch) => {
                    let batch = Arc::clone(batch);
                    if let Some(output) = self.probe_batch(&batch)? {
                        return Ok(Some(output));
                    }
                    self.finish_batch(&batch);
                    self.phase = WorkerPhase::SelectBatch;
                }
                WorkerPhase::Done => return Ok(None),
            }
        }
    }

    /// Leaves every barrier this worker is attached to.
    fn detach_all(&mut self) {
        if self.attached_grow {
            self.shared.grow_barrier().detach();
            self.attached_grow = false;
        }
        if self.attached_build {
            self.shared.build_barrier().detach();
            self.attached_build = false;
        }
        if let Some(batch) = self.attached_batch.take() {
            let barrier = batch.barrier();
            // Probing is always left by arriving, so the batch ends properly.
            if BatchPhase::from_phase(barrier.phase()) == BatchPhase::Probing {
                if barrier.arrive_and_detach() {
                    self.shared.release_batch(&batch);
                }
            } else {
                barrier.detach();
            }
        }
    }
}

impl RowSource for ParallelHashJoinExecutor {
    fn init(&mut self) -> Result<()> {
        if !self.initialized {
            debug!("Initializing parallel hash join worker {}", self.worker_id);
            self.outer.init()?;
            self.inner.init()?;
            self.initialized = true;
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        if !self.initialized {
            self.init()?;
        }
        match self.step() {
            Ok(Some(tuple)) => {
                self.rows_emitted += 1;
                Ok(Some(tuple))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!("Parallel hash join worker {} failed: {}", self.worker_id, e);
                self.shared.abort();
                self.detach_all();
                self.phase = WorkerPhase::Done;
                Err(e)
            }
        }
    }

    /// Readies this worker for another execution. The shared state must
    /// have been reset with [`ParallelHashJoinState::reset_for_rescan`] after
    /// every worker finished and before any of them runs again.
    fn rescan(&mut self) -> Result<()> {
        self.detach_all();
        let keys = self.plan.get_keys();
        self.outer = InputAdapter::new(
            Box::new(self.shared.outer_source()),
            keys.outer_columns().to_vec(),
            keys.hash_function(),
        );
        self.inner = InputAdapter::new(
            Box::new(self.shared.inner_source()),
            keys.inner_columns().to_vec(),
            keys.hash_function(),
        );
        self.phase = WorkerPhase::Build;
        self.probe = None;
        self.nbatch = 0;
        self.inner_files = None;
        self.outer_files = None;
        self.next_batch = None;
        self.batches_visited = 0;
        self.rows_emitted = 0;
        self.initialized = false;
        debug!("Worker {} rescanned", self.worker_id);
        Ok(())
    }
}

impl Drop for ParallelHashJoinExecutor {
    fn drop(&mut self) {
        if self.attached_build || self.attached_grow || self.attached_batch.is_some() {
            debug!("Worker {} cancelled; detaching from shared state", self.worker_id);
            self.detach_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::JoinConfig;
    use crate::execution::executors::hash_join_executor::HashJoinExecutor;
    use crate::execution::executors::values_executor::ValuesExecutor;
    use crate::execution::expressions::join_keys::JoinKeys;
    use crate::types_db::value::Value;
    use std::thread;
    use tempfile::TempDir;

    fn row(id: Option<i64>, payload: &str) -> Tuple {
        Tuple::new(vec![Value::from(id), Value::from(payload)])
    }

    fn plan(join_type: JoinType) -> Arc<HashJoinPlan> {
        Arc::new(HashJoinPlan::new(join_type, JoinKeys::single(0, 0), 2, 2))
    }

    fn run_parallel(
        join_type: JoinType,
        outer: Vec<Tuple>,
        inner: Vec<Tuple>,
        config: JoinConfig,
        workers: usize,
    ) -> (Vec<String>, Arc<ParallelHashJoinState>) {
        let shared = ParallelHashJoinState::new(
            plan(join_type),
            Box::new(ValuesExecutor::new(outer)),
            Box::new(ValuesExecutor::new(inner)),
            config,
        )
        .unwrap();

        let mut out: Vec<String> = thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|id| {
                    let shared = Arc::clone(&shared);
                    s.spawn(move || {
                        let mut worker = ParallelHashJoinExecutor::new(shared, id);
                        let mut rows = Vec::new();
                        while let Some(t) = worker.next().unwrap() {
                            rows.push(t.to_string());
                        }
                        rows
                    })
                })
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
        });
        out.sort();
        (out, shared)
    }

    fn run_classic(join_type: JoinType, outer: Vec<Tuple>, inner: Vec<Tuple>) -> Vec<String> {
        let mut exec = HashJoinExecutor::new(
            plan(join_type),
            Box::new(ValuesExecutor::new(outer)),
            Box::new(ValuesExecutor::new(inner)),
            JoinConfig::default(),
        );
        let mut out = Vec::new();
        while let Some(t) = exec.next().unwrap() {
            out.push(t.to_string());
        }
        out.sort();
        out
    }

    #[test]
    fn test_single_worker_inner_join() {
        let inner = vec![row(Some(1), "a"), row(Some(2), "b"), row(Some(2), "c")];
        let outer = vec![row(Some(2), "x"), row(Some(3), "y")];
        let (out, shared) = run_parallel(JoinType::Inner, outer, inner, JoinConfig::default(), 1);
        assert_eq!(out, vec!["(2, b, 2, x)", "(2, c, 2, x)"]);
        assert_eq!(shared.nbatch(), 1);
        assert!(shared.batch(0).unwrap().is_done());
        assert_eq!(shared.build_barrier().participants(), 0);
        // A single batch has no outer partitioning to wait for.
        assert_eq!(
            BuildPhase::from_phase(shared.build_barrier().phase()),
            BuildPhase::HashingOuter
        );
    }

    #[test]
    fn test_workers_agree_with_classic_join() {
        let inner: Vec<Tuple> = (0..3000)
            .map(|i| row(if i % 97 == 0 { None } else { Some(i % 1000) }, "inner"))
            .collect();
        let outer: Vec<Tuple> = (0..2000)
            .map(|i| row(if i % 89 == 0 { None } else { Some(i % 1300) }, "outer"))
            .collect();

        for join_type in [JoinType::Inner, JoinType::Left, JoinType::Semi, JoinType::Anti] {
            let expected = run_classic(join_type, outer.clone(), inner.clone());
            for workers in [1, 4] {
                let (out, _) = run_parallel(join_type, outer.clone(), inner.clone(), JoinConfig::default(), workers);
                assert_eq!(out, expected, "{} join with {} workers", join_type, workers);
            }
        }
    }

    #[test]
    fn test_workers_share_spilled_batches() {
        let dir = TempDir::new().unwrap();
        let config = JoinConfig::default()
            .with_work_mem(16 * 1024)
            .with_min_buckets(64)
            .with_spill_dir(dir.path());
        let inner: Vec<Tuple> = (0..4000).map(|i| row(Some(i % 1500), "inner-payload")).collect();
        let outer: Vec<Tuple> = (0..3000).map(|i| row(Some(i % 2000), "outer")).collect();

        let (single, shared) = run_parallel(JoinType::Left, outer.clone(), inner.clone(), config.clone(), 1);
        assert!(shared.nbatch() > 1);
        let (many, shared) = run_parallel(JoinType::Left, outer.clone(), inner.clone(), config, 4);
        assert!(shared.nbatch() > 1);
        assert_eq!(many, single);
        assert_eq!(single, run_classic(JoinType::Left, outer, inner));
        for batchno in 0..shared.nbatch() {
            assert!(shared.batch(batchno).unwrap().is_done());
        }
        assert_eq!(BuildPhase::from_phase(shared.build_barrier().phase()), BuildPhase::Done);
    }

    #[test]
    fn test_late_worker_finds_nothing_left() {
        let inner = vec![row(Some(1), "a")];
        let outer = vec![row(Some(1), "x")];
        let (out, shared) = run_parallel(JoinType::Inner, outer, inner, JoinConfig::default(), 2);
        assert_eq!(out, vec!["(1, a, 1, x)"]);

        let mut late = ParallelHashJoinExecutor::new(shared, 9);
        assert!(late.next().unwrap().is_none());
        assert_eq!(late.rows_emitted(), 0);
    }

    #[test]
    fn test_dropped_worker_detaches() {
        let inner: Vec<Tuple> = (0..10).map(|i| row(Some(i), "i")).collect();
        let outer: Vec<Tuple> = (0..10).map(|i| row(Some(i), "o")).collect();
        let shared = ParallelHashJoinState::new(
            plan(JoinType::Inner),
            Box::new(ValuesExecutor::new(outer)),
            Box::new(ValuesExecutor::new(inner)),
            JoinConfig::default(),
        )
        .unwrap();

        let mut worker = ParallelHashJoinExecutor::new(Arc::clone(&shared), 0);
        assert!(worker.next().unwrap().is_some());
        let batch = shared.batch(0).unwrap();
        assert_eq!(batch.barrier().participants(), 1);
        drop(worker);

        assert_eq!(batch.barrier().participants(), 0);
        assert!(batch.is_done());
        assert_eq!(shared.build_barrier().participants(), 0);
        assert_eq!(shared.grow_barrier().participants(), 0);
    }

    #[test]
    fn test_rescan_repeats_output() {
        let dir = TempDir::new().unwrap();
        let config = JoinConfig::default()
            .with_work_mem(16 * 1024)
            .with_min_buckets(64)
            .with_spill_dir(dir.path());
        let inner: Vec<Tuple> = (0..3000).map(|i| row(Some(i % 1200), "inner-payload")).collect();
        let outer: Vec<Tuple> = (0..2000).map(|i| row(Some(i % 1500), "outer")).collect();
        let shared = ParallelHashJoinState::new(
            plan(JoinType::Left),
            Box::new(ValuesExecutor::new(outer)),
            Box::new(ValuesExecutor::new(inner)),
            config,
        )
        .unwrap();

        let drain = |worker: &mut ParallelHashJoinExecutor| {
            let mut out = Vec::new();
            while let Some(t) = worker.next().unwrap() {
                out.push(t.to_string());
            }
            out.sort();
            out
        };

        let mut worker = ParallelHashJoinExecutor::new(Arc::clone(&shared), 0);
        let first = drain(&mut worker);
        assert_eq!(first.len(), 4800);
        assert!(shared.nbatch() > 1);

        shared.reset_for_rescan().unwrap();
        assert_eq!(shared.nbatch(), 0);
        worker.rescan().unwrap();
        assert_eq!(worker.rows_emitted(), 0);
        assert_eq!(drain(&mut worker), first);
        assert!(shared.nbatch() > 1);
    }
}
