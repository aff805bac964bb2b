use std::sync::Arc;

use log::{debug, trace};

use crate::common::config::JoinConfig;
use crate::common::exception::{JoinError, Result};
use crate::container::hash_join_table::{EntryRef, HashJoinTable, HashTableStats, UnmatchedCursor};
use crate::execution::executors::abstract_executor::RowSource;
use crate::execution::executors::input_adapter::{HashedTuple, InputAdapter};
use crate::execution::plans::hash_join_plan::{HashJoinPlan, JoinType};
use crate::storage::table::tuple::Tuple;

/// States of the build/probe loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashJoinState {
    BuildHashTable,
    NeedNewOuter,
    ScanInnerBucket,
    FillOuterTuple,
    FillInnerTuples,
    NeedNewBatch,
    Done,
}

/// Result of running one state.
enum Transition {
    Continue,
    Emit(Tuple),
    Finished,
}

/// The outer row currently being probed.
struct OuterProbe {
    tuple: Tuple,
    hash: u32,
    skew_slot: Option<usize>,
    /// Next candidate entry in the row's chain.
    cursor: Option<EntryRef>,
    matched: bool,
}

/// Hybrid hash join: builds a hash table over the whole inner input, then
/// streams the outer input past it one batch at a time.
///
/// Inner tuples that do not fit the work memory are spilled by the table;
/// outer rows of non-resident batches are spilled here and joined once their
/// batch is loaded.
pub struct HashJoinExecutor {
    plan: Arc<HashJoinPlan>,
    config: JoinConfig,
    outer: InputAdapter,
    inner: InputAdapter,
    table: Option<HashJoinTable>,
    state: HashJoinState,
    probe: Option<OuterProbe>,
    /// Outer row fetched before the build to detect an empty outer input.
    prefetched: Option<HashedTuple>,
    unmatched: UnmatchedCursor,
    initialized: bool,
}

impl HashJoinExecutor {
    pub fn new(
        plan: Arc<HashJoinPlan>,
        outer: Box<dyn RowSource>,
        inner: Box<dyn RowSource>,
        config: JoinConfig,
    ) -> Self {
        let keys = plan.get_keys();
        let outer = InputAdapter::new(outer, keys.outer_columns().to_vec(), keys.hash_function());
        let inner = InputAdapter::new(inner, keys.inner_columns().to_vec(), keys.hash_function());
        Self {
            plan,
            config,
            outer,
            inner,
            table: None,
            state: HashJoinState::BuildHashTable,
            probe: None,
            prefetched: None,
            unmatched: UnmatchedCursor::default(),
            initialized: false,
        }
    }

    pub fn state(&self) -> HashJoinState {
        self.state
    }

    pub fn get_plan(&self) -> &Arc<HashJoinPlan> {
        &self.plan
    }

    /// Counters of the current hash table, once it has been built.
    pub fn stats(&self) -> Option<HashTableStats> {
        self.table.as_ref().map(HashJoinTable::stats)
    }

    /// Restarts the join.
    ///
    /// A single-batch table is kept and only its match flags are cleared,
    /// unless the inner input changed; anything else is rebuilt from scratch.
    pub fn rescan_with(&mut self, inner_changed: bool) -> Result<()> {
        let reuse = !inner_changed && self.table.as_ref().is_some_and(|t| t.nbatch() == 1);
        if reuse {
            debug!("Rescanning hash join, reusing single-batch hash table");
            if let Some(table) = self.table.as_mut() {
                table.reset_match_flags();
            }
            self.state = HashJoinState::NeedNewOuter;
        } else {
            debug!("Rescanning hash join, rebuilding hash table");
            self.table = None;
            self.inner.rescan()?;
            self.state = HashJoinState::BuildHashTable;
        }
        self.outer.rescan()?;
        self.probe = None;
        self.prefetched = None;
        self.unmatched = UnmatchedCursor::default();
        Ok(())
    }

    fn join_type(&self) -> JoinType {
        self.plan.get_join_type()
    }

    fn step(&mut self) -> Result<Transition> {
        match self.state {
            HashJoinState::BuildHashTable => self.build_hash_table(),
            HashJoinState::NeedNewOuter => self.need_new_outer(),
            HashJoinState::ScanInnerBucket => self.scan_inner_bucket(),
            HashJoinState::FillOuterTuple => self.fill_outer_tuple(),
            HashJoinState::FillInnerTuples => self.fill_inner_tuples(),
            HashJoinState::NeedNewBatch => self.need_new_batch(),
            HashJoinState::Done => Ok(Transition::Finished),
        }
    }

    fn build_hash_table(&mut self) -> Result<Transition> {
        let join_type = self.join_type();

        // Without inner fill, an empty outer input means no output at all.
        if !join_type.fills_inner() {
            match self.outer.next()? {
                Some(row) => self.prefetched = Some(row),
                None => {
                    debug!("Outer input is empty; skipping hash table build");
                    return Ok(Transition::Finished);
                }
            }
        }

        let mut table = HashJoinTable::create(
            self.plan.get_estimated_inner_rows(),
            self.plan.get_inner_row_width(),
            &self.config,
            join_type.fills_inner(),
            self.plan.get_skew_hint(),
            self.plan.get_keys().hash_function(),
        )?;
        while let Some(row) = self.inner.next()? {
            table.insert(row.hash, row.tuple)?;
        }
        debug!(
            "Built hash table: {} inner tuples, {} buckets, {} batches",
            table.total_tuples(),
            table.nbuckets(),
            table.nbatch()
        );

        let empty = table.total_tuples() == 0;
        self.table = Some(table);
        if empty && !join_type.fills_outer() {
            debug!("Inner input is empty; no outer row can match");
            return Ok(Transition::Finished);
        }
        self.state = HashJoinState::NeedNewOuter;
        Ok(Transition::Continue)
    }

    /// Next outer row of the current batch: the input itself for batch 0,
    /// the batch's outer file afterwards.
    fn next_outer_row(&mut self) -> Result<Option<HashedTuple>> {
        let table = self.table.as_ref().ok_or_else(missing_table)?;
        let curbatch = table.current_batch();
        if curbatch == 0 {
            if let Some(row) = self.prefetched.take() {
                return Ok(Some(row));
            }
            return self.outer.next();
        }

        let Some(outer_files) = table.outer_batches() else {
            return Ok(None);
        };
        while let Some((hash, tuple)) = outer_files.read_next(curbatch)? {
            let batchno = table.batch_of(hash);
            if batchno != curbatch {
                // The batch count grew while this file was waiting.
                trace!("Moving outer tuple {} from batch {} to {}", tuple, curbatch, batchno);
                outer_files.append(batchno, hash, &tuple)?;
                continue;
            }
            return Ok(Some(HashedTuple {
                tuple,
                hash: Some(hash),
            }));
        }
        Ok(None)
    }

    fn need_new_outer(&mut self) -> Result<Transition> {
        let Some(row) = self.next_outer_row()? else {
            self.probe = None;
            if self.join_type().fills_inner() {
                self.unmatched = UnmatchedCursor::default();
                self.state = HashJoinState::FillInnerTuples;
            } else {
                self.state = HashJoinState::NeedNewBatch;
            }
            return Ok(Transition::Continue);
        };

        let Some(hash) = row.hash else {
            // A NULL key never matches; the row only shows up null-extended.
            if self.join_type().fills_outer() {
                self.probe = Some(OuterProbe {
                    tuple: row.tuple,
                    hash: 0,
                    skew_slot: None,
                    cursor: None,
                    matched: false,
                });
                self.state = HashJoinState::FillOuterTuple;
            }
            return Ok(Transition::Continue);
        };

        let table = self.table.as_mut().ok_or_else(missing_table)?;
        let skew_slot = table.skew_bucket_for(hash);
        let batchno = table.batch_of(hash);
        if skew_slot.is_none() && batchno != table.current_batch() {
            trace!("Saving outer tuple {} for batch {}", row.tuple, batchno);
            table.ensure_spill_files()?.outer.append(batchno, hash, &row.tuple)?;
            return Ok(Transition::Continue);
        }

        let cursor = table.chain_start(hash, skew_slot);
        self.probe = Some(OuterProbe {
            tuple: row.tuple,
            hash,
            skew_slot,
            cursor,
            matched: false,
        });
        self.state = HashJoinState::ScanInnerBucket;
        Ok(Transition::Continue)
    }

    fn scan_inner_bucket(&mut self) -> Result<Transition> {
        let join_type = self.join_type();
        let single_match = self.plan.single_match();
        let table = self.table.as_mut().ok_or_else(missing_table)?;
        let probe = self.probe.as_mut().ok_or_else(missing_probe)?;

        while let Some(candidate) = table.find_candidate(probe.hash, probe.cursor) {
            probe.cursor = table.successor(candidate);
            let Some(entry) = table.entry(candidate) else {
                break;
            };
            if !self.plan.matches(&probe.tuple, entry.tuple())? {
                continue;
            }

            let output = if join_type == JoinType::Anti {
                None
            } else {
                self.plan.project_match(&probe.tuple, entry.tuple())?
            };
            if join_type.fills_inner() {
                table.mark_matched(candidate);
            }
            probe.matched = true;

            if join_type == JoinType::Anti {
                self.state = HashJoinState::NeedNewOuter;
                return Ok(Transition::Continue);
            }
            if single_match {
                self.state = HashJoinState::NeedNewOuter;
            }
            if let Some(output) = output {
                return Ok(Transition::Emit(output));
            }
            if single_match {
                return Ok(Transition::Continue);
            }
        }

        trace!(
            "Finished bucket scan for outer tuple {} (skew bucket {:?})",
            probe.tuple, probe.skew_slot
        );
        self.state = HashJoinState::FillOuterTuple;
        Ok(Transition::Continue)
    }

    fn fill_outer_tuple(&mut self) -> Result<Transition> {
        self.state = HashJoinState::NeedNewOuter;
        let Some(probe) = self.probe.take() else {
            return Ok(Transition::Continue);
        };
        if probe.matched || !self.join_type().fills_outer() {
            return Ok(Transition::Continue);
        }
        Ok(match self.plan.project_outer_unmatched(&probe.tuple)? {
            Some(output) => Transition::Emit(output),
            None => Transition::Continue,
        })
    }

    fn fill_inner_tuples(&mut self) -> Result<Transition> {
        let table = self.table.as_ref().ok_or_else(missing_table)?;
        let Some(unmatched) = table.next_unmatched(&mut self.unmatched) else {
            self.state = HashJoinState::NeedNewBatch;
            return Ok(Transition::Continue);
        };
        let entry = table
            .entry(unmatched)
            .ok_or_else(|| JoinError::Internal(format!("unmatched entry {:?} vanished", unmatched)))?;
        Ok(match self.plan.project_inner_unmatched(entry.tuple())? {
            Some(output) => Transition::Emit(output),
            None => Transition::Continue,
        })
    }

    /// Advances to the next batch worth processing.
    ///
    /// A batch without outer tuples is skipped unless its inner tuples must be
    /// null-filled, and one without inner tuples is skipped unless its outer
    /// tuples must be.
    fn need_new_batch(&mut self) -> Result<Transition> {
        let join_type = self.join_type();
        let table = self.table.as_mut().ok_or_else(missing_table)?;
        let nbatch = table.nbatch();
        let mut curbatch = table.current_batch();
        table.close_batch(curbatch);

        let (Some(inner_files), Some(outer_files)) = (table.inner_batches(), table.outer_batches()) else {
            return Ok(Transition::Finished);
        };

        curbatch += 1;
        while curbatch < nbatch {
            let has_inner = inner_files.has_batch(curbatch);
            let has_outer = outer_files.has_batch(curbatch);
            if (has_inner && has_outer)
                || (has_outer && join_type.fills_outer())
                || (has_inner && join_type.fills_inner())
            {
                break;
            }
            trace!("Skipping batch {} (inner file: {}, outer file: {})", curbatch, has_inner, has_outer);
            table.close_batch(curbatch);
            curbatch += 1;
        }
        if curbatch >= nbatch {
            return Ok(Transition::Finished);
        }

        debug!("Starting batch {} of {}", curbatch, nbatch);
        table.reset_for_new_batch(curbatch)?;
        self.unmatched = UnmatchedCursor::default();
        self.state = HashJoinState::NeedNewOuter;
        Ok(Transition::Continue)
    }

    fn finish(&mut self) {
        self.state = HashJoinState::Done;
        self.probe = None;
        self.prefetched = None;
        if let Some(table) = &self.table {
            let stats = table.stats();
            debug!(
                "Hash join finished: {} inner tuples, {} batches ({} originally), peak space {} bytes",
                stats.total_tuples, stats.nbatch, stats.nbatch_original, stats.space_peak
            );
            if let Some(spill) = table.spill_files() {
                spill.inner.close_all();
                spill.outer.close_all();
            }
        }
    }
}

fn missing_table() -> JoinError {
    JoinError::Internal("hash table accessed before it was built".into())
}

fn missing_probe() -> JoinError {
    JoinError::Internal("bucket scan without a current outer tuple".into())
}

impl RowSource for HashJoinExecutor {
    fn init(&mut self) -> Result<()> {
        if !self.initialized {
            debug!("Initializing hash join executor: {}", self.plan);
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
        loop {
            match self.step()? {
                Transition::Continue => {}
                Transition::Emit(tuple) => return Ok(Some(tuple)),
                Transition::Finished => {
                    if self.state != HashJoinState::Done {
                        self.finish();
                    }
                    return Ok(None);
                }
            }
        }
    }

    fn rescan(&mut self) -> Result<()> {
        self.rescan_with(false)
    }
}
