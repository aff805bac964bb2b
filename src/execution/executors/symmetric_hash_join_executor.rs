use std::sync::Arc;

use log::{debug, trace};

use crate::common::config::JoinConfig;
use crate::common::exception::{JoinError, Result};
use crate::container::hash_join_table::{
    EntryRef, GrowthMode, HashJoinTable, HashTableSizing, HashTableStats, Placement, UnmatchedCursor,
};
use crate::execution::executors::abstract_executor::RowSource;
use crate::execution::executors::input_adapter::InputAdapter;
use crate::execution::plans::hash_join_plan::{HashJoinPlan, JoinType};
use crate::storage::table::tuple::Tuple;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymmetricJoinState {
    BuildHashTables,
    NeedNewInner,
    /// The inner row just read probes the outer table.
    ScanOuterBucket,
    NeedNewOuter,
    /// The outer row just read probes the inner table.
    ScanInnerBucket,
    /// Unmatched inner rows first, then unmatched outer rows.
    FillUnmatched,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Inner,
    Outer,
}

enum Transition {
    Continue,
    Emit(Tuple),
    Finished,
}

struct SymmetricProbe {
    side: Side,
    tuple: Tuple,
    hash: u32,
    /// Where the row itself was stored in its own table.
    own_entry: Option<EntryRef>,
    cursor: Option<EntryRef>,
    matched: bool,
}

/// Pipelined hash join that builds a table for each input as rows arrive.
///
/// Rows are pulled alternately from the inner and the outer input. Every row
/// is added to its own side's table and immediately probes the other one, so
/// each matching pair is found exactly once: by whichever of the two rows
/// arrived second. Both tables stay in memory.
pub struct SymmetricHashJoinExecutor {
    plan: Arc<HashJoinPlan>,
    config: JoinConfig,
    outer: InputAdapter,
    inner: InputAdapter,
    inner_table: Option<HashJoinTable>,
    outer_table: Option<HashJoinTable>,
    state: SymmetricJoinState,
    probe: Option<SymmetricProbe>,
    fill_side: Side,
    unmatched: UnmatchedCursor,
    initialized: bool,
}

impl SymmetricHashJoinExecutor {
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
            inner_table: None,
            outer_table: None,
            state: SymmetricJoinState::BuildHashTables,
            probe: None,
            fill_side: Side::Inner,
            unmatched: UnmatchedCursor::default(),
            initialized: false,
        }
    }

    pub fn state(&self) -> SymmetricJoinState {
        self.state
    }

    pub fn inner_stats(&self) -> Option<HashTableStats> {
        self.inner_table.as_ref().map(HashJoinTable::stats)
    }

    pub fn outer_stats(&self) -> Option<HashTableStats> {
        self.outer_table.as_ref().map(HashJoinTable::stats)
    }

    fn join_type(&self) -> JoinType {
        self.plan.get_join_type()
    }

    fn create_table(&self, keep_nulls: bool) -> Result<HashJoinTable> {
        let sizing = HashTableSizing::choose(
            self.plan.get_estimated_inner_rows(),
            self.plan.get_inner_row_width(),
            &self.config,
            false,
        );
        let sizing = HashTableSizing { nbatch: 1, ..sizing };
        Ok(
            HashJoinTable::with_sizing(sizing, &self.config, keep_nulls, self.plan.get_keys().hash_function())?
                .with_growth_mode(GrowthMode::InMemory),
        )
    }

    fn build_hash_tables(&mut self) -> Result<Transition> {
        let join_type = self.join_type();
        self.inner_table = Some(self.create_table(join_type.fills_inner())?);
        self.outer_table = Some(self.create_table(join_type.fills_outer())?);
        self.probe = None;
        self.unmatched = UnmatchedCursor::default();
        self.state = SymmetricJoinState::NeedNewInner;
        Ok(Transition::Continue)
    }

    /// The input to read after a row from `side`: the other one, unless it
    /// has run dry.
    fn next_pull(&self, side: Side) -> SymmetricJoinState {
        match side {
            Side::Inner if !self.outer.is_exhausted() => SymmetricJoinState::NeedNewOuter,
            Side::Outer if !self.inner.is_exhausted() => SymmetricJoinState::NeedNewInner,
            Side::Inner => SymmetricJoinState::NeedNewInner,
            Side::Outer => SymmetricJoinState::NeedNewOuter,
        }
    }

    fn step(&mut self) -> Result<Transition> {
        match self.state {
            SymmetricJoinState::BuildHashTables => self.build_hash_tables(),
            SymmetricJoinState::NeedNewInner => self.need_new_row(Side::Inner),
            SymmetricJoinState::NeedNewOuter => self.need_new_row(Side::Outer),
            SymmetricJoinState::ScanOuterBucket | SymmetricJoinState::ScanInnerBucket => self.scan_bucket(),
            SymmetricJoinState::FillUnmatched => match self.fill_side {
                Side::Inner => self.fill_inner_tuples(),
                Side::Outer => self.fill_outer_tuples(),
            },
            SymmetricJoinState::Done => Ok(Transition::Finished),
        }
    }

    fn need_new_row(&mut self, side: Side) -> Result<Transition> {
        let row = match side {
            Side::Inner => self.inner.next()?,
            Side::Outer => self.outer.next()?,
        };
        let Some(row) = row else {
            if self.inner.is_exhausted() && self.outer.is_exhausted() {
                debug!(
                    "Both inputs exhausted ({} inner, {} outer rows); starting fill pass",
                    self.inner.rows_read(),
                    self.outer.rows_read()
                );
                return Ok(self.start_fill());
            }
            self.state = self.next_pull(side);
            return Ok(Transition::Continue);
        };

        let next_pull = self.next_pull(side);
        let own = match side {
            Side::Inner => self.inner_table.as_mut(),
            Side::Outer => self.outer_table.as_mut(),
        }
        .ok_or_else(missing_tables)?;

        let Some(hash) = row.hash else {
            // NULL keys are only stored for the fill pass.
            own.insert(None, row.tuple)?;
            self.state = next_pull;
            return Ok(Transition::Continue);
        };

        let own_entry = match own.insert(Some(hash), row.tuple.clone())? {
            Placement::Resident(entry) => Some(entry),
            Placement::Spilled(batch) => {
                return Err(JoinError::Internal(format!(
                    "in-memory table spilled a tuple to batch {}",
                    batch
                )));
            }
            Placement::Discarded => None,
        };

        let other = match side {
            Side::Inner => self.outer_table.as_ref(),
            Side::Outer => self.inner_table.as_ref(),
        }
        .ok_or_else(missing_tables)?;
        let cursor = other.chain_start(hash, None);

        trace!("Probing {:?} row {} against the opposite table", side, row.tuple);
        self.probe = Some(SymmetricProbe {
            side,
            tuple: row.tuple,
            hash,
            own_entry,
            cursor,
            matched: false,
        });
        self.state = match side {
            Side::Inner => SymmetricJoinState::ScanOuterBucket,
            Side::Outer => SymmetricJoinState::ScanInnerBucket,
        };
        Ok(Transition::Continue)
    }

    /// Walks the opposite table's bucket for the row just read.
    fn scan_bucket(&mut self) -> Result<Transition> {
        let join_type = self.join_type();
        let side = self
            .probe
            .as_ref()
            .map(|p| p.side)
            .ok_or_else(|| JoinError::Internal("symmetric scan without a current row".into()))?;
        let next_pull = self.next_pull(side);
        let Some(probe) = self.probe.as_mut() else {
            return Err(JoinError::Internal("symmetric scan without a current row".into()));
        };
        let (Some(inner_table), Some(outer_table)) = (self.inner_table.as_mut(), self.outer_table.as_mut()) else {
            return Err(missing_tables());
        };
        let (own, other) = match side {
            Side::Inner => (inner_table, outer_table),
            Side::Outer => (outer_table, inner_table),
        };
        // An outer row is finished with after its first match for these.
        let single_match = side == Side::Outer && self.plan.single_match();

        while let Some(candidate) = other.find_candidate(probe.hash, probe.cursor) {
            probe.cursor = other.successor(candidate);
            let Some(entry) = other.entry(candidate) else {
                break;
            };
            let (outer, inner, outer_seen) = match side {
                Side::Inner => (entry.tuple(), &probe.tuple, entry.is_matched()),
                Side::Outer => (&probe.tuple, entry.tuple(), probe.matched),
            };
            if !self.plan.matches(outer, inner)? {
                continue;
            }

            let output = match join_type {
                JoinType::Anti => None,
                JoinType::Semi if outer_seen => None,
                _ => self.plan.project_match(outer, inner)?,
            };
            other.mark_matched(candidate);
            if let Some(own_entry) = probe.own_entry {
                own.mark_matched(own_entry);
            }
            probe.matched = true;

            if single_match {
                self.state = next_pull;
                return Ok(match output {
                    Some(output) => Transition::Emit(output),
                    None => Transition::Continue,
                });
            }
            if let Some(output) = output {
                return Ok(Transition::Emit(output));
            }
        }

        self.probe = None;
        self.state = next_pull;
        Ok(Transition::Continue)
    }

    fn start_fill(&mut self) -> Transition {
        self.unmatched = UnmatchedCursor::default();
        let join_type = self.join_type();
        if join_type.fills_inner() {
            self.fill_side = Side::Inner;
        } else if join_type.fills_outer() {
            self.fill_side = Side::Outer;
        } else {
            return Transition::Finished;
        }
        self.state = SymmetricJoinState::FillUnmatched;
        Transition::Continue
    }

    fn fill_inner_tuples(&mut self) -> Result<Transition> {
        let table = self.inner_table.as_ref().ok_or_else(missing_tables)?;
        let Some(unmatched) = table.next_unmatched(&mut self.unmatched) else {
            self.unmatched = UnmatchedCursor::default();
            if !self.join_type().fills_outer() {
                return Ok(Transition::Finished);
            }
            self.fill_side = Side::Outer;
            return Ok(Transition::Continue);
        };
        let tuple = table.entry(unmatched).map(|e| e.tuple()).ok_or_else(missing_entry)?;
        Ok(match self.plan.project_inner_unmatched(tuple)? {
            Some(output) => Transition::Emit(output),
            None => Transition::Continue,
        })
    }

    fn fill_outer_tuples(&mut self) -> Result<Transition> {
        let table = self.outer_table.as_ref().ok_or_else(missing_tables)?;
        let Some(unmatched) = table.next_unmatched(&mut self.unmatched) else {
            return Ok(Transition::Finished);
        };
        let tuple = table.entry(unmatched).map(|e| e.tuple()).ok_or_else(missing_entry)?;
        Ok(match self.plan.project_outer_unmatched(tuple)? {
            Some(output) => Transition::Emit(output),
            None => Transition::Continue,
        })
    }
}

fn missing_tables() -> JoinError {
    JoinError::Internal("symmetric hash tables used before init".into())
}

fn missing_entry() -> JoinError {
    JoinError::Internal("unmatched entry vanished during fill pass".into())
}

impl RowSource for SymmetricHashJoinExecutor {
    fn init(&mut self) -> Result<()> {
        if !self.initialized {
            debug!("Initializing symmetric hash join executor: {}", self.plan);
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
                    if self.state != SymmetricJoinState::Done {
                        debug!(
                            "Symmetric hash join finished: {} inner, {} outer tuples stored",
                            self.inner_table.as_ref().map_or(0, HashJoinTable::total_tuples),
                            self.outer_table.as_ref().map_or(0, HashJoinTable::total_tuples)
                        );
                        self.state = SymmetricJoinState::Done;
                    }
                    return Ok(None);
                }
            }
        }
    }

    /// Both tables are rebuilt, since either input may have changed.
    fn rescan(&mut self) -> Result<()> {
        self.outer.rescan()?;
        self.inner.rescan()?;
        self.state = SymmetricJoinState::BuildHashTables;
        self.probe = None;
        Ok(())
    }
}
