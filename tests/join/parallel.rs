use std::sync::Arc;
use std::thread;

use hybrid_hashjoin::common::config::JoinConfig;
use hybrid_hashjoin::common::exception::JoinError;
use hybrid_hashjoin::concurrency::parallel_hash_join_state::ParallelHashJoinState;
use hybrid_hashjoin::execution::executors::abstract_executor::RowSource;
use hybrid_hashjoin::execution::executors::hash_join_executor::HashJoinExecutor;
use hybrid_hashjoin::execution::executors::parallel_hash_join_executor::ParallelHashJoinExecutor;
use hybrid_hashjoin::execution::expressions::join_keys::JoinKeys;
use hybrid_hashjoin::execution::plans::hash_join_plan::{HashJoinPlan, JoinType};
use hybrid_hashjoin::storage::table::tuple::Tuple;
use tempfile::TempDir;

use crate::common::logger::init_test_logger;
use crate::common::rows::{collect_sorted, random_rows, rendered, row, source, spill_config};
use crate::{assert_err, assert_ok};

fn plan(join_type: JoinType) -> Arc<HashJoinPlan> {
    Arc::new(HashJoinPlan::new(join_type, JoinKeys::single(0, 0), 2, 2))
}

fn classic(join_type: JoinType, outer: &[Tuple], inner: &[Tuple]) -> Vec<Tuple> {
    let mut executor = HashJoinExecutor::new(
        plan(join_type),
        source(outer.to_vec()),
        source(inner.to_vec()),
        JoinConfig::default(),
    );
    collect_sorted(&mut executor)
}

/// Runs `workers` participants to completion and returns their combined
/// output, sorted, along with the shared state.
fn parallel(
    join_type: JoinType,
    outer: &[Tuple],
    inner: &[Tuple],
    config: JoinConfig,
    workers: usize,
) -> (Vec<Tuple>, Arc<ParallelHashJoinState>) {
    let shared = assert_ok!(ParallelHashJoinState::new(
        plan(join_type),
        source(outer.to_vec()),
        source(inner.to_vec()),
        config,
    ));

    let mut rows: Vec<Tuple> = thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let shared = Arc::clone(&shared);
                s.spawn(move || {
                    let mut worker = ParallelHashJoinExecutor::new(shared, id);
                    collect_sorted(&mut worker)
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect()
    });
    rows.sort();
    (rows, shared)
}

#[test]
fn test_basic_equi_join() {
    init_test_logger();
    let inner = vec![row(Some(1), "a"), row(Some(2), "b"), row(Some(2), "c")];
    let outer = vec![row(Some(2), "x"), row(Some(3), "y")];

    let (rows, _) = parallel(JoinType::Inner, &outer, &inner, JoinConfig::default(), 2);
    assert_eq!(rendered(&rows), vec!["(2, b, 2, x)", "(2, c, 2, x)"]);
}

#[test]
fn test_worker_count_does_not_change_result() {
    init_test_logger();
    let inner = random_rows(21, 4000, 1500, 3);
    let outer = random_rows(22, 4000, 2000, 3);

    for join_type in [JoinType::Inner, JoinType::Left, JoinType::Semi, JoinType::Anti] {
        let expected = classic(join_type, &outer, &inner);
        for workers in [1, 3, 8] {
            let (rows, _) = parallel(join_type, &outer, &inner, JoinConfig::default(), workers);
            assert_eq!(rows, expected, "{} join with {} workers", join_type, workers);
        }
    }
}

#[test]
fn test_spilled_batches_shared_between_workers() {
    init_test_logger();
    let dir = TempDir::new().unwrap();
    let inner = random_rows(23, 3000, 1000, 0);
    let outer = random_rows(24, 3000, 1200, 0);

    for join_type in [JoinType::Inner, JoinType::Left, JoinType::Anti] {
        let expected = classic(join_type, &outer, &inner);
        let (rows, shared) = parallel(join_type, &outer, &inner, spill_config(&dir, 24 * 1024), 4);
        let stats = shared.stats().unwrap();
        assert!(stats.nbatch > 1);
        assert_eq!(rows, expected, "{} join", join_type);
    }
}

#[test]
fn test_presized_batches() {
    let dir = TempDir::new().unwrap();
    let inner = random_rows(25, 2000, 800, 0);
    let outer = random_rows(26, 1500, 900, 0);
    let expected = classic(JoinType::Inner, &outer, &inner);

    let plan = Arc::new(HashJoinPlan::new(JoinType::Inner, JoinKeys::single(0, 0), 2, 2).with_estimates(2000, 40));
    let shared = assert_ok!(ParallelHashJoinState::new(
        plan,
        source(outer),
        source(inner),
        spill_config(&dir, 32 * 1024),
    ));
    let mut rows: Vec<Tuple> = thread::scope(|s| {
        let a = s.spawn(|| collect_sorted(&mut ParallelHashJoinExecutor::new(Arc::clone(&shared), 0)));
        let b = s.spawn(|| collect_sorted(&mut ParallelHashJoinExecutor::new(Arc::clone(&shared), 1)));
        let mut rows = a.join().unwrap();
        rows.extend(b.join().unwrap());
        rows
    });
    rows.sort();

    assert!(shared.stats().unwrap().nbatch_original > 1);
    assert_eq!(rows, expected);
}

#[test]
fn test_inner_fill_join_types_rejected() {
    for join_type in [JoinType::Right, JoinType::Full] {
        assert_err!(
            ParallelHashJoinState::new(plan(join_type), source(vec![]), source(vec![]), JoinConfig::default()),
            JoinError::Unsupported(_)
        );
    }
}

/// Drains every worker on its own thread and returns the sorted union.
fn drain_workers(workers: &mut [ParallelHashJoinExecutor]) -> Vec<Tuple> {
    let mut rows: Vec<Tuple> = thread::scope(|s| {
        let handles: Vec<_> = workers
            .iter_mut()
            .map(|worker| s.spawn(move || collect_sorted(worker)))
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect()
    });
    rows.sort();
    rows
}

#[test]
fn test_rescan_repeats_output() {
    init_test_logger();
    let dir = TempDir::new().unwrap();
    let inner = random_rows(27, 3000, 1000, 2);
    let outer = random_rows(28, 2500, 1300, 2);
    let expected = classic(JoinType::Left, &outer, &inner);

    for workers in [1, 4] {
        let shared = assert_ok!(ParallelHashJoinState::new(
            plan(JoinType::Left),
            source(outer.clone()),
            source(inner.clone()),
            spill_config(&dir, 24 * 1024),
        ));
        let mut executors: Vec<_> = (0..workers)
            .map(|id| ParallelHashJoinExecutor::new(Arc::clone(&shared), id))
            .collect();

        let first = drain_workers(&mut executors);
        assert_eq!(first, expected, "first run with {} workers", workers);
        assert!(shared.nbatch() > 1);

        assert_ok!(shared.reset_for_rescan());
        for worker in &mut executors {
            assert_ok!(worker.rescan());
        }
        let second = drain_workers(&mut executors);
        assert_eq!(second, first, "rescan with {} workers", workers);
        assert!(shared.nbatch() > 1);
    }
}

#[test]
fn test_reset_refused_while_workers_attached() {
    let shared = assert_ok!(ParallelHashJoinState::new(
        plan(JoinType::Inner),
        source(vec![row(Some(1), "o"), row(Some(1), "p")]),
        source(vec![row(Some(1), "i")]),
        JoinConfig::default(),
    ));
    let mut worker = ParallelHashJoinExecutor::new(Arc::clone(&shared), 0);
    // Mid-probe, the worker still holds batch 0.
    assert!(assert_ok!(worker.next()).is_some());
    assert_err!(shared.reset_for_rescan(), JoinError::Internal(_));

    assert_eq!(collect_sorted(&mut worker).len(), 1);
    assert_ok!(shared.reset_for_rescan());
    assert_ok!(worker.rescan());
    assert_eq!(collect_sorted(&mut worker).len(), 2);
}
