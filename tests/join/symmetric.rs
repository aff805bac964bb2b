use std::sync::Arc;

use hybrid_hashjoin::common::config::JoinConfig;
use hybrid_hashjoin::execution::executors::abstract_executor::RowSource;
use hybrid_hashjoin::execution::executors::hash_join_executor::HashJoinExecutor;
use hybrid_hashjoin::execution::executors::symmetric_hash_join_executor::{
    SymmetricHashJoinExecutor, SymmetricJoinState,
};
use hybrid_hashjoin::execution::expressions::join_keys::JoinKeys;
use hybrid_hashjoin::execution::plans::hash_join_plan::{HashJoinPlan, JoinType};
use hybrid_hashjoin::storage::table::tuple::Tuple;

use crate::assert_ok;
use crate::common::logger::init_test_logger;
use crate::common::rows::{collect_sorted, keyed_rows, random_rows, rendered, row, source};

const ALL_JOIN_TYPES: [JoinType; 6] = [
    JoinType::Inner,
    JoinType::Left,
    JoinType::Right,
    JoinType::Full,
    JoinType::Semi,
    JoinType::Anti,
];

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

fn symmetric(join_type: JoinType, outer: &[Tuple], inner: &[Tuple]) -> Vec<Tuple> {
    let mut executor = SymmetricHashJoinExecutor::new(
        plan(join_type),
        source(outer.to_vec()),
        source(inner.to_vec()),
        JoinConfig::default(),
    );
    let rows = collect_sorted(&mut executor);
    assert_eq!(executor.state(), SymmetricJoinState::Done);
    rows
}

#[test]
fn test_basic_equi_join() {
    init_test_logger();
    let inner = vec![row(Some(1), "a"), row(Some(2), "b"), row(Some(2), "c")];
    let outer = vec![row(Some(2), "x"), row(Some(3), "y")];

    let rows = symmetric(JoinType::Inner, &outer, &inner);
    assert_eq!(rendered(&rows), vec!["(2, b, 2, x)", "(2, c, 2, x)"]);
}

#[test]
fn test_matches_classic_on_random_inputs() {
    init_test_logger();
    for seed in 0..4u64 {
        let inner = random_rows(seed * 2, 700, 300, 10);
        let outer = random_rows(seed * 2 + 1, 500, 400, 10);
        for join_type in ALL_JOIN_TYPES {
            assert_eq!(
                symmetric(join_type, &outer, &inner),
                classic(join_type, &outer, &inner),
                "{} join, seed {}",
                join_type,
                seed
            );
        }
    }
}

#[test]
fn test_one_side_empty() {
    let rows = keyed_rows([1, 2, 3], "r");
    for join_type in ALL_JOIN_TYPES {
        assert_eq!(symmetric(join_type, &rows, &[]), classic(join_type, &rows, &[]));
        assert_eq!(symmetric(join_type, &[], &rows), classic(join_type, &[], &rows));
    }
}

#[test]
fn test_duplicate_keys_on_both_sides() {
    let inner = keyed_rows([5, 5, 5], "i");
    let outer = keyed_rows([5, 5], "o");

    assert_eq!(symmetric(JoinType::Inner, &outer, &inner).len(), 6);
    assert_eq!(symmetric(JoinType::Semi, &outer, &inner).len(), 2);
    assert!(symmetric(JoinType::Anti, &outer, &inner).is_empty());
    assert_eq!(symmetric(JoinType::Full, &outer, &inner).len(), 6);
}

#[test]
fn test_feeds_classic_join() {
    // A symmetric join used as the outer input of a classic join.
    let a = keyed_rows([1, 2, 3, 4], "a");
    let b = keyed_rows([2, 4, 4], "b");
    let c = keyed_rows([4, 9], "c");

    let first = SymmetricHashJoinExecutor::new(plan(JoinType::Inner), source(a), source(b), JoinConfig::default());
    let second_plan = HashJoinPlan::new(JoinType::Right, JoinKeys::single(0, 0), 4, 2);
    let mut second = HashJoinExecutor::new(
        Arc::new(second_plan),
        Box::new(first) as Box<dyn RowSource>,
        source(c),
        JoinConfig::default(),
    );
    assert_eq!(
        rendered(&collect_sorted(&mut second)),
        vec![
            "(4, c, 4, b, 4, a)",
            "(4, c, 4, b, 4, a)",
            "(9, c, NULL, NULL, NULL, NULL)"
        ]
    );
}

#[test]
fn test_rescan_repeats_output() {
    let inner = random_rows(11, 200, 50, 0);
    let outer = random_rows(12, 200, 60, 0);
    let mut executor = SymmetricHashJoinExecutor::new(
        plan(JoinType::Full),
        source(outer),
        source(inner),
        JoinConfig::default(),
    );

    let first = collect_sorted(&mut executor);
    assert_ok!(executor.rescan());
    assert_eq!(collect_sorted(&mut executor), first);
    assert_eq!(executor.inner_stats().unwrap().total_tuples, 200);
    assert_eq!(executor.outer_stats().unwrap().total_tuples, 200);
}
