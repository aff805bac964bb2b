use std::sync::Arc;

use hybrid_hashjoin::common::config::JoinConfig;
use hybrid_hashjoin::common::exception::{JoinError, Result};
use hybrid_hashjoin::container::skew_table::SkewHint;
use hybrid_hashjoin::execution::executors::abstract_executor::RowSource;
use hybrid_hashjoin::execution::executors::hash_join_executor::HashJoinExecutor;
use hybrid_hashjoin::execution::expressions::comparison_expression::{
    ComparisonExpression, ComparisonType,
};
use hybrid_hashjoin::execution::expressions::join_keys::JoinKeys;
use hybrid_hashjoin::execution::plans::hash_join_plan::{HashJoinPlan, JoinType};
use hybrid_hashjoin::storage::table::tuple::Tuple;
use hybrid_hashjoin::types_db::value::Value;
use tempfile::TempDir;

use crate::common::logger::init_test_logger;
use crate::common::rows::{collect_sorted, keyed_rows, random_rows, rendered, row, source, spill_config};
use crate::{assert_err, assert_ok};

fn plan(join_type: JoinType) -> HashJoinPlan {
    HashJoinPlan::new(join_type, JoinKeys::single(0, 0), 2, 2)
}

fn join(plan: HashJoinPlan, outer: Vec<Tuple>, inner: Vec<Tuple>, config: JoinConfig) -> (Vec<Tuple>, HashJoinExecutor) {
    let mut executor = HashJoinExecutor::new(Arc::new(plan), source(outer), source(inner), config);
    let rows = collect_sorted(&mut executor);
    (rows, executor)
}

#[test]
fn test_basic_equi_join() {
    init_test_logger();
    let inner = vec![row(Some(1), "a"), row(Some(2), "b"), row(Some(2), "c")];
    let outer = vec![row(Some(2), "x"), row(Some(3), "y")];

    let (rows, executor) = join(plan(JoinType::Inner), outer, inner, JoinConfig::default());
    assert_eq!(rendered(&rows), vec!["(2, b, 2, x)", "(2, c, 2, x)"]);
    let stats = executor.stats().unwrap();
    assert_eq!(stats.nbatch, 1);
    assert_eq!(stats.total_tuples, 3);
}

#[test]
fn test_forced_batches_give_same_result() {
    init_test_logger();
    let dir = TempDir::new().unwrap();
    let inner = random_rows(1, 3000, 1200, 0);
    let outer = random_rows(2, 2500, 1500, 0);

    let (expected, in_memory) = join(plan(JoinType::Inner), outer.clone(), inner.clone(), JoinConfig::default());
    assert_eq!(in_memory.stats().unwrap().nbatch, 1);
    assert!(!expected.is_empty());

    // Sized up front from the estimate.
    let presized = plan(JoinType::Inner).with_estimates(3000, 40);
    let (rows, executor) = join(presized, outer.clone(), inner.clone(), spill_config(&dir, 64 * 1024));
    let stats = executor.stats().unwrap();
    assert!(stats.nbatch_original >= 2);
    assert_eq!(rows, expected);

    // Discovered while building.
    let (rows, executor) = join(plan(JoinType::Inner), outer, inner, spill_config(&dir, 32 * 1024));
    let stats = executor.stats().unwrap();
    assert_eq!(stats.nbatch_original, 1);
    assert!(stats.nbatch >= 2);
    assert!(stats.batch_growths > 0);
    assert_eq!(rows, expected);
}

#[test]
fn test_every_join_type_survives_spilling() {
    init_test_logger();
    let dir = TempDir::new().unwrap();
    let inner = random_rows(3, 2000, 800, 5);
    let outer = random_rows(4, 2000, 1000, 5);

    for join_type in [
        JoinType::Inner,
        JoinType::Left,
        JoinType::Right,
        JoinType::Full,
        JoinType::Semi,
        JoinType::Anti,
    ] {
        let (expected, _) = join(plan(join_type), outer.clone(), inner.clone(), JoinConfig::default());
        for work_mem in [48 * 1024, 16 * 1024] {
            let (rows, executor) = join(plan(join_type), outer.clone(), inner.clone(), spill_config(&dir, work_mem));
            assert!(executor.stats().unwrap().nbatch > 1);
            assert_eq!(rows, expected, "{} join with work_mem {}", join_type, work_mem);
        }
    }
}

#[test]
fn test_outer_join_row_counts() {
    let inner = keyed_rows([1, 2, 2, 4], "i");
    let outer = keyed_rows([2, 3, 4, 4], "o");

    let count = |join_type| join(plan(join_type), outer.clone(), inner.clone(), JoinConfig::default()).0.len();
    // Matches: 2 twice (two inner rows), 4 twice (two outer rows).
    assert_eq!(count(JoinType::Inner), 4);
    assert_eq!(count(JoinType::Left), 5);
    assert_eq!(count(JoinType::Right), 5);
    assert_eq!(count(JoinType::Full), 6);
    assert_eq!(count(JoinType::Semi), 3);
    assert_eq!(count(JoinType::Anti), 1);
}

#[test]
fn test_null_keys_never_match() {
    let inner = vec![row(None, "i1"), row(None, "i2"), row(Some(0), "i3")];
    let outer = vec![row(None, "o1"), row(Some(0), "o2")];

    let (rows, _) = join(plan(JoinType::Inner), outer.clone(), inner.clone(), JoinConfig::default());
    assert_eq!(rendered(&rows), vec!["(0, i3, 0, o2)"]);

    let (rows, _) = join(plan(JoinType::Full), outer.clone(), inner.clone(), JoinConfig::default());
    assert_eq!(rows.len(), 4);
    assert!(rows.contains(&Tuple::new(vec![Value::Null, Value::Null, Value::Null, Value::from("o1")])));
    assert!(rows.contains(&Tuple::new(vec![Value::Null, Value::from("i2"), Value::Null, Value::Null])));

    let (rows, _) = join(plan(JoinType::Anti), outer, inner, JoinConfig::default());
    assert_eq!(rendered(&rows), vec!["(NULL, o1)"]);
}

#[test]
fn test_multi_column_keys_and_predicate() {
    // outer (a, b) joins inner (b, a) on both columns, with outer.#2 < inner.#2.
    let outer = vec![
        Tuple::new(vec![Value::from(1), Value::from("k"), Value::from(5)]),
        Tuple::new(vec![Value::from(1), Value::from("k"), Value::from(50)]),
        Tuple::new(vec![Value::from(2), Value::from("k"), Value::from(5)]),
    ];
    let inner = vec![
        Tuple::new(vec![Value::from("k"), Value::from(1), Value::from(10)]),
        Tuple::new(vec![Value::from("j"), Value::from(2), Value::from(10)]),
    ];
    let keys = assert_ok!(JoinKeys::new(vec![0, 1], vec![1, 0]));
    let plan = HashJoinPlan::new(JoinType::Left, keys, 3, 3).with_join_predicate(Arc::new(
        ComparisonExpression::new(2, 2, ComparisonType::LessThan),
    ));

    let (rows, _) = join(plan, outer, inner, JoinConfig::default());
    assert_eq!(
        rendered(&rows),
        vec![
            "(NULL, NULL, NULL, 1, k, 50)",
            "(NULL, NULL, NULL, 2, k, 5)",
            "(k, 1, 10, 1, k, 5)"
        ]
    );
}

#[test]
fn test_filter_applies_after_matching() {
    // The filter drops the matched row but the outer row still counts as
    // matched, so no null-extended row replaces it.
    let filter = |_: &Tuple, inner: &Tuple| -> Result<bool> { Ok(!inner.get_value(1)?.is_null()) };
    let plan = plan(JoinType::Left).with_filter(Arc::new(filter));
    let inner = vec![Tuple::new(vec![Value::from(1), Value::Null])];
    let outer = keyed_rows([1, 2], "o");

    let (rows, _) = join(plan, outer, inner, JoinConfig::default());
    assert!(rows.is_empty());
}

#[test]
fn test_rescan_reuse_and_rebuild() {
    let dir = TempDir::new().unwrap();
    let inner = random_rows(5, 1500, 500, 0);
    let outer = random_rows(6, 1000, 700, 0);

    let mut small = HashJoinExecutor::new(
        Arc::new(plan(JoinType::Right)),
        source(outer.clone()),
        source(inner.clone()),
        JoinConfig::default(),
    );
    let first = collect_sorted(&mut small);
    assert_ok!(small.rescan());
    assert_eq!(collect_sorted(&mut small), first);

    let mut spilled = HashJoinExecutor::new(
        Arc::new(plan(JoinType::Right)),
        source(outer),
        source(inner),
        spill_config(&dir, 16 * 1024),
    );
    assert_eq!(collect_sorted(&mut spilled), first);
    assert!(spilled.stats().unwrap().nbatch > 1);
    // A multi-batch table has already been consumed batch by batch.
    assert_ok!(spilled.rescan());
    assert_eq!(collect_sorted(&mut spilled), first);
}

#[test]
fn test_skewed_outer_keys() {
    init_test_logger();
    let dir = TempDir::new().unwrap();
    let mut inner = keyed_rows(0..2000, "inner");
    inner.extend(keyed_rows(std::iter::repeat_n(42, 20), "hot-inner"));
    let mut outer = keyed_rows((0..2000).step_by(3), "outer");
    outer.extend(keyed_rows(std::iter::repeat_n(42, 2000), "hot-outer"));

    let hint = SkewHint::default().push(vec![Value::from(42)], 0.75);
    let skewed = plan(JoinType::Left).with_estimates(2020, 40).with_skew_hint(hint);
    let (expected, _) = join(plan(JoinType::Left), outer.clone(), inner.clone(), JoinConfig::default());
    let (rows, executor) = join(skewed, outer, inner, spill_config(&dir, 64 * 1024));

    assert!(executor.stats().unwrap().nbatch > 1);
    assert_eq!(rows.len(), expected.len());
    assert_eq!(rows, expected);
}

#[test]
fn test_predicate_error_aborts_join() {
    let failing = |_: &Tuple, _: &Tuple| -> Result<bool> { Err(JoinError::Predicate("boom".into())) };
    let plan = plan(JoinType::Inner).with_join_predicate(Arc::new(failing));
    let mut executor = HashJoinExecutor::new(
        Arc::new(plan),
        source(keyed_rows([1], "o")),
        source(keyed_rows([1], "i")),
        JoinConfig::default(),
    );
    assert_err!(executor.next(), JoinError::Predicate(_));
}

#[test]
fn test_type_mismatch_in_predicate() {
    let plan = plan(JoinType::Inner).with_join_predicate(Arc::new(ComparisonExpression::new(
        0,
        1,
        ComparisonType::Equal,
    )));
    let mut executor = HashJoinExecutor::new(
        Arc::new(plan),
        source(keyed_rows([1], "o")),
        source(keyed_rows([1], "i")),
        JoinConfig::default(),
    );
    assert_err!(executor.next(), JoinError::Predicate(_));
}

#[test]
fn test_joins_compose() {
    // (a JOIN b) JOIN c, with the first join as the outer input of the second.
    // The first join emits (b.key, b.payload, a.key, a.payload).
    let a = keyed_rows([1, 2, 3], "a");
    let b = keyed_rows([2, 3, 3], "b");
    let c = keyed_rows([3], "c");

    let first = HashJoinExecutor::new(Arc::new(plan(JoinType::Inner)), source(a), source(b), JoinConfig::default());
    let second_plan = HashJoinPlan::new(JoinType::Inner, JoinKeys::single(2, 0), 4, 2);
    let mut second = HashJoinExecutor::new(
        Arc::new(second_plan),
        Box::new(first) as Box<dyn RowSource>,
        source(c),
        JoinConfig::default(),
    );
    assert_eq!(
        rendered(&collect_sorted(&mut second)),
        vec!["(3, c, 3, b, 3, a)", "(3, c, 3, b, 3, a)"]
    );
}
