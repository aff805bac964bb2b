use hybrid_hashjoin::common::config::JoinConfig;
use hybrid_hashjoin::execution::executors::abstract_executor::RowSource;
use hybrid_hashjoin::execution::executors::values_executor::ValuesExecutor;
use hybrid_hashjoin::storage::table::tuple::Tuple;
use hybrid_hashjoin::types_db::value::Value;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

/// A two-column row: an integer key (NULL when `None`) and a text payload.
pub fn row(key: Option<i64>, payload: &str) -> Tuple {
    Tuple::new(vec![Value::from(key), Value::from(payload)])
}

pub fn keyed_rows(keys: impl IntoIterator<Item = i64>, payload: &str) -> Vec<Tuple> {
    keys.into_iter().map(|k| row(Some(k), payload)).collect()
}

/// `n` rows with keys drawn from `0..key_range`; roughly `null_percent` of
/// them get a NULL key. The payload carries the row number so rows stay
/// distinguishable.
pub fn random_rows(seed: u64, n: usize, key_range: i64, null_percent: u32) -> Vec<Tuple> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let key = if rng.gen_range(0..100) < null_percent {
                None
            } else {
                Some(rng.gen_range(0..key_range))
            };
            row(key, &format!("r{}", i))
        })
        .collect()
}

pub fn source(rows: Vec<Tuple>) -> Box<dyn RowSource> {
    Box::new(ValuesExecutor::new(rows))
}

/// Drains `source` and returns its rows sorted, for order-insensitive
/// comparison.
pub fn collect_sorted(source: &mut dyn RowSource) -> Vec<Tuple> {
    let mut out = Vec::new();
    while let Some(tuple) = crate::assert_ok!(source.next()) {
        out.push(tuple);
    }
    out.sort();
    out
}

pub fn rendered(rows: &[Tuple]) -> Vec<String> {
    rows.iter().map(Tuple::to_string).collect()
}

/// Config with a small work memory and spill files under `dir`.
pub fn spill_config(dir: &TempDir, work_mem: usize) -> JoinConfig {
    JoinConfig::default()
        .with_work_mem(work_mem)
        .with_min_buckets(64)
        .with_spill_dir(dir.path())
}
