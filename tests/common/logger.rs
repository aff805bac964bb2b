use std::sync::Once;

use hybrid_hashjoin::common::logger::initialize_logger;

static INIT: Once = Once::new();

/// Sets up logging for an integration test. Spill and growth messages show at
/// info; `RUST_LOG=hybrid_hashjoin=trace` follows individual tuples.
pub fn init_test_logger() {
    INIT.call_once(initialize_logger);
}
