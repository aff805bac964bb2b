use std::io::Write;
use std::sync::Once;

use env_logger::Builder;

/// Crate messages at info, everything else at warn. `RUST_LOG` overrides it.
pub const DEFAULT_LOG_FILTER: &str = "warn,hybrid_hashjoin=info";

static INIT: Once = Once::new();

/// Installs the process-wide logger on first use.
///
/// Each line names its thread, so the output of parallel join workers can be
/// told apart.
pub fn initialize_logger() {
    INIT.call_once_force(|_| {
        let mut builder = Builder::new();

        builder
            .parse_filters(DEFAULT_LOG_FILTER)
            .format(|buf, record| {
                let thread = std::thread::current();
                writeln!(
                    buf,
                    "{} {:<5} [{}] {}: {}",
                    buf.timestamp_millis(),
                    record.level(),
                    thread.name().unwrap_or("unnamed"),
                    record.target(),
                    record.args()
                )
            })
            .parse_default_env();

        // Someone else may own the global logger already.
        let _ = builder.try_init();
    });
}
