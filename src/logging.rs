use std::sync::Once;

use tracing_subscriber::{fmt::format::FmtSpan, prelude::*, EnvFilter, Registry};

static INIT: Once = Once::new();

/// Initialize logging.  Nothing is logged unless the environment variable
/// `RUST_LOG` is set to a non-empty value, in which case it is interpreted as
/// an `EnvFilter` (ex: `RUST_LOG=heapgraph=trace`) and compact log lines go to
/// stderr, keeping stdout clean for the tree output.
pub fn init_logging() {
    INIT.call_once(|| {
        // We frequently see RUST_LOG set unconditionally but with an empty
        // value, and we don't want that to be interpreted as a desire to
        // enable logging.
        let layer = match std::env::var("RUST_LOG") {
            Ok(rustlog) if !rustlog.is_empty() => EnvFilter::try_from_default_env()
                .ok()
                .map(|env_filter| {
                    tracing_subscriber::fmt::layer()
                        .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
                        .compact()
                        // Log output tends to get excerpted, so ANSI isn't
                        // helpful for this.
                        .with_ansi(false)
                        // We don't care about the wall time that much, and it
                        // takes up a lot of columns.
                        .without_time()
                        .with_writer(std::io::stderr)
                        .with_filter(env_filter)
                }),
            _ => None,
        };

        // Someone else (a test harness, say) may have installed a subscriber
        // already, which is fine.
        let _ = Registry::default().with(layer).try_init();
    });
}
