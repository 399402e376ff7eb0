pub mod build_info;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

const DEFAULT_DIRECTIVE: &str = "tally=info";

/// Installs the global `fmt` subscriber. `RUST_LOG` is honoured, `tally=info` is
/// always on, and `extra` may add comma-separated directives on top.
pub fn init_tracing(extra: Option<&str>) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let mut filter = EnvFilter::from_default_env();
        let mut rejected = Vec::new();
        let directives = std::iter::once(DEFAULT_DIRECTIVE).chain(
            extra
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty()),
        );
        for raw in directives {
            match raw.parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(_) => rejected.push(raw.to_string()),
            }
        }

        // Another subscriber may already be installed (tests, embedding hosts).
        let _ = fmt().with_env_filter(filter).try_init();
        for raw in rejected {
            tracing::warn!(directive = %raw, "ignoring invalid log filter directive");
        }
    });
}
