//! Logging setup.
//!
//! Level resolution: an explicit level (connection option) wins, then
//! `RUST_LOG`, then `warn`. The subscriber is installed at most once per
//! process; later calls are no-ops, and an already installed global
//! subscriber is left alone.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const TARGET: &str = "_tarantool_dbapi";

static LOGGING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Build the filter for a configured level; `None` means logging is off.
pub(crate) fn filter_for(level: Option<&str>) -> Option<EnvFilter> {
    match level {
        Some(level) if level.eq_ignore_ascii_case("off") => None,
        Some(level) => Some(EnvFilter::new(format!(
            "{}={}",
            TARGET,
            level.to_ascii_lowercase()
        ))),
        None => Some(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("{}=warn", TARGET))),
        ),
    }
}

/// Install a stderr `fmt` subscriber.
pub fn init_logging(level: Option<&str>) {
    LOGGING_INITIALIZED.get_or_init(|| {
        let Some(filter) = filter_for(level) else {
            return;
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .try_init()
            .ok();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_off_disables_logging() {
        assert!(filter_for(Some("OFF")).is_none());
        assert!(filter_for(Some("off")).is_none());
    }

    #[test]
    fn test_explicit_level_targets_crate() {
        let rendered = filter_for(Some("DEBUG")).unwrap().to_string().to_lowercase();
        assert!(rendered.starts_with("_tarantool_dbapi="), "{rendered}");
        assert!(rendered.ends_with("debug"), "{rendered}");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_logging(Some("warn"));
        init_logging(Some("trace"));
        assert!(LOGGING_INITIALIZED.get().is_some());
    }
}
