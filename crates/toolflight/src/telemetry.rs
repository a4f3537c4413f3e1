//! Tracing setup with TOOLFLIGHT_LOG and LOG_FORMAT support.

use tracing::Dispatch;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter directives for a `TOOLFLIGHT_LOG` value.
fn filter_directives(level: Option<&str>) -> String {
    let base_level = match level {
        Some("debug") => "debug",
        Some("trace") => "trace",
        Some("warn") | Some("warning") => "warn",
        Some("error") => "error",
        _ => "info",
    };

    format!(
        "toolflight={level},toolflight_cli={level}",
        level = base_level
    )
}

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `TOOLFLIGHT_LOG`. Calling this twice is harmless.
pub fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = std::env::var("TOOLFLIGHT_LOG").ok();
        EnvFilter::new(filter_directives(level.as_deref()))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    let _ = build_dispatch(filter, use_json).try_init();
}

fn build_dispatch(filter: EnvFilter, json: bool) -> Dispatch {
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .into()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .into()
    }
}
