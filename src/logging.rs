// src/logging.rs

use tracing_subscriber::{filter::Directive, fmt, EnvFilter};

/// Extra directive read on top of `RUST_LOG`, e.g. `LOG_LEVEL=eustat=trace`.
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

fn with_extra(env: EnvFilter, extra: Option<&str>) -> EnvFilter {
    match extra.map(str::parse::<Directive>) {
        Some(Ok(directive)) => env.add_directive(directive),
        Some(Err(e)) => {
            eprintln!("ignoring {}: {}", ENV_LOG_LEVEL, e);
            env
        }
        None => env,
    }
}

/// Install the global subscriber for a binary: `RUST_LOG` or `default`, plus
/// `LOG_LEVEL`, with span close events.
pub fn init(default: &str) {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let extra = std::env::var(ENV_LOG_LEVEL).ok();
    fmt::Subscriber::builder()
        .with_env_filter(with_extra(env, extra.as_deref()))
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
}
