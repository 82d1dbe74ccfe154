use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::env::{self, EnvKey, ProcessEnv};

/// Install the global subscriber. `LOG_FORMAT=json` switches to JSON lines;
/// `RUST_LOG` overrides the default `vid2audio=info` filter.
pub fn init() {
    let use_json = env::get(&ProcessEnv, EnvKey::LogFormat)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vid2audio=info,lapin=warn,aws_config=warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(env_filter)
            .init();
    }
}
