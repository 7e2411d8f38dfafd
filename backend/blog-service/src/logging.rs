//! Tracing subscriber setup

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppEnv;

/// Default filter when `RUST_LOG` is unset.
fn default_directive(env: AppEnv) -> &'static str {
    match env {
        AppEnv::Local | AppEnv::Dev => "debug,sqlx=warn,actix_server=info",
        AppEnv::Prod => "info,sqlx=warn",
    }
}

/// Installs the global subscriber: pretty output locally, JSON elsewhere.
pub fn init_tracing(env: AppEnv) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(env)));

    let registry = tracing_subscriber::registry().with(filter);

    match env {
        AppEnv::Local => registry
            .with(fmt::layer().pretty().with_target(true))
            .init(),
        AppEnv::Dev | AppEnv::Prod => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_target(true),
            )
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_by_env() {
        assert!(default_directive(AppEnv::Local).starts_with("debug"));
        assert!(default_directive(AppEnv::Dev).starts_with("debug"));
        assert!(default_directive(AppEnv::Prod).starts_with("info"));
    }
}
