pub mod config;
pub mod device;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod report;
pub mod vision;

#[cfg(test)]
mod test_support;

/// Install the global `tracing` subscriber. `RUST_LOG` overrides `default_filter`.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();
}
