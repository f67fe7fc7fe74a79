//! docbatch -- batch search/replace server over a JSON record store.
//!
//! Usage: docbatch [--config <file>] [--store <file>] [--dry-run]

use std::path::PathBuf;

use docbatch::server::ServerConfig;

fn arg_value(name: &str) -> Option<String> {
    std::env::args().skip_while(|a| a != name).nth(1)
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing to stderr so it does not interfere with MCP stdio.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match arg_value("--config") {
        Some(path) => ServerConfig::from_file(&PathBuf::from(path))?,
        None => ServerConfig::default(),
    };
    if let Some(store) = arg_value("--store") {
        config.store_path = PathBuf::from(store);
    }
    if std::env::args().any(|a| a == "--dry-run") {
        config.dry_run = true;
    }

    docbatch::run_server(config)
}
