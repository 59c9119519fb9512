mod cli;

use anyhow::{Context, Result};

use budgetrack::config::{BackendKind, Config};
use budgetrack::{DocumentStore, SqliteStore, SummaryEngine};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = Config::from_env()?;
    budgetrack::logging::init(&config.log_filter);

    match config.backend {
        BackendKind::Sqlite => {
            let db_path = config.resolve_database_path()?;
            let store = SqliteStore::open_with_busy_timeout(&db_path, config.busy_timeout)
                .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
            tracing::debug!(path = %db_path.display(), "opened sqlite store");
            let engine = SummaryEngine::new(store).with_request_timeout(config.request_timeout);
            cli::as_cli(&args, &engine)
        }
        BackendKind::Document => {
            tracing::warn!("document backend is in-memory; records do not outlive this process");
            let engine = SummaryEngine::new(DocumentStore::new())
                .with_request_timeout(config.request_timeout);
            cli::as_cli(&args, &engine)
        }
    }
}
