mod config;
mod run;

use anyhow::{Context, Result};
use budget_ledger::Ledger;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let settings = config::Settings::from_env()?;
    settings.ensure_data_dir()?;

    let ledger = Ledger::open(&settings.db_path)
        .with_context(|| format!("Failed to open database: {}", settings.db_path.display()))?
        .with_delete_policy(settings.delete_policy);

    run::as_cli(&args, &ledger)
}

/// Logs go to stderr so command output stays clean. `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("budget_ledger=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
