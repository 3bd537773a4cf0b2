use datasight::{Config, app};

/// Main entry point for the API server
///
/// Reads configuration from flags, the environment and `.env`, then serves
/// until the process is stopped. Log verbosity follows `RUST_LOG` (default `info`).
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load();
    log::info!(
        "Starting DataSight API (uploads in {}, database {})",
        config.upload_dir.display(),
        config.database_url
    );
    app::run(config).await
}
