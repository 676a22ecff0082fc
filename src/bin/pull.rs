//! Scheduled pull job: sync the configured wiki space into object storage.
//!
//! Prints the run report as JSON on stdout; any failure still produces a
//! structured report and a nonzero exit code.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use wikibridge::config::SyncConfig;
use wikibridge::sync::run_sync;
use wikibridge::types::SyncReport;

#[derive(Parser)]
#[command(name = "wikibridge-pull", version, about = "Sync a wiki space into object storage")]
struct Args {}

#[tokio::main]
async fn main() {
    let _ = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("starting wiki sync run");

    let report = match SyncConfig::from_env() {
        Ok(config) => match run_sync(&config).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("sync run failed: {}", e);
                SyncReport::aborted(format!("sync run failed: {}", e))
            }
        },
        Err(e) => {
            tracing::error!("configuration error: {}", e);
            SyncReport::aborted(format!("configuration error: {}", e))
        }
    };

    let exit_code = if report.code < 0 { 1 } else { 0 };
    println!(
        "{}",
        serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
    );
    std::process::exit(exit_code);
}
