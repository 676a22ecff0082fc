//! Event-driven push job: route one storage-change notification into the
//! document index.
//!
//! Reads the notification payload from a file argument or stdin, prints the
//! invocation response as JSON on stdout. Exit code mirrors the response
//! status: 0 for every handled outcome (skips included), 1 for 500s.

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wikibridge::config::IndexerConfig;
use wikibridge::event::{handle_notification, InvocationResponse};

#[derive(Parser)]
#[command(
    name = "wikibridge-push",
    version,
    about = "Index one storage-change notification into the knowledge base"
)]
struct Args {
    /// Path to the notification payload; reads stdin when omitted
    payload: Option<PathBuf>,
}

fn read_payload(args: &Args) -> anyhow::Result<Vec<u8>> {
    match &args.payload {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("reading payload from {}", path.display()))
        }
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("reading payload from stdin")?;
            Ok(buf)
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let response = match read_payload(&args) {
        Ok(raw) => match IndexerConfig::from_env() {
            Ok(config) => handle_notification(&raw, &config).await,
            Err(e) => {
                tracing::error!("configuration error: {}", e);
                InvocationResponse::failure(&e.to_string())
            }
        },
        Err(e) => {
            tracing::error!("payload read failed: {}", e);
            InvocationResponse::failure(&e.to_string())
        }
    };

    let exit_code = if response.status_code == 200 { 0 } else { 1 };
    println!(
        "{}",
        serde_json::to_string_pretty(&response).unwrap_or_else(|_| "{}".to_string())
    );
    std::process::exit(exit_code);
}
