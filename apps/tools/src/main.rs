use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use url::Url;

mod assets;

use assets::{fetch_all, DEFAULT_CDN_BASE, DEFAULT_TARGET_DIR, ENGINE_ASSETS};

#[derive(Parser, Debug)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the engine scripts and wasm for offline use.
    FetchAssets {
        #[arg(long, default_value = DEFAULT_CDN_BASE)]
        cdn_base: Url,
        #[arg(long, default_value = DEFAULT_TARGET_DIR)]
        dest: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let cli = Cli::parse();

    match cli.command {
        Command::FetchAssets { cdn_base, dest } => {
            let client = reqwest::Client::new();
            match fetch_all(&client, &cdn_base, &dest, &ENGINE_ASSETS).await {
                Ok(saved) => {
                    println!("All {} engine files downloaded to {}", saved.len(), dest.display());
                    println!("The converter can now load them from the local server.");
                }
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "asset download aborted");
                    eprintln!("Download failed: {err:#}");
                    eprintln!(
                        "Some files may not exist upstream; the converter may still work, try running the server."
                    );
                }
            }
        }
    }

    Ok(())
}
