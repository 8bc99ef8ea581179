use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use converter_core::{
    ConverterSettings, FallbackConverter, FallbackTimings, NativeProbe, PrimaryConverter,
};
use shared::{
    domain::{CapabilityReport, SelectedFile},
    format::validate_name_and_size,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use transcoder::ProcessEngine;

mod terminal;

use terminal::TerminalPresenter;

#[derive(Parser, Debug)]
#[command(name = "movconv", about = "Convert QuickTime .mov recordings to .mp4")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Remux (or re-encode when needed) a .mov file into .mp4.
    Convert {
        input: PathBuf,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        #[arg(long, default_value = "ffmpeg")]
        ffmpeg: PathBuf,
        /// Browser user agent to check before loading the engine.
        #[arg(long)]
        user_agent: Option<String>,
    },
    /// Save the file under a .mp4 name without converting it.
    Rename {
        input: PathBuf,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Skip the pauses between probe steps.
        #[arg(long)]
        no_delay: bool,
    },
    /// Report the capabilities the in-browser engine would need.
    Probe {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    match cli.command {
        Command::Convert {
            input,
            out_dir,
            ffmpeg,
            user_agent,
        } => convert(&input, out_dir, ffmpeg, user_agent).await,
        Command::Rename {
            input,
            out_dir,
            no_delay,
        } => rename(&input, out_dir, no_delay).await,
        Command::Probe { json } => probe(json),
    }
}

/// Reads `input` into memory. With `max_bytes` set, the name and on-disk
/// size are checked first so oversized files are never buffered.
async fn read_selection(input: &Path, max_bytes: Option<u64>) -> Result<SelectedFile> {
    let name = input
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("'{}' has no usable file name", input.display()))?;
    if let Some(limit) = max_bytes {
        let size = tokio::fs::metadata(input)
            .await
            .with_context(|| format!("failed to inspect '{}'", input.display()))?
            .len();
        if let Err(err) = validate_name_and_size(name, size, Some(limit)) {
            bail!("{} ({err})", err.user_message());
        }
    }
    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("failed to read '{}'", input.display()))?;
    Ok(SelectedFile::new(name, bytes))
}

async fn convert(
    input: &Path,
    out_dir: PathBuf,
    ffmpeg: PathBuf,
    user_agent: Option<String>,
) -> Result<()> {
    let engine =
        ProcessEngine::new(ffmpeg).context("failed to create engine scratch directory")?;
    let settings = ConverterSettings {
        user_agent,
        ..ConverterSettings::default()
    };
    let max_bytes = settings.max_input_bytes;
    let mut converter =
        PrimaryConverter::new(Arc::new(engine), TerminalPresenter::stdout(out_dir), settings);

    converter.initialize().await.context("engine unavailable")?;
    let file = read_selection(input, Some(max_bytes)).await?;
    converter.select_file(file).context("file rejected")?;
    converter.convert().await.context("conversion failed")?;
    converter.download().context("could not save the result")?;

    let saved = converter.into_presenter().saved().to_vec();
    info!(outputs = ?saved, "done");
    Ok(())
}

async fn rename(input: &Path, out_dir: PathBuf, no_delay: bool) -> Result<()> {
    let timings = if no_delay {
        FallbackTimings::immediate()
    } else {
        FallbackTimings::default()
    };
    let mut fallback =
        FallbackConverter::new(TerminalPresenter::stdout(out_dir), NativeProbe, timings);

    fallback.probe_capabilities().await;
    let file = read_selection(input, None).await?;
    fallback.select_file(file).context("file rejected")?;
    fallback.rename_only().context("could not save the renamed file")?;
    Ok(())
}

fn probe(json: bool) -> Result<()> {
    let report = CapabilityReport::native();
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for (name, present) in [
        ("WebAssembly", report.webassembly),
        ("Shared memory", report.shared_memory),
        ("Workers", report.workers),
        ("File reading", report.file_reading),
    ] {
        println!("{name:<14} {}", if present { "yes" } else { "no" });
    }
    if !report.all_present() {
        println!(
            "In-browser conversion is not possible here; use `movconv convert` with a local ffmpeg."
        );
    }
    Ok(())
}
