//! One-shot download of the browser engine's script and wasm files.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use reqwest::{Client, StatusCode};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{info, warn};
use url::Url;

pub const DEFAULT_CDN_BASE: &str = "https://unpkg.com/";
pub const DEFAULT_TARGET_DIR: &str = "ffmpeg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Asset {
    /// Path below the CDN base.
    pub package_path: &'static str,
    pub file_name: &'static str,
}

pub const ENGINE_ASSETS: [Asset; 4] = [
    Asset {
        package_path: "@ffmpeg/core@0.12.6/dist/umd/ffmpeg-core.js",
        file_name: "ffmpeg-core.js",
    },
    Asset {
        package_path: "@ffmpeg/core@0.12.6/dist/umd/ffmpeg-core.wasm",
        file_name: "ffmpeg-core.wasm",
    },
    Asset {
        package_path: "@ffmpeg/ffmpeg@0.12.10/dist/umd/ffmpeg.js",
        file_name: "ffmpeg.js",
    },
    Asset {
        package_path: "@ffmpeg/ffmpeg@0.12.10/dist/umd/814.ffmpeg.js",
        file_name: "814.ffmpeg.js",
    },
];

impl Asset {
    pub fn url(&self, base: &Url) -> Result<Url> {
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(self.package_path)
            .with_context(|| format!("invalid asset url for {}", self.file_name))
    }
}

/// Downloads `assets` one after another into `target`, creating it if
/// needed. Stops at the first failure; the file being written is removed.
pub async fn fetch_all(
    client: &Client,
    base: &Url,
    target: &Path,
    assets: &[Asset],
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(target)
        .await
        .with_context(|| format!("failed to create '{}'", target.display()))?;

    let mut saved = Vec::with_capacity(assets.len());
    for asset in assets {
        let url = asset.url(base)?;
        let path = target.join(asset.file_name);
        println!("Downloading {}...", asset.file_name);

        match fetch_one(client, &url, &path).await {
            Ok(bytes) => {
                info!(file = asset.file_name, bytes, "asset downloaded");
                println!("Downloaded {}", asset.file_name);
                saved.push(path);
            }
            Err(err) => {
                remove_partial(&path).await;
                let context = format!("failed to download {} from {url}", asset.file_name);
                return Err(err.context(context));
            }
        }
    }
    Ok(saved)
}

async fn fetch_one(client: &Client, url: &Url, path: &Path) -> Result<u64> {
    let mut response = client.get(url.clone()).send().await?;
    let status = response.status();
    if status != StatusCode::OK {
        bail!("HTTP {status}");
    }

    let mut file = fs::File::create(path)
        .await
        .with_context(|| format!("failed to create '{}'", path.display()))?;
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

async fn remove_partial(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => info!(path = %path.display(), "removed partial download"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), %err, "failed to remove partial download"),
    }
}

#[cfg(test)]
#[path = "tests/assets_tests.rs"]
mod tests;
