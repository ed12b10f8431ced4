// src/fetch/zips.rs
use anyhow::{anyhow, Context, Result};
use futures::StreamExt;
use reqwest::Client;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{fs, io::AsyncWriteExt, time::sleep};
use tracing::{debug, error, instrument, warn};
use url::Url;

use super::urls::file_name;

/// Stream `url` into `dest_path`. The body is written to `<dest>.part` and renamed on
/// completion. A failed transfer removes the partial file and never touches the final name.
/// Returns the number of bytes written.
pub async fn download_to(client: &Client, url: &Url, dest_path: impl AsRef<Path>) -> Result<u64> {
    let dest_path = dest_path.as_ref();
    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let resp = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?
        .error_for_status()
        .with_context(|| format!("Failed to download the data from: {}", url))?;

    let mut tmp_name = dest_path.as_os_str().to_owned();
    tmp_name.push(".part");
    let tmp_path = PathBuf::from(tmp_name);

    let size = match write_body(resp, url, &tmp_path).await {
        Ok(size) => size,
        Err(e) => {
            if let Err(rm) = fs::remove_file(&tmp_path).await {
                debug!(path = %tmp_path.display(), error = %rm, "could not remove partial download");
            }
            return Err(e);
        }
    };

    fs::rename(&tmp_path, dest_path).await.with_context(|| {
        format!(
            "failed to rename `{}` to `{}`",
            tmp_path.display(),
            dest_path.display()
        )
    })?;
    debug!(%url, bytes = size, path = %dest_path.display(), "downloaded");
    Ok(size)
}

async fn write_body(resp: reqwest::Response, url: &Url, tmp_path: &Path) -> Result<u64> {
    let mut file = fs::File::create(tmp_path)
        .await
        .with_context(|| format!("creating {}", tmp_path.display()))?;
    let mut stream = resp.bytes_stream();
    let mut size = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.with_context(|| format!("reading body from {}", url))?;
        size += chunk.len() as u64;
        file.write_all(&chunk)
            .await
            .with_context(|| format!("writing {}", tmp_path.display()))?;
    }
    file.flush().await?;
    Ok(size)
}

/// Download the given ZIP URL and save it under `dest_dir` using the original filename.
/// Returns the full path of the saved file.
pub async fn download_zip(client: &Client, url: &Url, dest_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let name = file_name(url).ok_or_else(|| anyhow!("no file name in URL {}", url))?;
    let dest_path = dest_dir.as_ref().join(name);
    download_to(client, url, &dest_path).await?;
    Ok(dest_path)
}

/// `download_zip` with exponential backoff. `max_retries == 0` means a single attempt.
#[instrument(level = "debug", skip(client, dest_dir), fields(url = %url))]
pub async fn download_zip_with_retry(
    client: &Client,
    url: &Url,
    dest_dir: impl AsRef<Path>,
    max_retries: u32,
    initial_backoff_ms: u64,
) -> Result<PathBuf> {
    let dest_dir = dest_dir.as_ref();
    let mut attempts = 0;
    loop {
        match download_zip(client, url, dest_dir).await {
            Ok(p) => return Ok(p),
            Err(e) if attempts < max_retries => {
                attempts += 1;
                let backoff = initial_backoff_ms * 2u64.pow(attempts - 1);
                warn!(%url, attempt = attempts, delay_ms = backoff, error = %e, "Retrying");
                sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => {
                if max_retries > 0 {
                    error!(%url, error = %e, "Exhausted retries");
                }
                return Err(e);
            }
        }
    }
}
