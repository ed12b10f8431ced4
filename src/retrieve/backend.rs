// src/retrieve/backend.rs
use anyhow::{Context, Result};
use reqwest::Client;
use std::path::{Path, PathBuf};
use url::Url;

use crate::extract::extract_all;
use crate::fetch::zips::download_zip_with_retry;

/// The two side effects the bulk retriever performs per archive.
#[allow(async_fn_in_trait)]
pub trait Backend {
    /// Download `url` into `dest_dir`, returning the saved archive path.
    async fn fetch(&self, url: &Url, dest_dir: &Path) -> Result<PathBuf>;

    /// Unpack `archive` into `dest_dir`, overwriting existing files.
    async fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// reqwest download + zip extraction on the blocking pool.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    max_retries: u32,
    initial_backoff_ms: u64,
}

impl HttpBackend {
    pub fn new(client: Client) -> Self {
        HttpBackend {
            client,
            max_retries: 0,
            initial_backoff_ms: 500,
        }
    }

    pub fn with_retries(mut self, max_retries: u32, initial_backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff_ms = initial_backoff_ms;
        self
    }
}

impl Backend for HttpBackend {
    async fn fetch(&self, url: &Url, dest_dir: &Path) -> Result<PathBuf> {
        download_zip_with_retry(
            &self.client,
            url,
            dest_dir,
            self.max_retries,
            self.initial_backoff_ms,
        )
        .await
    }

    async fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>> {
        let archive = archive.to_path_buf();
        let dest_dir = dest_dir.to_path_buf();
        tokio::task::spawn_blocking(move || extract_all(&archive, &dest_dir))
            .await
            .context("extraction task panicked")?
    }
}
