use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Error, Result, anyhow};
use futures_util::{
    FutureExt,
    future::{self, BoxFuture},
};
use reqwest::Client;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::utils::content_digest;

/// Downloaded icons, keyed by source URL and by content digest. Icons whose
/// bytes are identical share one file.
pub struct IconCache {
    dir: TempDir,
    entries: HashMap<String, PathBuf>,
    /// Refs with downloads started but not yet committed.
    in_flight: HashMap<String, usize>,
    http_client: Client,
}

/// Outcome of a cache lookup: a path that is already known, or a download
/// that must finish before the icon can be used.
pub enum IconLookup {
    Cached(PathBuf),
    Download(BoxFuture<'static, IconDownload>),
}

#[derive(Debug)]
pub struct IconDownload {
    pub icon_ref: String,
    pub path: PathBuf,
    /// Digest of the stored bytes, or why the download failed.
    pub digest: Result<String, Error>,
}

#[derive(Debug)]
pub enum IconResolution {
    Missing,
    Cached(PathBuf),
    Downloaded(IconDownload),
}

impl IconLookup {
    pub fn into_resolution(self) -> BoxFuture<'static, IconResolution> {
        match self {
            IconLookup::Cached(path) => future::ready(IconResolution::Cached(path)).boxed(),
            IconLookup::Download(download) => download.map(IconResolution::Downloaded).boxed(),
        }
    }
}

impl IconCache {
    pub fn create(timeout: Duration) -> Result<Self, Error> {
        let dir = tempfile::Builder::new()
            .prefix("fedmsg-notify-")
            .tempdir()
            .map_err(|e| anyhow!("Failed to create icon cache directory: {}", e))?;

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        info!(path = %dir.path().display(), "Icon cache created");

        Ok(Self {
            dir,
            entries: HashMap::new(),
            in_flight: HashMap::new(),
            http_client,
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn get(&self, key: &str) -> Option<&Path> {
        self.entries.get(key).map(PathBuf::as_path)
    }

    /// Where an icon reference is stored before deduplication.
    pub fn path_for(&self, icon_ref: &str) -> PathBuf {
        let icon_id = Uuid::new_v5(&Uuid::NAMESPACE_URL, icon_ref.as_bytes());
        self.dir.path().join(icon_id.to_string())
    }

    pub fn lookup(&mut self, icon_ref: &str) -> IconLookup {
        if let Some(path) = self.entries.get(icon_ref) {
            return IconLookup::Cached(path.clone());
        }

        // A file at `path` may be a finished download that `commit` has yet
        // to deduplicate.
        let path = self.path_for(icon_ref);
        if !self.in_flight.contains_key(icon_ref) && path.exists() {
            self.entries.insert(icon_ref.to_string(), path.clone());
            return IconLookup::Cached(path);
        }

        debug!(icon = icon_ref, "Downloading icon");
        *self.in_flight.entry(icon_ref.to_string()).or_default() += 1;
        IconLookup::Download(download(self.http_client.clone(), icon_ref.to_string(), path).boxed())
    }

    /// Registers a finished download, collapsing it onto an existing file
    /// with the same content.
    pub fn commit(&mut self, download: IconDownload) -> Option<PathBuf> {
        let IconDownload {
            icon_ref,
            path,
            digest,
        } = download;

        if let Some(count) = self.in_flight.get_mut(&icon_ref) {
            *count -= 1;
            if *count == 0 {
                self.in_flight.remove(&icon_ref);
            }
        }

        let digest = match digest {
            Ok(digest) => digest,
            Err(e) => {
                warn!(icon = %icon_ref, error = %e, "Failed to download icon");
                return None;
            }
        };

        if let Some(existing) = self.entries.get(&digest).cloned() {
            if existing != path {
                debug!(icon = %icon_ref, path = %existing.display(), "Icon content already cached");
                match std::fs::remove_file(&path) {
                    Err(e) if e.kind() != ErrorKind::NotFound => {
                        warn!(path = %path.display(), error = %e, "Failed to remove duplicate icon");
                    }
                    _ => {}
                }
            }
            self.entries.insert(icon_ref, existing.clone());
            return Some(existing);
        }

        self.entries.insert(icon_ref, path.clone());
        self.entries.insert(digest, path.clone());
        Some(path)
    }

    pub fn settle(&mut self, resolution: IconResolution) -> Option<PathBuf> {
        match resolution {
            IconResolution::Missing => None,
            IconResolution::Cached(path) => Some(path),
            IconResolution::Downloaded(download) => self.commit(download),
        }
    }

    pub async fn resolve(&mut self, icon_ref: &str) -> Option<PathBuf> {
        match self.lookup(icon_ref) {
            IconLookup::Cached(path) => Some(path),
            IconLookup::Download(download) => {
                let download = download.await;
                self.commit(download)
            }
        }
    }

    /// Removes the cache directory and everything in it.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!(path = %path.display(), error = %e, "Failed to remove icon cache");
        }
    }
}

async fn download(http_client: Client, icon_ref: String, path: PathBuf) -> IconDownload {
    let digest = fetch_to_file(&http_client, &icon_ref, &path).await;
    IconDownload {
        icon_ref,
        path,
        digest,
    }
}

async fn fetch_to_file(http_client: &Client, url: &str, path: &Path) -> Result<String, Error> {
    let response = http_client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("Icon host returned status {}", status));
    }

    let bytes = response.bytes().await?;

    // Lookups treat any file at `path` as complete.
    let partial = path.with_extension(format!("{}.part", Uuid::new_v4().simple()));
    if let Err(e) = tokio::fs::write(&partial, &bytes).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e.into());
    }
    tokio::fs::rename(&partial, path).await?;

    Ok(content_digest(&bytes))
}
