// src/compression.rs
// Startup gzip cache for the top-level text assets of the served directory

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use futures_util::future::try_join_all;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Extensions that get precompressed at startup.
pub const CACHED_EXTENSIONS: [&str; 5] = ["js", "html", "css", "txt", "json"];

/// Route of the SPA root document.
pub const ROOT_DOCUMENT_ROUTE: &str = "/index.html";

#[derive(Debug)]
pub enum CompressionError {
    IoError(io::Error),
    FileError { path: PathBuf, source: io::Error },
    TaskFailed(String),
    MissingRootDocument(PathBuf),
}

impl fmt::Display for CompressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionError::IoError(e) => write!(f, "IO error: {}", e),
            CompressionError::FileError { path, source } => {
                write!(f, "Failed to compress {}: {}", path.display(), source)
            }
            CompressionError::TaskFailed(msg) => write!(f, "Compression task failed: {}", msg),
            CompressionError::MissingRootDocument(path) => {
                write!(f, "Root document missing from compression cache: {}", path.display())
            }
        }
    }
}

impl std::error::Error for CompressionError {}

impl From<io::Error> for CompressionError {
    fn from(err: io::Error) -> Self {
        CompressionError::IoError(err)
    }
}

/// A gzip-compressed file, keyed by the URL path it answers.
#[derive(Debug, Clone)]
pub struct CompressedAsset {
    pub route: String,
    pub bytes: Bytes,
}

/// Read-only map from request route to precompressed bytes.
///
/// Built once before the server accepts connections and never mutated
/// afterwards, so lookups need no locking. Construction guarantees that the
/// root document is present.
#[derive(Debug)]
pub struct CompressionCache {
    assets: HashMap<String, CompressedAsset>,
    fallback: Bytes,
}

impl CompressionCache {
    /// Compress every eligible top-level file of `dir` concurrently.
    ///
    /// Fails if any single file fails; a partial cache is never returned.
    pub async fn build(dir: &Path) -> Result<Self, CompressionError> {
        let candidates = collect_candidates(dir).await?;
        log::debug!(
            "Precompressing {} files from {}",
            candidates.len(),
            dir.display()
        );

        let jobs = candidates.into_iter().map(|(route, path)| async move {
            let bytes = tokio::task::spawn_blocking(move || {
                compress_file(&path).map_err(|source| CompressionError::FileError { path, source })
            })
            .await
            .map_err(|e| CompressionError::TaskFailed(e.to_string()))??;

            Ok::<_, CompressionError>(CompressedAsset {
                route,
                bytes: Bytes::from(bytes),
            })
        });

        let assets = try_join_all(jobs).await?;
        Self::from_assets(assets).ok_or_else(|| {
            CompressionError::MissingRootDocument(dir.join(ROOT_DOCUMENT_ROUTE.trim_start_matches('/')))
        })
    }

    /// Assemble a cache from already compressed assets. `None` without a root document.
    pub(crate) fn from_assets(assets: Vec<CompressedAsset>) -> Option<Self> {
        let assets: HashMap<String, CompressedAsset> = assets
            .into_iter()
            .map(|asset| (asset.route.clone(), asset))
            .collect();

        let fallback = assets.get(ROOT_DOCUMENT_ROUTE)?.bytes.clone();
        Some(CompressionCache { assets, fallback })
    }

    /// Look up by the raw request URL.
    pub fn get(&self, route: &str) -> Option<&CompressedAsset> {
        self.assets.get(route)
    }

    /// The compressed root document served for every unmatched route.
    pub fn fallback_document(&self) -> Bytes {
        self.fallback.clone()
    }

    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }
}

/// Gzip a byte slice with the default level.
pub fn gzip(content: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content)?;
    encoder.finish()
}

fn compress_file(path: &Path) -> io::Result<Vec<u8>> {
    let content = std::fs::read(path)?;
    gzip(&content)
}

pub fn has_cached_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| CACHED_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

async fn collect_candidates(dir: &Path) -> Result<Vec<(String, PathBuf)>, CompressionError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut candidates = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !has_cached_extension(&path) {
            continue;
        }

        // Follows symlinks, like reading the file would
        if !tokio::fs::metadata(&path).await?.is_file() {
            continue;
        }

        match entry.file_name().into_string() {
            Ok(name) => candidates.push((format!("/{}", name), path)),
            Err(raw) => {
                log::warn!("Skipping non UTF-8 file name {:?} for precompression", raw);
            }
        }
    }

    Ok(candidates)
}
