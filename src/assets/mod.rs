//! Loading model files into [`SceneAsset`]s.
//!
//! Loading happens off the orchestrator's thread, so an [`AssetSource`] only
//! ever produces CPU-side data. Nothing here touches the GPU.

pub mod gltf_import;
pub mod obj;

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use thiserror::Error;

use crate::scene_graph::SceneAsset;

/// Bytes read so far out of `total`; a non-positive total is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded: u64,
    pub total: i64,
}

impl LoadProgress {
    /// Rounded percentage, or `None` when the total is unknown.
    pub fn percent(&self) -> Option<u8> {
        if self.total <= 0 {
            return None;
        }
        let ratio = self.loaded as f64 / self.total as f64;
        Some((ratio * 100.0).round().clamp(0.0, 100.0) as u8)
    }
}

/// Why a model could not be produced.
#[derive(Debug, Error)]
pub enum LoadFailure {
    #[error("unreachable: {0}")]
    Unreachable(#[from] io::Error),
    #[error("malformed model: {0}")]
    Malformed(String),
    #[error("unsupported format `{0}`")]
    UnsupportedFormat(String),
    #[error("loader panicked: {0}")]
    Panicked(String),
    #[error("unable to start loader: {0}")]
    Spawn(#[source] io::Error),
}

#[derive(Debug, Error)]
#[error("failed to load {path}")]
pub struct AssetLoadError {
    pub path: String,
    #[source]
    pub cause: LoadFailure,
}

impl AssetLoadError {
    pub fn new(path: impl Into<String>, cause: LoadFailure) -> Self {
        Self {
            path: path.into(),
            cause,
        }
    }
}

/// Produces a scene asset for a model path.
///
/// `progress` may be called any number of times before the call returns.
pub trait AssetSource: Send + Sync {
    fn load(
        &self,
        path: &str,
        progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<SceneAsset, AssetLoadError>;
}

impl<T> AssetSource for Arc<T>
where
    T: AssetSource + ?Sized,
{
    fn load(
        &self,
        path: &str,
        progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<SceneAsset, AssetLoadError> {
        (**self).load(path, progress)
    }
}

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Reads model files from a directory on disk.
#[derive(Debug, Clone)]
pub struct FileAssetSource {
    root: PathBuf,
    chunk_size: usize,
}

impl FileAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Progress is reported once per chunk of this many bytes.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let relative = path.strip_prefix("./").unwrap_or(path);
        self.root.join(relative)
    }

    fn read_with_progress(
        &self,
        path: &Path,
        progress: &mut dyn FnMut(LoadProgress),
    ) -> io::Result<Vec<u8>> {
        let mut file = File::open(path)?;
        let total = file
            .metadata()
            .ok()
            .and_then(|metadata| i64::try_from(metadata.len()).ok())
            .filter(|len| *len > 0)
            .unwrap_or(-1);
        let mut bytes = Vec::with_capacity(total.max(0) as usize);
        let mut chunk = vec![0u8; self.chunk_size];
        loop {
            let read = file.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..read]);
            progress(LoadProgress {
                loaded: bytes.len() as u64,
                total,
            });
        }
        Ok(bytes)
    }
}

impl AssetSource for FileAssetSource {
    fn load(
        &self,
        path: &str,
        progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<SceneAsset, AssetLoadError> {
        let resolved = self.resolve(path);
        let extension = resolved
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !matches!(extension.as_str(), "glb" | "gltf" | "obj") {
            return Err(AssetLoadError::new(
                path,
                LoadFailure::UnsupportedFormat(extension),
            ));
        }

        debug!("reading {}", resolved.display());
        let bytes = self
            .read_with_progress(&resolved, progress)
            .map_err(|err| AssetLoadError::new(path, LoadFailure::Unreachable(err)))?;

        let decoded = match extension.as_str() {
            "obj" => obj::load_obj(path, &bytes),
            _ => gltf_import::load_gltf(path, &bytes, resolved.parent()),
        };
        decoded.map_err(|cause| AssetLoadError::new(path, cause))
    }
}
