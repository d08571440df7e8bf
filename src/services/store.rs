use lru::LruCache;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

use crate::core::contamination::FittedSurface;
use crate::core::pipeline::RankingRun;

/// Errors that can occur with artifact storage
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt artifact: {0}")]
    Corrupt(String),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Persistence for fitted surfaces and ranking runs
///
/// Injected into the ranker so nothing writes to hard-coded paths.
pub trait ArtifactStore: Send + Sync {
    fn load_surface(&self, key: &str) -> Result<Option<FittedSurface>, StoreError>;

    fn save_surface(&self, key: &str, surface: &FittedSurface) -> Result<(), StoreError>;

    fn save_ranking(&self, run: &RankingRun) -> Result<(), StoreError>;
}

/// Artifact key builder
pub struct ArtifactKey;

impl ArtifactKey {
    /// Build a key for a surface trained on data with the given digest
    pub fn surface(digest: &str) -> String {
        format!("surface-{}", digest)
    }

    /// Build a key for a ranking run
    pub fn ranking(run_id: &str) -> String {
        format!("ranking-{}", run_id)
    }
}

/// Stores artifacts as JSON files in one directory
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn write_atomic(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key);
        // One temp file per writer; concurrent writers of a key must not share it
        let tmp = self.dir.join(format!("{}.{}.tmp", key, Uuid::new_v4()));

        fs::write(&tmp, bytes).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            StoreError::Io { path, source }
        })
    }
}

impl ArtifactStore for FileArtifactStore {
    fn load_surface(&self, key: &str) -> Result<Option<FittedSurface>, StoreError> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let surface: FittedSurface = serde_json::from_slice(&bytes)?;
        if !surface.is_consistent() {
            return Err(StoreError::Corrupt(key.to_string()));
        }
        Ok(Some(surface))
    }

    fn save_surface(&self, key: &str, surface: &FittedSurface) -> Result<(), StoreError> {
        let json = serde_json::to_vec(surface)?;
        self.write_atomic(key, &json)?;
        tracing::debug!("Saved surface artifact: {}", key);
        Ok(())
    }

    fn save_ranking(&self, run: &RankingRun) -> Result<(), StoreError> {
        let key = ArtifactKey::ranking(&run.run_id.to_string());
        let json = serde_json::to_vec_pretty(run)?;
        self.write_atomic(&key, &json)?;
        tracing::debug!("Saved ranking artifact: {}", key);
        Ok(())
    }
}

/// Bounded in-memory store, for tests and stateless deployments
pub struct MemoryArtifactStore {
    surfaces: Mutex<LruCache<String, FittedSurface>>,
    rankings: Mutex<LruCache<String, RankingRun>>,
}

impl MemoryArtifactStore {
    /// Create a store keeping at most `capacity` artifacts of each kind
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            surfaces: Mutex::new(LruCache::new(capacity)),
            rankings: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up a stored ranking run by id
    pub fn ranking(&self, run_id: &str) -> Option<RankingRun> {
        let mut rankings = self.rankings.lock().ok()?;
        rankings.get(&ArtifactKey::ranking(run_id)).cloned()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn load_surface(&self, key: &str) -> Result<Option<FittedSurface>, StoreError> {
        let mut surfaces = self.surfaces.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(surfaces.get(key).cloned())
    }

    fn save_surface(&self, key: &str, surface: &FittedSurface) -> Result<(), StoreError> {
        let mut surfaces = self.surfaces.lock().map_err(|_| StoreError::Poisoned)?;
        surfaces.put(key.to_string(), surface.clone());
        Ok(())
    }

    fn save_ranking(&self, run: &RankingRun) -> Result<(), StoreError> {
        let mut rankings = self.rankings.lock().map_err(|_| StoreError::Poisoned)?;
        rankings.put(ArtifactKey::ranking(&run.run_id.to_string()), run.clone());
        Ok(())
    }
}
