//! Per-seed checkpoints, so an interrupted harvest resumes without
//! re-fetching seeds that already finished

use crate::builder::SeedBucket;
use collabnet_common::errors::{AppError, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory of JSON files, one per completed seed identity
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| AppError::Checkpoint {
            message: format!("cannot create checkpoint directory {}: {}", dir.display(), e),
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name derived from the seed id, safe for any id content
    fn path_for(&self, seed_author_id: &str) -> PathBuf {
        let digest = Sha256::digest(seed_author_id.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    /// Load a seed's bucket, if one was saved for this exact seed
    pub fn load(&self, seed_author_id: &str) -> Result<Option<SeedBucket>> {
        let path = self.path_for(seed_author_id);
        if !path.exists() {
            return Ok(None);
        }

        let raw = fs::read(&path).map_err(|e| AppError::Checkpoint {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        let bucket: SeedBucket = match serde_json::from_slice(&raw) {
            Ok(bucket) => bucket,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable checkpoint ignored");
                return Ok(None);
            }
        };

        if bucket.seed.author_id != seed_author_id {
            warn!(path = %path.display(), "Checkpoint belongs to another seed, ignored");
            return Ok(None);
        }

        debug!(seed = seed_author_id, "Checkpoint loaded");
        Ok(Some(bucket))
    }

    /// Write atomically: temp file then rename
    pub fn save(&self, bucket: &SeedBucket) -> Result<()> {
        let path = self.path_for(&bucket.seed.author_id);
        let tmp = path.with_extension("json.tmp");

        let body = serde_json::to_vec(bucket)?;
        fs::write(&tmp, body)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| AppError::Checkpoint {
                message: format!("cannot write {}: {}", path.display(), e),
            })
    }
}
