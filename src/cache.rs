use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::ConnectError;
use crate::types::ConnectionRecord;

/// Single-record JSON file holding the last good wireless endpoint.
#[derive(Debug, Clone)]
pub struct ConnectionCache {
    path: PathBuf,
}

impl ConnectionCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached record, or `None` when the file is missing or unreadable.
    pub fn load(&self) -> Option<ConnectionRecord> {
        match self.read_record() {
            Ok(Some(rec)) => {
                info!("Loaded cache: {}:{} ({})", rec.ip, rec.port, rec.device_model);
                Some(rec)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to load cache: {e}");
                None
            }
        }
    }

    /// Strict read: distinguishes a missing file from a corrupt one.
    pub fn read_record(&self) -> Result<Option<ConnectionRecord>, ConnectError> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConnectError::CacheCorrupt(e.to_string())),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| ConnectError::CacheCorrupt(e.to_string()))
    }

    /// Overwrite the cache with `record`. Written to a sibling file then renamed,
    /// so a failed write leaves the previous record intact.
    pub fn save(&self, record: &ConnectionRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(record)?;
        fs::write(&tmp, body).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        info!("Saved cache: {}:{} ({})", record.ip, record.port, record.device_model);
        Ok(())
    }
}
