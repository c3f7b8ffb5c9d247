//! Profile persistence contract and the local directory store.

use serde::{Deserialize, Serialize};

use std::path::{Path, PathBuf};

use time::OffsetDateTime;

use crate::fsutil::{list_matching, write_bytes};
use crate::{FlameError, FlameResult, RawProfile};

const FILE_PREFIX: &str = "profile-";
const FILE_SUFFIX: &str = ".cpuprofile";

pub trait ProfileStore {
    /// The most recently written profile, if any.
    fn get_latest(&self) -> FlameResult<Option<StoredProfile>>;

    fn put(&self, profile: &RawProfile) -> FlameResult<StoredLocation>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredProfile {
    pub location: String,
    pub profile: RawProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredLocation {
    pub location: String,
    pub hash: String,
}

/// Stores profiles as `profile-<unixMillis>.cpuprofile` under one directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stored files, newest first.
    pub fn list(&self) -> FlameResult<Vec<(u64, PathBuf)>> {
        let pattern = format!("{FILE_PREFIX}*{FILE_SUFFIX}");
        let mut out = list_matching(&self.dir, &pattern)?
            .into_iter()
            .filter_map(|p| embedded_millis(&p).map(|ms| (ms, p)))
            .collect::<Vec<_>>();
        out.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        Ok(out)
    }

    fn next_millis(&self) -> FlameResult<u64> {
        let now = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000).max(0) as u64;
        Ok(match self.list()?.first() {
            Some((newest, _)) => now.max(newest + 1),
            None => now,
        })
    }
}

fn embedded_millis(path: &Path) -> Option<u64> {
    path.file_name()?
        .to_str()?
        .strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?
        .parse()
        .ok()
}

impl ProfileStore for FsStore {
    fn get_latest(&self) -> FlameResult<Option<StoredProfile>> {
        let Some((_, path)) = self.list()?.into_iter().next() else {
            return Ok(None);
        };
        let bytes = std::fs::read(&path)?;
        let profile = RawProfile::from_json(&bytes).map_err(|e| {
            FlameError::Store(format!("unreadable profile {}: {e}", path.display()))
        })?;
        Ok(Some(StoredProfile {
            location: path.to_string_lossy().to_string(),
            profile,
        }))
    }

    fn put(&self, profile: &RawProfile) -> FlameResult<StoredLocation> {
        let bytes = profile.to_json()?;
        let hash = blake3::hash(&bytes).to_hex().to_string();
        let path = self
            .dir
            .join(format!("{FILE_PREFIX}{}{FILE_SUFFIX}", self.next_millis()?));
        write_bytes(&path, &bytes)?;
        tracing::debug!("stored profile {} ({hash})", path.display());
        Ok(StoredLocation {
            location: path.to_string_lossy().to_string(),
            hash,
        })
    }
}
