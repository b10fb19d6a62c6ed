//! Filesystem snapshot store.
//!
//! Layout: `<root>/<source-hash>/<run-id>.json`. Writes go to a hidden
//! temporary file that is renamed into place, so readers never observe a
//! partial snapshot.

use crate::graph::domain::ContentHash;
use crate::sync::{
    domain::{RunId, Snapshot},
    ports::{SnapshotStore, SnapshotStoreError, SnapshotStoreResult},
};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use std::io::ErrorKind;
use tracing::{debug, warn};

const SNAPSHOT_EXTENSION: &str = ".json";

/// Snapshot store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    root: Utf8PathBuf,
}

impl FsSnapshotStore {
    /// Creates a store rooted at `root`. The directory is created on first
    /// write.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    async fn blocking<T, F>(&self, f: F) -> SnapshotStoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Utf8PathBuf) -> SnapshotStoreResult<T> + Send + 'static,
    {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || f(root))
            .await
            .map_err(|err| SnapshotStoreError::persistence(std::io::Error::other(err.to_string())))?
    }
}

fn snapshot_file(run_id: RunId) -> String {
    format!("{run_id}{SNAPSHOT_EXTENSION}")
}

/// Opens the root, returning `None` when it does not exist yet.
fn open_root(root: &Utf8Path) -> SnapshotStoreResult<Option<Dir>> {
    match Dir::open_ambient_dir(root, ambient_authority()) {
        Ok(dir) => Ok(Some(dir)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(SnapshotStoreError::persistence(err)),
    }
}

fn decode(run_id: &str, contents: &str) -> SnapshotStoreResult<Snapshot> {
    serde_json::from_str(contents).map_err(|err| SnapshotStoreError::Corrupt {
        run_id: run_id.to_owned(),
        reason: err.to_string(),
    })
}

fn write_snapshot(root: &Utf8Path, snapshot: &Snapshot) -> SnapshotStoreResult<()> {
    let encoded = serde_json::to_string_pretty(snapshot).map_err(SnapshotStoreError::persistence)?;
    Dir::create_ambient_dir_all(root, ambient_authority()).map_err(SnapshotStoreError::persistence)?;
    let root_dir =
        Dir::open_ambient_dir(root, ambient_authority()).map_err(SnapshotStoreError::persistence)?;
    let hash = snapshot.source_hash().as_str();
    root_dir
        .create_dir_all(hash)
        .map_err(SnapshotStoreError::persistence)?;
    let source_dir = root_dir
        .open_dir(hash)
        .map_err(SnapshotStoreError::persistence)?;

    let file_name = snapshot_file(snapshot.run_id);
    let temporary = format!(".{file_name}.tmp");
    source_dir
        .write(&temporary, encoded)
        .map_err(SnapshotStoreError::persistence)?;
    source_dir
        .rename(&temporary, &source_dir, &file_name)
        .map_err(SnapshotStoreError::persistence)?;
    debug!(run_id = %snapshot.run_id, source = hash, "snapshot written");
    Ok(())
}

fn read_run(root: &Utf8Path, run_id: RunId) -> SnapshotStoreResult<Option<Snapshot>> {
    let Some(root_dir) = open_root(root)? else {
        return Ok(None);
    };
    let file_name = snapshot_file(run_id);
    for listed in root_dir.entries().map_err(SnapshotStoreError::persistence)? {
        let entry = listed.map_err(SnapshotStoreError::persistence)?;
        if !entry
            .file_type()
            .map_err(SnapshotStoreError::persistence)?
            .is_dir()
        {
            continue;
        }
        let source_dir = entry.open_dir().map_err(SnapshotStoreError::persistence)?;
        match source_dir.read_to_string(&file_name) {
            Ok(contents) => return decode(&run_id.to_string(), &contents).map(Some),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(SnapshotStoreError::persistence(err)),
        }
    }
    Ok(None)
}

fn read_latest(root: &Utf8Path, hash: &ContentHash) -> SnapshotStoreResult<Option<Snapshot>> {
    let Some(root_dir) = open_root(root)? else {
        return Ok(None);
    };
    let source_dir = match root_dir.open_dir(hash.as_str()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(SnapshotStoreError::persistence(err)),
    };
    newest_in(&source_dir, |_| true)
}

/// Scans every source directory, since an edited document changes its hash.
fn read_latest_for_path(root: &Utf8Path, source_path: &str) -> SnapshotStoreResult<Option<Snapshot>> {
    let Some(root_dir) = open_root(root)? else {
        return Ok(None);
    };
    let mut latest: Option<Snapshot> = None;
    for listed in root_dir.entries().map_err(SnapshotStoreError::persistence)? {
        let entry = listed.map_err(SnapshotStoreError::persistence)?;
        if !entry
            .file_type()
            .map_err(SnapshotStoreError::persistence)?
            .is_dir()
        {
            continue;
        }
        let source_dir = entry.open_dir().map_err(SnapshotStoreError::persistence)?;
        let Some(candidate) = newest_in(&source_dir, |snapshot| {
            snapshot.source_path() == source_path
        })?
        else {
            continue;
        };
        if latest
            .as_ref()
            .is_none_or(|current| candidate.taken_at > current.taken_at)
        {
            latest = Some(candidate);
        }
    }
    Ok(latest)
}

/// Returns the newest readable snapshot in `source_dir` accepted by `keep`.
fn newest_in(
    source_dir: &Dir,
    keep: impl Fn(&Snapshot) -> bool,
) -> SnapshotStoreResult<Option<Snapshot>> {
    let mut latest: Option<Snapshot> = None;
    for listed in source_dir.entries().map_err(SnapshotStoreError::persistence)? {
        let entry = listed.map_err(SnapshotStoreError::persistence)?;
        let name = entry.file_name().map_err(SnapshotStoreError::persistence)?;
        let Some(run_id) = name
            .strip_suffix(SNAPSHOT_EXTENSION)
            .filter(|stem| !stem.starts_with('.'))
        else {
            continue;
        };
        let contents = source_dir
            .read_to_string(&name)
            .map_err(SnapshotStoreError::persistence)?;
        let snapshot = match decode(run_id, &contents) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(%err, "skipping unreadable snapshot");
                continue;
            }
        };
        if !keep(&snapshot) {
            continue;
        }
        if latest
            .as_ref()
            .is_none_or(|current| snapshot.taken_at > current.taken_at)
        {
            latest = Some(snapshot);
        }
    }
    Ok(latest)
}

#[async_trait]
impl SnapshotStore for FsSnapshotStore {
    async fn save(&self, snapshot: &Snapshot) -> SnapshotStoreResult<()> {
        let owned = snapshot.clone();
        self.blocking(move |root| write_snapshot(&root, &owned))
            .await
    }

    async fn load(&self, run_id: RunId) -> SnapshotStoreResult<Option<Snapshot>> {
        self.blocking(move |root| read_run(&root, run_id)).await
    }

    async fn latest_for_source(&self, hash: &ContentHash) -> SnapshotStoreResult<Option<Snapshot>> {
        let source = hash.clone();
        self.blocking(move |root| read_latest(&root, &source)).await
    }

    async fn latest_for_path(&self, source_path: &str) -> SnapshotStoreResult<Option<Snapshot>> {
        let path = source_path.to_owned();
        self.blocking(move |root| read_latest_for_path(&root, &path))
            .await
    }
}
