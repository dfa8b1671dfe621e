//! Local-filesystem versioned repository
//!
//! Each commit writes an immutable snapshot manifest that inherits its
//! parent's chunk index, then moves the `main` branch ref to it. Layout:
//!
//! ```text
//! <root>/repo.json
//! <root>/refs/main.json
//! <root>/snapshots/<id>.json
//! <root>/chunks/<var>/<id>-<YYYYmmddTHHMMSS>.f32
//! <root>/.lock
//! ```
//!
//! Chunks are written before the manifest, and the manifest before the ref,
//! so a crash mid-commit leaves the previous head intact. Commits from
//! concurrent writers are serialized through an advisory lock on `.lock`.

mod chunk;
mod manifest;

use crate::data_source::VersionedStore;
use crate::errors::{Result, RuEnsError};
use crate::model::{CombinedAverages, CommitRecord, SnapshotId, VariableSeries};
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use chunk::{atomic_write, decode_field, encode_field};
use futures::Stream;
use manifest::{ArrayManifest, BranchRef, ChunkRef, RepoConfig, SnapshotManifest, FORMAT_VERSION};
use ndarray::{ArrayD, IxDyn};
use rayon::prelude::*;
use std::collections::BTreeSet;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tracing::{debug, info};

const REPO_CONFIG: &str = "repo.json";
const MAIN_REF: &str = "refs/main.json";
const SNAPSHOTS_DIR: &str = "snapshots";
const CHUNKS_DIR: &str = "chunks";
const LOCK_FILE: &str = ".lock";

/// Stream of commit records from the head back to the initial snapshot
pub type CommitStream = Pin<Box<dyn Stream<Item = Result<CommitRecord>> + Send + 'static>>;

/// Versioned repository rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalRepository {
    root: PathBuf,
}

impl LocalRepository {
    /// Open the repository at `path`, creating it if it does not exist yet
    pub async fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let repo = Self {
            root: path.as_ref().to_path_buf(),
        };

        if repo.root.join(REPO_CONFIG).exists() {
            repo.check_config()?;
            debug!(path = %repo.root.display(), "opened existing repository");
            return Ok(repo);
        }

        fs::create_dir_all(&repo.root)?;
        let _lock = CommitLock::acquire(&repo.root)?;

        let config = RepoConfig {
            format_version: FORMAT_VERSION,
            created_at: Utc::now(),
        };
        let initial = SnapshotManifest::initial();
        repo.write_snapshot(&initial)?;
        repo.write_ref(&initial.id)?;
        // repo.json goes last: its presence marks a complete repository
        atomic_write(
            &repo.root.join(REPO_CONFIG),
            &serde_json::to_vec_pretty(&config)?,
        )?;

        info!(path = %repo.root.display(), snapshot = %initial.id, "created repository");
        Ok(repo)
    }

    /// Open an existing repository
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not hold a repository.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let repo = Self {
            root: path.as_ref().to_path_buf(),
        };
        if !repo.root.join(REPO_CONFIG).exists() {
            return Err(RuEnsError::RepositoryError(format!(
                "no repository at {}",
                repo.root.display()
            )));
        }
        repo.check_config()?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Commit record of the current branch head
    pub async fn head(&self) -> Result<CommitRecord> {
        Ok(self.read_head()?.record())
    }

    /// Walk the history from the head back to the initial snapshot
    pub fn ancestry(&self) -> CommitStream {
        let repo = self.clone();

        Box::pin(async_stream::stream! {
            let mut next = match repo.read_ref() {
                Ok(id) => Some(id),
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            while let Some(id) = next {
                match repo.read_snapshot(&id) {
                    Ok(snapshot) => {
                        next = snapshot.parent.clone();
                        yield Ok(snapshot.record());
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        })
    }

    /// Series for `variable` as of a past snapshot
    pub async fn load_at(&self, variable: &str, snapshot: &SnapshotId) -> Result<VariableSeries> {
        let manifest = self.read_snapshot(snapshot)?;
        self.read_series(&manifest, variable)
    }

    fn check_config(&self) -> Result<()> {
        let config: RepoConfig = serde_json::from_slice(&fs::read(self.root.join(REPO_CONFIG))?)?;
        if config.format_version != FORMAT_VERSION {
            return Err(RuEnsError::RepositoryError(format!(
                "unsupported repository format {} (expected {FORMAT_VERSION})",
                config.format_version
            )));
        }
        Ok(())
    }

    fn read_ref(&self) -> Result<SnapshotId> {
        let path = self.root.join(MAIN_REF);
        let bytes = fs::read(&path).map_err(|e| {
            RuEnsError::RepositoryError(format!("cannot read {}: {e}", path.display()))
        })?;
        let branch: BranchRef = serde_json::from_slice(&bytes)?;
        Ok(branch.snapshot)
    }

    fn write_ref(&self, id: &SnapshotId) -> Result<()> {
        let branch = BranchRef {
            snapshot: id.clone(),
        };
        atomic_write(&self.root.join(MAIN_REF), &serde_json::to_vec_pretty(&branch)?)
    }

    fn snapshot_path(&self, id: &SnapshotId) -> PathBuf {
        self.root.join(SNAPSHOTS_DIR).join(format!("{id}.json"))
    }

    fn read_snapshot(&self, id: &SnapshotId) -> Result<SnapshotManifest> {
        let path = self.snapshot_path(id);
        let bytes = fs::read(&path).map_err(|e| {
            RuEnsError::RepositoryError(format!("missing snapshot {id} ({e})"))
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write_snapshot(&self, snapshot: &SnapshotManifest) -> Result<()> {
        atomic_write(
            &self.snapshot_path(&snapshot.id),
            &serde_json::to_vec_pretty(snapshot)?,
        )
    }

    fn read_head(&self) -> Result<SnapshotManifest> {
        self.read_snapshot(&self.read_ref()?)
    }

    fn read_series(&self, snapshot: &SnapshotManifest, variable: &str) -> Result<VariableSeries> {
        let array = snapshot
            .arrays
            .get(variable)
            .ok_or_else(|| RuEnsError::VariableNotFound {
                var: variable.to_string(),
            })?;

        let fields: Vec<ArrayD<f32>> = array
            .chunks
            .par_iter()
            .map(|chunk| -> Result<ArrayD<f32>> {
                let path = self.root.join(&chunk.path);
                let bytes = fs::read(&path).map_err(|e| RuEnsError::CorruptChunk {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                decode_field(&path, &bytes, &array.field_shape)
            })
            .collect::<Result<_>>()?;

        let mut shape = vec![fields.len()];
        shape.extend_from_slice(&array.field_shape);
        let data: Vec<f32> = fields.into_iter().flat_map(|f| f.into_raw_vec()).collect();

        Ok(VariableSeries {
            name: variable.to_string(),
            kind: array.kind,
            dims: array.dims.clone(),
            latitudes: array.latitudes.clone(),
            times: array.chunks.iter().map(|c| c.time).collect(),
            values: ArrayD::from_shape_vec(IxDyn(&shape), data)?,
        })
    }

    fn write_chunks(&self, id: &SnapshotId, series: &VariableSeries) -> Result<Vec<ChunkRef>> {
        let dir = self.root.join(CHUNKS_DIR).join(&series.name);
        fs::create_dir_all(&dir)?;

        (0..series.len())
            .into_par_iter()
            .map(|i| -> Result<ChunkRef> {
                let time = series.times[i];
                let rel = format!(
                    "{CHUNKS_DIR}/{}/{id}-{}.f32",
                    series.name,
                    time.format("%Y%m%dT%H%M%S")
                );
                fs::write(self.root.join(&rel), encode_field(&series.field(i)))?;
                Ok(ChunkRef { time, path: rel })
            })
            .collect()
    }
}

#[async_trait]
impl VersionedStore for LocalRepository {
    async fn existing_timestamps(&self, variable: &str) -> Result<BTreeSet<NaiveDateTime>> {
        let head = self.read_head()?;
        Ok(head
            .arrays
            .get(variable)
            .map(|array| array.chunks.iter().map(|c| c.time).collect())
            .unwrap_or_default())
    }

    async fn commit(&self, averages: &CombinedAverages, message: &str) -> Result<CommitRecord> {
        if averages.is_empty() {
            return Err(RuEnsError::EmptyCommit);
        }

        let _lock = CommitLock::acquire(&self.root)?;
        let parent = self.read_head()?;
        let mut next = parent.child(message);
        let id = next.id.clone();

        for series in averages.iter().filter(|s| !s.is_empty()) {
            check_variable_name(&series.name)?;

            let array = next
                .arrays
                .entry(series.name.clone())
                .or_insert_with(|| ArrayManifest::for_series(series));
            array.check_compatible(series)?;

            let refs = self.write_chunks(&id, series)?;
            debug!(
                variable = %series.name,
                chunks = refs.len(),
                elements = array.element_count(),
                "wrote chunks"
            );
            array.upsert(refs);
        }

        self.write_snapshot(&next)?;
        self.write_ref(&id)?;

        info!(snapshot = %id, parent = %parent.id, label = message, "committed snapshot");
        Ok(next.record())
    }

    async fn load(&self, variable: &str) -> Result<VariableSeries> {
        let head = self.read_head()?;
        self.read_series(&head, variable)
    }
}

/// Variable names become directory names under `chunks/`
fn check_variable_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(RuEnsError::SchemaMismatch {
            var: name.to_string(),
            message: "variable names may only contain ASCII letters, digits, '_' and '-'"
                .to_string(),
        })
    }
}

/// Exclusive advisory lock on `.lock`
///
/// The OS drops the lock with the owning file handle, so a writer that dies
/// mid-commit leaves the file behind but not the lock.
struct CommitLock {
    file: File,
}

impl CommitLock {
    fn acquire(root: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(root.join(LOCK_FILE))?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                return Err(RuEnsError::RepositoryLocked {
                    path: root.to_path_buf(),
                })
            }
            Err(e) => return Err(e.into()),
        }

        // Record the holder for anyone inspecting a stuck repository
        file.set_len(0)?;
        let mut holder = &file;
        writeln!(holder, "{}", std::process::id())?;
        Ok(Self { file })
    }
}

impl Drop for CommitLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
