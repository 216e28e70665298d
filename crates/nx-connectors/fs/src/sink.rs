// sink.rs - Atomic dispatch writes.
//
// A dispatch is never written in place. The record is first written to a
// temp file created in the same directory as the target (so the final move
// is a rename within one filesystem, never a copy), synced to disk, and only
// then published under its final name:
//
//   stage():   <dir>/.nx-dispatch-XXXX.tmp  <- full record, fsync'd
//   commit():  rename temp -> <dir>/<name>, then fsync <dir>
//
// A reader therefore sees either no file or the complete record, never a
// prefix. If the staged write is dropped without commit the temp file is
// removed. If the process dies between the two steps a stray `.nx-dispatch-*`
// file may remain, but the final name never appears.
//
// Without overwrite, publishing uses a create-exclusive rename
// (`persist_noclobber`). Two missions racing for the same name both stage
// successfully, but only one rename wins; the other sees `AlreadyExists`
// and its temp file is discarded. No lock file is needed for that.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use nx_policy::ValidatedPath;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::error::ExecutionFailure;
use crate::record::DispatchRecord;

/// A bounded side effect: write one payload to one validated path.
pub trait DispatchSink: Send + Sync {
    fn write(
        &self,
        path: &ValidatedPath,
        payload: Map<String, Value>,
    ) -> Result<DispatchRecord, ExecutionFailure>;
}

/// Writes dispatch records as pretty JSON files.
#[derive(Debug, Clone, Default)]
pub struct FsDispatchSink {
    overwrite: bool,
}

impl FsDispatchSink {
    /// A sink that refuses to replace existing files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace an existing target instead of failing.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    /// Write the record to a synced temp file next to the target.
    ///
    /// Nothing is visible under the final name until [`StagedDispatch::commit`].
    pub fn stage(
        &self,
        path: &ValidatedPath,
        payload: Map<String, Value>,
    ) -> Result<StagedDispatch, ExecutionFailure> {
        let target = path.as_path();
        let dir = target.parent().ok_or_else(|| ExecutionFailure::NoParent {
            path: target.to_path_buf(),
        })?;
        if dir != path.root() && !dir.is_dir() {
            fs::create_dir_all(dir).map_err(|source| ExecutionFailure::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let record = DispatchRecord::new(target.to_path_buf(), payload)?;
        let body = serde_json::to_vec_pretty(&record)?;

        let stage_error = |source: io::Error| ExecutionFailure::Stage {
            dir: dir.to_path_buf(),
            source,
        };
        let mut temp = tempfile::Builder::new()
            .prefix(".nx-dispatch-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(stage_error)?;
        temp.write_all(&body).map_err(stage_error)?;
        temp.as_file().sync_all().map_err(stage_error)?;

        tracing::debug!(
            temp = %temp.path().display(),
            target = %target.display(),
            "dispatch staged"
        );
        Ok(StagedDispatch {
            temp,
            record,
            overwrite: self.overwrite,
        })
    }
}

impl DispatchSink for FsDispatchSink {
    fn write(
        &self,
        path: &ValidatedPath,
        payload: Map<String, Value>,
    ) -> Result<DispatchRecord, ExecutionFailure> {
        self.stage(path, payload)?.commit()
    }
}

/// A fully written temp file waiting to be published.
///
/// Dropping it without calling [`commit`](Self::commit) deletes the temp file.
#[derive(Debug)]
pub struct StagedDispatch {
    temp: NamedTempFile,
    record: DispatchRecord,
    overwrite: bool,
}

impl StagedDispatch {
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    pub fn record(&self) -> &DispatchRecord {
        &self.record
    }

    /// Move the temp file to its final name in one step.
    ///
    /// Without overwrite this is create-exclusive: if the target exists the
    /// temp file is discarded and `AlreadyExists` is returned.
    pub fn commit(self) -> Result<DispatchRecord, ExecutionFailure> {
        let target = self.record.resolved_path.clone();
        let published = if self.overwrite {
            self.temp.persist(&target)
        } else {
            self.temp.persist_noclobber(&target)
        };

        match published {
            Ok(_) => {
                sync_parent(&target);
                tracing::info!(
                    path = %target.display(),
                    record_id = %self.record.record_id,
                    "dispatch written"
                );
                Ok(self.record)
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                tracing::warn!(path = %target.display(), "dispatch target already exists");
                Err(ExecutionFailure::AlreadyExists { path: target })
            }
            Err(e) => Err(ExecutionFailure::Publish {
                path: target,
                source: e.error,
            }),
        }
    }
}

/// Best effort: make the rename itself durable.
#[cfg(unix)]
fn sync_parent(target: &Path) {
    if let Some(dir) = target.parent() {
        if let Err(e) = fs::File::open(dir).and_then(|d| d.sync_all()) {
            tracing::debug!(dir = %dir.display(), error = %e, "directory sync skipped");
        }
    }
}

#[cfg(not(unix))]
fn sync_parent(_target: &Path) {}
