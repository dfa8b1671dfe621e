//! On-disk metadata of the local repository

use crate::errors::{Result, RuEnsError};
use crate::model::{CommitRecord, SnapshotId, VariableSeries};
use crate::variables::VariableKind;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub(crate) const FORMAT_VERSION: u32 = 1;

/// `repo.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RepoConfig {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
}

/// `refs/main.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct BranchRef {
    pub snapshot: SnapshotId,
}

/// Location of one timestamp's field, relative to the repository root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ChunkRef {
    pub time: NaiveDateTime,
    pub path: String,
}

/// Layout and chunk index of one stored variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ArrayManifest {
    pub kind: VariableKind,
    pub dims: Vec<String>,
    pub field_shape: Vec<usize>,
    pub latitudes: Vec<f32>,
    /// Sorted by time, one entry per timestamp
    pub chunks: Vec<ChunkRef>,
}

impl ArrayManifest {
    pub fn for_series(series: &VariableSeries) -> Self {
        Self {
            kind: series.kind,
            dims: series.dims.clone(),
            field_shape: series.field_shape().to_vec(),
            latitudes: series.latitudes.clone(),
            chunks: Vec::new(),
        }
    }

    /// Reject a series that cannot be appended to this array
    pub fn check_compatible(&self, series: &VariableSeries) -> Result<()> {
        if self.kind != series.kind {
            return Err(RuEnsError::SchemaMismatch {
                var: series.name.clone(),
                message: format!("stored as {}, committed as {}", self.kind, series.kind),
            });
        }
        if self.field_shape != series.field_shape() {
            return Err(RuEnsError::SchemaMismatch {
                var: series.name.clone(),
                message: format!(
                    "stored field shape {:?}, committed {:?}",
                    self.field_shape,
                    series.field_shape()
                ),
            });
        }
        Ok(())
    }

    /// Add or replace chunk references, keeping them sorted by time
    pub fn upsert(&mut self, refs: impl IntoIterator<Item = ChunkRef>) {
        let mut by_time: BTreeMap<NaiveDateTime, String> = self
            .chunks
            .drain(..)
            .map(|c| (c.time, c.path))
            .collect();
        for chunk in refs {
            by_time.insert(chunk.time, chunk.path);
        }
        self.chunks = by_time
            .into_iter()
            .map(|(time, path)| ChunkRef { time, path })
            .collect();
    }

    pub fn element_count(&self) -> usize {
        self.field_shape.iter().product()
    }
}

/// `snapshots/<id>.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SnapshotManifest {
    pub id: SnapshotId,
    pub parent: Option<SnapshotId>,
    pub message: String,
    pub written_at: DateTime<Utc>,
    pub arrays: BTreeMap<String, ArrayManifest>,
}

impl SnapshotManifest {
    pub fn initial() -> Self {
        Self {
            id: SnapshotId::generate(),
            parent: None,
            message: "Repository initialized".to_string(),
            written_at: Utc::now(),
            arrays: BTreeMap::new(),
        }
    }

    /// Child snapshot inheriting every array of `self`
    pub fn child(&self, message: &str) -> Self {
        Self {
            id: SnapshotId::generate(),
            parent: Some(self.id.clone()),
            message: message.to_string(),
            written_at: Utc::now(),
            arrays: self.arrays.clone(),
        }
    }

    pub fn record(&self) -> CommitRecord {
        CommitRecord {
            id: self.id.clone(),
            parent: self.parent.clone(),
            message: self.message.clone(),
            written_at: self.written_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2010, 1, 4)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap()
    }

    #[test]
    fn upsert_replaces_and_sorts() {
        let mut manifest = ArrayManifest {
            kind: VariableKind::TwoD,
            dims: vec!["lat".into()],
            field_shape: vec![3],
            latitudes: vec![-45.0, 0.0, 45.0],
            chunks: vec![ChunkRef { time: at(6), path: "old".into() }],
        };

        manifest.upsert([
            ChunkRef { time: at(6), path: "new".into() },
            ChunkRef { time: at(0), path: "first".into() },
        ]);

        let paths: Vec<&str> = manifest.chunks.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, ["first", "new"]);
    }

    #[test]
    fn child_inherits_arrays() {
        let mut root = SnapshotManifest::initial();
        root.arrays.insert(
            "ps".into(),
            ArrayManifest {
                kind: VariableKind::TwoD,
                dims: vec!["lat".into()],
                field_shape: vec![2],
                latitudes: vec![0.0, 1.0],
                chunks: Vec::new(),
            },
        );

        let child = root.child("next");
        assert_eq!(child.parent.as_ref(), Some(&root.id));
        assert!(child.arrays.contains_key("ps"));
        assert_ne!(child.id, root.id);
    }
}
