//! Data exchanged between the processor, the store and the renderer

use crate::errors::{Result, RuEnsError};
use crate::variables::VariableKind;
use chrono::{DateTime, NaiveDateTime, Utc};
use ndarray::{ArrayD, ArrayViewD, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a committed snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(pub String);

impl SnapshotId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Short form for console output
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(10)]
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One committed version of the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub id: SnapshotId,
    pub parent: Option<SnapshotId>,
    pub message: String,
    pub written_at: DateTime<Utc>,
}

/// Time series of zonally averaged fields for one variable
///
/// `values` has shape `[time, ...field]`, where the field axes are named by
/// `dims` (`["lev", "lat"]` or `["lat"]`).
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSeries {
    pub name: String,
    pub kind: VariableKind,
    pub dims: Vec<String>,
    pub latitudes: Vec<f32>,
    pub times: Vec<NaiveDateTime>,
    pub values: ArrayD<f32>,
}

impl VariableSeries {
    /// Stack per-timestamp fields into a series
    ///
    /// Fields must share one shape. `fields` is sorted by time before stacking.
    ///
    /// # Errors
    ///
    /// Returns an error if `fields` is empty or the shapes disagree.
    pub fn from_fields(
        name: &str,
        kind: VariableKind,
        latitudes: Vec<f32>,
        mut fields: Vec<(NaiveDateTime, ArrayD<f32>)>,
    ) -> Result<Self> {
        if fields.is_empty() {
            return Err(RuEnsError::Generic(format!(
                "cannot build series '{name}' without fields"
            )));
        }

        fields.sort_by_key(|(t, _)| *t);
        let times = fields.iter().map(|(t, _)| *t).collect();
        let views: Vec<ArrayViewD<'_, f32>> = fields.iter().map(|(_, f)| f.view()).collect();
        let values = ndarray::stack(Axis(0), &views)?;

        Ok(Self {
            name: name.to_string(),
            kind,
            dims: kind.reduced_dims(),
            latitudes,
            times,
            values,
        })
    }

    /// Shape of a single timestamp's field
    pub fn field_shape(&self) -> &[usize] {
        &self.values.shape()[1..]
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Field at the `i`-th timestamp
    pub fn field(&self, i: usize) -> ArrayViewD<'_, f32> {
        self.values.index_axis(Axis(0), i)
    }
}

/// Newly computed series keyed by variable name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombinedAverages {
    variables: BTreeMap<String, VariableSeries>,
}

impl CombinedAverages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, series: VariableSeries) {
        self.variables.insert(series.name.clone(), series);
    }

    pub fn get(&self, name: &str) -> Option<&VariableSeries> {
        self.variables.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariableSeries> {
        self.variables.values()
    }

    /// True when no variable holds a single timestamp
    pub fn is_empty(&self) -> bool {
        self.variables.values().all(VariableSeries::is_empty)
    }

    /// Number of distinct timestamps across all variables
    pub fn timestamp_count(&self) -> usize {
        let mut times: Vec<NaiveDateTime> = self
            .variables
            .values()
            .flat_map(|s| s.times.iter().copied())
            .collect();
        times.sort_unstable();
        times.dedup();
        times.len()
    }
}

impl FromIterator<VariableSeries> for CombinedAverages {
    fn from_iter<I: IntoIterator<Item = VariableSeries>>(iter: I) -> Self {
        let mut averages = Self::new();
        for series in iter {
            averages.insert(series);
        }
        averages
    }
}
