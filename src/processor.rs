//! NetCDF ensemble processor
//!
//! For every pending analysis time it averages the selected variables across
//! ensemble members and then over longitude. Timestamps are spread over a
//! dedicated worker pool sized by the request's worker count.

use crate::data_source::{EnsembleProcessor, ProcessRequest};
use crate::ensemble_io::{discover_members, read_field, read_latitudes};
use crate::errors::Result;
use crate::model::{CombinedAverages, VariableSeries};
use crate::parallel::ParallelConfig;
use crate::statistics::{ensemble_mean, zonal_mean};
use crate::variables::{VariableKind, VariableSelection};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use ndarray::ArrayD;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Reads ensemble members from `<data_root>/<YYYYmmdd_HH>/`
#[derive(Debug, Clone)]
pub struct NetcdfEnsembleProcessor {
    data_root: PathBuf,
}

impl NetcdfEnsembleProcessor {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }
}

#[async_trait]
impl EnsembleProcessor for NetcdfEnsembleProcessor {
    async fn process(&self, request: ProcessRequest) -> Result<CombinedAverages> {
        let data_root = self.data_root.clone();
        tokio::task::spawn_blocking(move || process_blocking(&data_root, &request)).await?
    }
}

/// Reduced fields of one analysis time
struct TimestampFields {
    time: NaiveDateTime,
    fields: Vec<ReducedField>,
}

struct ReducedField {
    name: String,
    kind: VariableKind,
    latitudes: Vec<f32>,
    data: ArrayD<f32>,
}

fn process_blocking(data_root: &Path, request: &ProcessRequest) -> Result<CombinedAverages> {
    let pending = request.pending_times()?;
    if pending.is_empty() {
        info!(skipped = request.skip_times.len(), "no pending timestamps");
        return Ok(CombinedAverages::new());
    }

    let pool = ParallelConfig::with_threads(request.num_workers).build_pool()?;
    info!(
        pending = pending.len(),
        skipped = request.skip_times.len(),
        workers = pool.current_num_threads(),
        "processing ensemble timestamps"
    );

    let done = AtomicUsize::new(0);
    let processed: Vec<Option<TimestampFields>> = pool.install(|| {
        pending
            .par_iter()
            .map(|&t| {
                let result = process_timestamp(data_root, t, &request.variables);
                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(time = %t, done = n, total = pending.len(), "timestamp finished");
                result
            })
            .collect::<Result<_>>()
    })?;

    assemble(processed.into_iter().flatten())
}

fn process_timestamp(
    data_root: &Path,
    t: NaiveDateTime,
    variables: &VariableSelection,
) -> Result<Option<TimestampFields>> {
    let members = discover_members(data_root, t)?;
    if members.is_empty() {
        warn!(time = %t, "no ensemble members found, skipping timestamp");
        return Ok(None);
    }

    let latitudes = read_latitudes(&members[0])?;
    let mut fields = Vec::with_capacity(variables.len());

    for (name, kind) in variables.iter() {
        let member_fields = members
            .iter()
            .map(|m| read_field(m, name, kind))
            .collect::<Result<Vec<_>>>()?;
        let data = zonal_mean(&ensemble_mean(&member_fields)?)?;

        let lat_len = data.shape().last().copied().unwrap_or(0);
        let latitudes = match &latitudes {
            Some(lat) if lat.len() == lat_len => lat.clone(),
            _ => (0..lat_len).map(|i| i as f32).collect(),
        };

        fields.push(ReducedField {
            name: name.to_string(),
            kind,
            latitudes,
            data,
        });
    }

    debug!(time = %t, members = members.len(), "averaged ensemble");
    Ok(Some(TimestampFields { time: t, fields }))
}

fn assemble(processed: impl Iterator<Item = TimestampFields>) -> Result<CombinedAverages> {
    type Pending = (VariableKind, Vec<f32>, Vec<(NaiveDateTime, ArrayD<f32>)>);
    let mut by_variable: BTreeMap<String, Pending> = BTreeMap::new();

    for timestamp in processed {
        for field in timestamp.fields {
            by_variable
                .entry(field.name)
                .or_insert_with(|| (field.kind, field.latitudes, Vec::new()))
                .2
                .push((timestamp.time, field.data));
        }
    }

    by_variable
        .into_iter()
        .map(|(name, (kind, latitudes, fields))| {
            VariableSeries::from_fields(&name, kind, latitudes, fields)
        })
        .collect()
}
