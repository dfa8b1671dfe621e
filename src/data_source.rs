//! Collaborator interfaces used by the orchestrator
//!
//! The orchestrator only talks to these traits, so the on-disk repository,
//! the NetCDF processor and the SVG renderer can each be swapped for another
//! implementation (or a recording fake in tests).

use crate::errors::Result;
use crate::model::{CombinedAverages, CommitRecord, VariableSeries};
use crate::time_window::TimeWindow;
use crate::variables::VariableSelection;
use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Versioned dataset repository
#[async_trait]
pub trait VersionedStore: Send + Sync {
    /// Timestamps already committed for `variable`; empty when none
    async fn existing_timestamps(&self, variable: &str) -> Result<BTreeSet<NaiveDateTime>>;

    /// Persist `averages` as exactly one new version labelled `message`
    async fn commit(&self, averages: &CombinedAverages, message: &str) -> Result<CommitRecord>;

    /// Full series for `variable` as of the latest version
    async fn load(&self, variable: &str) -> Result<VariableSeries>;
}

/// Everything the processor needs for one call
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub window: TimeWindow,
    pub variables: VariableSelection,
    pub skip_times: BTreeSet<NaiveDateTime>,
    pub num_workers: usize,
    pub step: Duration,
}

impl ProcessRequest {
    /// Window timestamps that are not in the skip-set
    pub fn pending_times(&self) -> Result<Vec<NaiveDateTime>> {
        Ok(self
            .window
            .timestamps(self.step)?
            .into_iter()
            .filter(|t| !self.skip_times.contains(t))
            .collect())
    }
}

/// Produces per-timestamp averages for the requested variables
#[async_trait]
pub trait EnsembleProcessor: Send + Sync {
    /// Compute every pending timestamp; an empty result means nothing new
    async fn process(&self, request: ProcessRequest) -> Result<CombinedAverages>;
}

/// Writes Hovmöller diagrams to a fixed output directory
pub trait HovmollerRenderer {
    /// Time × latitude diagram of a 3-D variable
    fn plot_hovmoeller_3d(&self, series: &VariableSeries, variable: &str) -> Result<PathBuf>;

    /// Time × latitude diagram of a 2-D variable
    fn plot_hovmoeller_2d(&self, series: &VariableSeries, variable: &str) -> Result<PathBuf>;
}
