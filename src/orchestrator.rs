//! The ensemble run: skip-set lookup, processing, commit, read-back, plots
//!
//! Steps run strictly in sequence and every collaborator error propagates
//! unchanged. Nothing is retried and nothing is rolled back.

use crate::data_source::{EnsembleProcessor, HovmollerRenderer, ProcessRequest, VersionedStore};
use crate::errors::Result;
use crate::model::CommitRecord;
use crate::time_window::{TimeWindow, DEFAULT_STEP_HOURS, DISPLAY_FORMAT};
use crate::variables::{VariableKind, VariableSelection};
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info};

/// How the orchestrator decides which timestamps are already processed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SkipPolicy {
    /// Use the first 3-D variable's stored timestamps (first 2-D variable if
    /// no 3-D one is selected) for all variables
    #[default]
    Representative,
    /// Same as [`SkipPolicy::Representative`] with an explicit variable
    Variable(String),
    /// Only skip timestamps stored for every requested variable
    AllVariables,
}

/// Inputs of one run
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub window: TimeWindow,
    pub variables: VariableSelection,
    pub num_workers: usize,
    pub step: Duration,
    pub skip_policy: SkipPolicy,
}

impl RunPlan {
    pub fn new(window: TimeWindow, variables: VariableSelection, num_workers: usize) -> Self {
        Self {
            window,
            variables,
            num_workers,
            step: Duration::hours(DEFAULT_STEP_HOURS),
            skip_policy: SkipPolicy::default(),
        }
    }

    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    pub fn with_skip_policy(mut self, skip_policy: SkipPolicy) -> Self {
        self.skip_policy = skip_policy;
        self
    }

    /// Label of the version a successful run creates
    pub fn commit_message(&self) -> String {
        format!("Processed data from {}", self.window)
    }
}

/// What a run did
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The processor found nothing new; the store was not touched
    NothingNew {
        skipped: usize,
    },
    /// One new version was committed and plotted
    Committed {
        commit: CommitRecord,
        new_timestamps: usize,
        plots: Vec<PathBuf>,
    },
}

impl RunOutcome {
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NothingNew { .. })
    }
}

/// Receives one human-readable line per run step
pub type Progress<'a> = &'a (dyn Fn(&str) + Sync);

/// Drives one run against a store, a processor and a renderer
pub struct Orchestrator<'a, S, P, R> {
    store: &'a S,
    processor: &'a P,
    renderer: &'a R,
    progress: Option<Progress<'a>>,
}

impl<'a, S, P, R> Orchestrator<'a, S, P, R>
where
    S: VersionedStore,
    P: EnsembleProcessor,
    R: HovmollerRenderer,
{
    pub fn new(store: &'a S, processor: &'a P, renderer: &'a R) -> Self {
        Self {
            store,
            processor,
            renderer,
            progress: None,
        }
    }

    /// Report each step to `progress` as well as to the log
    pub fn with_progress(mut self, progress: Progress<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    fn report(&self, line: &str) {
        if let Some(progress) = self.progress {
            progress(line);
        }
    }

    /// Run the plan
    ///
    /// # Errors
    ///
    /// Any store, processor or renderer failure ends the run with that error.
    pub async fn run(&self, plan: &RunPlan) -> Result<RunOutcome> {
        info!(window = %plan.window, variables = plan.variables.len(), "starting ensemble run");

        let skip_times = self.skip_set(plan).await?;
        match (skip_times.first(), skip_times.last()) {
            (Some(first), Some(last)) => {
                info!(
                    existing = skip_times.len(),
                    first = %first,
                    last = %last,
                    "found existing timestamps"
                );
                self.report(&format!(
                    "Found {} existing timestamps in repository",
                    skip_times.len()
                ));
                self.report(&format!("First timestamp: {}", first.format(DISPLAY_FORMAT)));
                self.report(&format!("Last timestamp: {}", last.format(DISPLAY_FORMAT)));
            }
            _ => {
                info!("no existing data found in repository");
                self.report("No existing data found in repository");
            }
        }

        self.report(&format!(
            "Processing new data with {} workers...",
            plan.num_workers
        ));

        let request = ProcessRequest {
            window: plan.window,
            variables: plan.variables.clone(),
            skip_times: skip_times.clone(),
            num_workers: plan.num_workers,
            step: plan.step,
        };
        let averages = self.processor.process(request).await?;

        if averages.is_empty() {
            info!("no new time steps to process");
            self.report("No new time steps to process.");
            return Ok(RunOutcome::NothingNew {
                skipped: skip_times.len(),
            });
        }

        let new_timestamps = averages.timestamp_count();
        let message = plan.commit_message();
        self.report(&format!("Saving data to repository: {message}"));
        let commit = self.store.commit(&averages, &message).await?;
        info!(snapshot = %commit.id, new_timestamps, "saved new data");

        // Read everything back before drawing anything
        self.report("Loading data for visualization...");
        let mut reloaded = Vec::with_capacity(plan.variables.len());
        for (variable, kind) in plan.variables.iter() {
            let series = self.store.load(variable).await?;
            debug!(variable, timestamps = series.len(), "reloaded series");
            reloaded.push((variable, kind, series));
        }

        self.report("Creating visualizations...");
        let mut plots = Vec::with_capacity(reloaded.len());
        for (variable, kind, series) in &reloaded {
            let path = match kind {
                VariableKind::ThreeD => self.renderer.plot_hovmoeller_3d(series, variable)?,
                VariableKind::TwoD => self.renderer.plot_hovmoeller_2d(series, variable)?,
            };
            plots.push(path);
        }

        Ok(RunOutcome::Committed {
            commit,
            new_timestamps,
            plots,
        })
    }

    async fn skip_set(&self, plan: &RunPlan) -> Result<BTreeSet<NaiveDateTime>> {
        match &plan.skip_policy {
            SkipPolicy::Representative => {
                self.store
                    .existing_timestamps(plan.variables.representative())
                    .await
            }
            SkipPolicy::Variable(variable) => self.store.existing_timestamps(variable).await,
            SkipPolicy::AllVariables => {
                let mut common: Option<BTreeSet<NaiveDateTime>> = None;
                for (variable, _) in plan.variables.iter() {
                    let times = self.store.existing_timestamps(variable).await?;
                    common = Some(match common {
                        None => times,
                        Some(acc) => acc.intersection(&times).copied().collect(),
                    });
                }
                Ok(common.unwrap_or_default())
            }
        }
    }
}
