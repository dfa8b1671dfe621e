//! RuEns: incremental ensemble processing into a versioned store
//!
//! RuEns averages ensemble NetCDF output (across members, then over
//! longitude) for a window of analysis times. Only timestamps missing from the
//! store are processed. The new ones are committed as a single labelled
//! version, then read back and drawn as Hovmöller diagrams.
//!
//! ## Key Features
//!
//! - **Incremental runs**: timestamps already in the store are skipped
//! - **Versioned storage**: every run is one atomic, labelled snapshot with history
//! - **Parallel processing**: timestamps are spread over a Rayon worker pool
//! - **Hovmöller plots**: time × latitude SVG diagrams for 3-D and 2-D variables
//!
//! ## Module Organization
//!
//! - [`orchestrator`]: the run itself, written against the collaborator traits
//! - [`data_source`]: the store, processor and renderer traits
//! - [`store`]: the local-filesystem versioned repository
//! - [`processor`] and [`ensemble_io`]: NetCDF member reading and averaging
//! - [`statistics`]: NaN-aware parallel means
//! - [`plot`]: the SVG renderer
//! - [`config`], [`cli`], [`time_window`], [`variables`]: run inputs
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ru_ens::prelude::*;
//!
//! # async fn demo() -> ru_ens::Result<()> {
//! let store = LocalRepository::open_or_create("ensemble_store").await?;
//! let processor = NetcdfEnsembleProcessor::new("ensemble_data");
//! let renderer = SvgHovmollerRenderer::new("plots");
//!
//! let plan = RunConfig::default().plan();
//! let outcome = Orchestrator::new(&store, &processor, &renderer).run(&plan).await?;
//! if outcome.is_noop() {
//!     println!("No new time steps to process.");
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod data_source;
pub mod ensemble_io;
pub mod errors;
pub mod model;
pub mod orchestrator;
pub mod parallel;
pub mod plot;
pub mod processor;
pub mod statistics;
pub mod store;
pub mod time_window;
pub mod variables;

pub use errors::{Result, RuEnsError};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::config::RunConfig;
    pub use crate::data_source::{EnsembleProcessor, HovmollerRenderer, ProcessRequest, VersionedStore};
    pub use crate::errors::{Result, RuEnsError};
    pub use crate::model::{CombinedAverages, CommitRecord, SnapshotId, VariableSeries};
    pub use crate::orchestrator::{Orchestrator, RunOutcome, RunPlan, SkipPolicy};
    pub use crate::parallel::ParallelConfig;
    pub use crate::plot::SvgHovmollerRenderer;
    pub use crate::processor::NetcdfEnsembleProcessor;
    pub use crate::store::LocalRepository;
    pub use crate::time_window::TimeWindow;
    pub use crate::variables::{VariableKind, VariableSelection};
}
