//! Defines command-line interface options using `clap` for the RuEns application.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Process new ensemble timestamps into a versioned store and plot them
#[derive(Parser, Debug)]
#[command(
    version,
    name = "RuEns",
    about = "Incremental ensemble processing with a versioned local store"
)]
pub struct Args {
    /// Start of the time window (inclusive), e.g. 2010-01-04T00
    #[arg(long, default_value = "2010-01-04T00")]
    pub start: String,

    /// End of the time window (exclusive), e.g. 2010-01-05T00
    #[arg(long, default_value = "2010-01-05T00")]
    pub end: String,

    /// Comma-separated 3-D variables to process
    #[arg(long, value_delimiter = ',', default_value = "u")]
    pub var3d: Vec<String>,

    /// Comma-separated 2-D variables to process
    #[arg(long, value_delimiter = ',', default_value = "ps")]
    pub var2d: Vec<String>,

    /// Number of parallel workers for ensemble processing
    #[arg(short = 'w', long, env = "RUENS_WORKERS", default_value_t = 4)]
    pub workers: usize,

    /// Versioned store location
    #[arg(long, env = "RUENS_STORE", default_value = "ensemble_store")]
    pub store: PathBuf,

    /// Root directory of the ensemble member files
    #[arg(long, env = "RUENS_DATA_ROOT", default_value = "ensemble_data")]
    pub data_root: PathBuf,

    /// Directory the Hovmöller plots are written to
    #[arg(long, env = "RUENS_PLOT_DIR", default_value = "plots")]
    pub plot_dir: PathBuf,

    /// Hours between analysis times
    #[arg(long, default_value_t = 6)]
    pub step_hours: i64,

    /// How already-processed timestamps are detected
    #[arg(long, value_enum, default_value_t = SkipPolicyArg::Representative)]
    pub skip_policy: SkipPolicyArg,

    /// Variable whose stored timestamps stand in for all variables
    #[arg(long, conflicts_with = "skip_policy")]
    pub proxy_var: Option<String>,

    /// Plot 3-D variables at this level index instead of the vertical mean
    #[arg(long)]
    pub plot_level: Option<usize>,

    /// Print the commit history of the store and exit
    #[arg(long)]
    pub history: bool,

    /// Print the catalog of known ensemble variables and exit
    #[arg(long)]
    pub list_variables: bool,

    /// Enable verbose output.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SkipPolicyArg {
    /// Use the first 3-D variable's timestamps for every variable
    Representative,
    /// Skip only timestamps stored for every requested variable
    All,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_run() {
        let args = Args::parse_from(["ruens"]);
        assert_eq!(args.var3d, ["u"]);
        assert_eq!(args.var2d, ["ps"]);
        assert_eq!(args.workers, 4);
        assert_eq!(args.skip_policy, SkipPolicyArg::Representative);
    }

    #[test]
    fn variable_lists_split_on_commas() {
        let args = Args::parse_from(["ruens", "--var3d", "u,v,t", "--var2d", "ps,ts"]);
        assert_eq!(args.var3d, ["u", "v", "t"]);
        assert_eq!(args.var2d, ["ps", "ts"]);
    }
}
