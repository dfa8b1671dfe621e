//! Validated run configuration
//!
//! Command-line arguments (with their environment fallbacks) are checked once
//! here; everything downstream works with typed values.

use crate::cli::{Args, SkipPolicyArg};
use crate::errors::{Result, RuEnsError};
use crate::orchestrator::{RunPlan, SkipPolicy};
use crate::time_window::{parse_timestamp, TimeWindow, DEFAULT_STEP_HOURS};
use crate::variables::VariableSelection;
use chrono::{Duration, NaiveDate};
use std::path::PathBuf;

/// Everything one invocation needs
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub window: TimeWindow,
    pub variables: VariableSelection,
    pub num_workers: usize,
    pub step: Duration,
    pub skip_policy: SkipPolicy,
    pub store_path: PathBuf,
    pub data_root: PathBuf,
    pub plot_dir: PathBuf,
    pub plot_level: Option<usize>,
}

impl RunConfig {
    /// Build a configuration from parsed arguments
    ///
    /// # Errors
    ///
    /// Returns an error for unparsable timestamps, an empty or inverted
    /// window, a bad variable selection, or a non-positive step or worker count.
    pub fn from_args(args: &Args) -> Result<Self> {
        let window = TimeWindow::new(parse_timestamp(&args.start)?, parse_timestamp(&args.end)?)?;
        let variables = VariableSelection::new(
            args.var3d.iter().filter(|v| !v.trim().is_empty()).cloned(),
            args.var2d.iter().filter(|v| !v.trim().is_empty()).cloned(),
        )?;

        if args.workers == 0 {
            return Err(RuEnsError::ThreadPoolError(
                "worker count must be at least 1".to_string(),
            ));
        }
        if args.step_hours <= 0 {
            return Err(RuEnsError::InvalidWindow {
                message: format!("step must be positive, got {} hours", args.step_hours),
            });
        }
        let step = Duration::try_hours(args.step_hours).ok_or_else(|| RuEnsError::InvalidWindow {
            message: format!("step of {} hours is out of range", args.step_hours),
        })?;

        let skip_policy = match (&args.proxy_var, args.skip_policy) {
            (Some(var), _) => {
                if variables.kind_of(var).is_none() {
                    return Err(RuEnsError::InvalidSelection {
                        message: format!("proxy variable '{var}' is not among the selected variables"),
                    });
                }
                SkipPolicy::Variable(var.clone())
            }
            (None, SkipPolicyArg::Representative) => SkipPolicy::Representative,
            (None, SkipPolicyArg::All) => SkipPolicy::AllVariables,
        };

        Ok(Self {
            window,
            variables,
            num_workers: args.workers,
            step,
            skip_policy,
            store_path: args.store.clone(),
            data_root: args.data_root.clone(),
            plot_dir: args.plot_dir.clone(),
            plot_level: args.plot_level,
        })
    }

    /// The orchestrator's view of this configuration
    pub fn plan(&self) -> RunPlan {
        RunPlan::new(self.window, self.variables.clone(), self.num_workers)
            .with_step(self.step)
            .with_skip_policy(self.skip_policy.clone())
    }
}

impl Default for RunConfig {
    /// One day of `u` and `ps` starting 2010-01-04, four workers
    fn default() -> Self {
        let day = NaiveDate::from_ymd_opt(2010, 1, 4).unwrap_or_default();
        let start = day.and_hms_opt(0, 0, 0).unwrap_or_default();
        Self {
            window: TimeWindow::new(start, start + Duration::days(1))
                .unwrap_or_else(|_| unreachable!("a one-day window is never empty")),
            variables: VariableSelection::new(["u"], ["ps"])
                .unwrap_or_else(|_| unreachable!("default selection is valid")),
            num_workers: 4,
            step: Duration::hours(DEFAULT_STEP_HOURS),
            skip_policy: SkipPolicy::Representative,
            store_path: PathBuf::from("ensemble_store"),
            data_root: PathBuf::from("ensemble_data"),
            plot_dir: PathBuf::from("plots"),
            plot_level: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn cli_defaults_match_default_config() {
        let from_cli = RunConfig::from_args(&Args::parse_from(["ruens"])).unwrap();
        let default = RunConfig::default();
        assert_eq!(from_cli.window, default.window);
        assert_eq!(from_cli.variables, default.variables);
        assert_eq!(from_cli.num_workers, default.num_workers);
        assert_eq!(from_cli.step, default.step);
    }

    #[test]
    fn proxy_variable_must_be_selected() {
        let args = Args::parse_from(["ruens", "--proxy-var", "v"]);
        assert!(RunConfig::from_args(&args).is_err());

        let args = Args::parse_from(["ruens", "--proxy-var", "ps"]);
        let config = RunConfig::from_args(&args).unwrap();
        assert_eq!(config.skip_policy, SkipPolicy::Variable("ps".to_string()));
    }

    #[test]
    fn zero_workers_rejected() {
        let args = Args::parse_from(["ruens", "--workers", "0"]);
        assert!(RunConfig::from_args(&args).is_err());
    }

    #[test]
    fn inverted_window_rejected() {
        let args = Args::parse_from(["ruens", "--start", "2010-01-05", "--end", "2010-01-04"]);
        assert!(matches!(
            RunConfig::from_args(&args),
            Err(RuEnsError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn oversized_step_is_an_invalid_window() {
        let max = i64::MAX.to_string();
        let args = Args::parse_from(["ruens", "--step-hours", max.as_str()]);
        assert!(matches!(
            RunConfig::from_args(&args),
            Err(RuEnsError::InvalidWindow { .. })
        ));
    }
}
