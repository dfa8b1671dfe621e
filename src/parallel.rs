//! Parallel processing configuration and management
//!
//! The worker count of a run is a hint handed to the processor. It becomes a
//! dedicated Rayon pool for that call, leaving the global pool untouched.

use crate::errors::{Result, RuEnsError};
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Configuration for parallel processing
#[derive(Debug, Clone, Default)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    /// Create a configuration that uses all available CPU cores
    pub fn all_cores() -> Self {
        Self {
            num_threads: Some(num_cpus::get()),
        }
    }

    /// Create a configuration that uses a specific number of threads
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
        }
    }

    /// Number of workers the pool will get
    pub fn effective_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }

    /// Build a local Rayon pool sized by this configuration
    ///
    /// # Errors
    ///
    /// Returns an error for a zero worker count or if the pool cannot be spawned.
    pub fn build_pool(&self) -> Result<ThreadPool> {
        let num_threads = self.effective_threads();
        if num_threads == 0 {
            return Err(RuEnsError::ThreadPoolError(
                "worker count must be at least 1".to_string(),
            ));
        }

        ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("ruens-worker-{i}"))
            .build()
            .map_err(|e| {
                RuEnsError::ThreadPoolError(format!(
                    "Failed to initialize thread pool with {num_threads} threads: {e}"
                ))
            })
    }
}

/// Get information about the current parallel configuration
pub fn get_parallel_info() -> ParallelInfo {
    ParallelInfo {
        current_threads: rayon::current_num_threads(),
        available_cores: num_cpus::get(),
        available_parallelism: std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(1),
    }
}

/// Information about the parallel processing environment
#[derive(Debug, Clone)]
pub struct ParallelInfo {
    pub current_threads: usize,
    pub available_cores: usize,
    pub available_parallelism: usize,
}

impl ParallelInfo {
    /// Print parallel processing information
    pub fn print_info(&self) {
        println!("📊 Parallel Processing Information:");
        println!("   Current threads: {}", self.current_threads);
        println!("   Available CPU cores: {}", self.available_cores);
        println!("   Available parallelism: {}", self.available_parallelism);
    }
}
