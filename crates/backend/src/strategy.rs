//! Parallel processing strategies

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Processing mode for algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Parallel processing using all available cores
    Parallel,
    /// Parallel with specified number of threads
    ParallelWith(usize),
}

impl Default for ProcessingMode {
    fn default() -> Self {
        ProcessingMode::Parallel
    }
}

/// Strategy for parallel execution
pub trait ParallelStrategy {
    /// Execute a function over indices in parallel
    fn par_for_each<F>(&self, range: std::ops::Range<usize>, f: F)
    where
        F: Fn(usize) + Sync + Send;

    /// Map a function over indices and collect results
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send;
}

impl ParallelStrategy for ProcessingMode {
    fn par_for_each<F>(&self, range: std::ops::Range<usize>, f: F)
    where
        F: Fn(usize) + Sync + Send,
    {
        match self {
            ProcessingMode::Sequential => {
                for i in range {
                    f(i);
                }
            }
            #[cfg(feature = "parallel")]
            ProcessingMode::Parallel => {
                range.into_par_iter().for_each(f);
            }
            #[cfg(feature = "parallel")]
            ProcessingMode::ParallelWith(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(*threads)
                    .build()
                    .expect("Failed to build thread pool");
                pool.install(|| {
                    range.into_par_iter().for_each(f);
                });
            }
            #[cfg(not(feature = "parallel"))]
            ProcessingMode::Parallel | ProcessingMode::ParallelWith(_) => {
                for i in range {
                    f(i);
                }
            }
        }
    }

    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match self {
            ProcessingMode::Sequential => range.map(f).collect(),
            #[cfg(feature = "parallel")]
            ProcessingMode::Parallel => range.into_par_iter().map(f).collect(),
            #[cfg(feature = "parallel")]
            ProcessingMode::ParallelWith(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(*threads)
                    .build()
                    .expect("Failed to build thread pool");
                pool.install(|| range.into_par_iter().map(f).collect())
            }
            #[cfg(not(feature = "parallel"))]
            ProcessingMode::Parallel | ProcessingMode::ParallelWith(_) => range.map(f).collect(),
        }
    }
}

/// Get the number of available worker threads
#[cfg(feature = "parallel")]
pub fn num_cpus() -> usize {
    rayon::current_num_threads()
}

#[cfg(not(feature = "parallel"))]
pub fn num_cpus() -> usize {
    1
}

/// Configure the global thread pool
#[cfg(feature = "parallel")]
pub fn set_num_threads(threads: usize) {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok(); // Ignore if already initialized
}

#[cfg(not(feature = "parallel"))]
pub fn set_num_threads(_threads: usize) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_par_for_each_visits_all() {
        let counter = AtomicUsize::new(0);
        for mode in [
            ProcessingMode::Sequential,
            ProcessingMode::Parallel,
            ProcessingMode::ParallelWith(2),
        ] {
            counter.store(0, Ordering::SeqCst);
            mode.par_for_each(0..100, |i| {
                counter.fetch_add(i, Ordering::SeqCst);
            });
            assert_eq!(counter.load(Ordering::SeqCst), 4950);
        }
    }

    #[test]
    fn test_par_map_preserves_order() {
        let squares = ProcessingMode::Parallel.par_map(0..8, |i| i * i);
        assert_eq!(squares, vec![0, 1, 4, 9, 16, 25, 36, 49]);
    }
}
