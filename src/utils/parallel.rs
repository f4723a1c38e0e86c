use std::sync::atomic::AtomicUsize;
use log::info;
use rayon::{ThreadPool, ThreadPoolBuilder};
use crate::{LibraryError, Result};

pub trait ParallelProcessor {
    /// Worker count to use: the requested value, or one per available CPU.
    fn worker_count(requested: Option<usize>) -> usize {
        match requested {
            Some(n) if n > 0 => n,
            _ => num_cpus::get().max(1),
        }
    }

    /// Builds a dedicated pool so each batch gets exactly its own worker
    /// count, independent of the global rayon pool.
    fn build_pool(workers: usize) -> Result<ThreadPool> {
        if workers == 0 {
            return Err(LibraryError::InvalidOptions("worker count must be at least 1".into()));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("worker-{}", i))
            .build()?;
        info!("Using {} worker threads for processing", pool.current_num_threads());
        Ok(pool)
    }

    fn get_progress_counter() -> AtomicUsize {
        AtomicUsize::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;
    impl ParallelProcessor for Probe {}

    #[test]
    fn worker_count_prefers_requested_value() {
        assert_eq!(Probe::worker_count(Some(3)), 3);
        assert!(Probe::worker_count(None) >= 1);
        assert!(Probe::worker_count(Some(0)) >= 1);
    }

    #[test]
    fn build_pool_rejects_zero_workers() {
        assert!(matches!(Probe::build_pool(0), Err(LibraryError::InvalidOptions(_))));
        let pool = Probe::build_pool(2).unwrap();
        assert_eq!(pool.current_num_threads(), 2);
    }
}
