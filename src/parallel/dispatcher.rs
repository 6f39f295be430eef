use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use thiserror::Error;

/// Failure reported by [`ParallelDispatcher::run`]
#[derive(Error, Debug)]
pub enum DispatchError<E> {
    /// the first error returned by any task
    #[error("parallel task failed: {0}")]
    Task(E),
    /// a task panicked
    #[error("parallel task panicked")]
    Panicked,
}

/// Shared state visible to every task of a single [`ParallelDispatcher::run`].
#[derive(Debug, Default)]
pub struct RunState {
    failed: AtomicBool,
    cursor: AtomicUsize,
}

impl RunState {
    /// True once any task has failed.   Long running or waiting tasks
    /// should poll this and stop early.
    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    // first caller wins the right to record its error
    fn claim_failure(&self) -> bool {
        self.failed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn next_task(&self) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed)
    }
}

/// Runs `ntasks` index-addressed tasks over a fixed number of threads.
///
/// Task indices are claimed in increasing order from a shared cursor,
/// so when a task for index `j` starts, every task `k < j` has already
/// been started by some worker.   Tasks may therefore wait on the results
/// of lower indexed tasks without deadlock.
#[derive(Debug, Clone, Copy)]
pub struct ParallelDispatcher {
    threads: usize,
    serial_threshold: usize,
}

impl ParallelDispatcher {
    /// Dispatcher with `threads` workers.   Runs with fewer than
    /// `serial_threshold` estimated work units execute on the calling
    /// thread.
    pub fn new(threads: usize, serial_threshold: usize) -> Self {
        Self {
            threads: threads.max(1),
            serial_threshold,
        }
    }

    pub fn thread_count(&self) -> usize {
        self.threads
    }

    /// True if a run of the given size would use more than one thread
    pub fn is_parallel(&self, ntasks: usize, work_units: usize) -> bool {
        self.threads > 1 && ntasks > 1 && work_units >= self.serial_threshold
    }

    /// Execute `task(scratch, index, state)` for every `index` in
    /// `0..ntasks`.   Each worker owns one scratch value built by
    /// `scratch_init`.   The first error (or panic) is returned after
    /// all workers have stopped.   Tasks not yet started when a failure
    /// is recorded are skipped.
    pub fn run<S, E, FI, FT>(
        &self,
        ntasks: usize,
        work_units: usize,
        scratch_init: FI,
        task: FT,
    ) -> Result<(), DispatchError<E>>
    where
        E: Send,
        FI: Fn() -> S + Sync,
        FT: Fn(&mut S, usize, &RunState) -> Result<(), E> + Sync,
    {
        let state = RunState::default();
        let first_error: Mutex<Option<DispatchError<E>>> = Mutex::new(None);

        let nworkers = if self.is_parallel(ntasks, work_units) {
            self.threads.min(ntasks)
        } else {
            1
        };

        let worker = || {
            let mut scratch = scratch_init();
            while !state.failed() {
                let idx = state.next_task();
                if idx >= ntasks {
                    break;
                }
                let out = catch_unwind(AssertUnwindSafe(|| task(&mut scratch, idx, &state)));
                let err = match out {
                    Ok(Ok(())) => continue,
                    Ok(Err(e)) => DispatchError::Task(e),
                    Err(_) => DispatchError::Panicked,
                };
                if state.claim_failure() {
                    if let Ok(mut slot) = first_error.lock() {
                        *slot = Some(err);
                    }
                }
                break;
            }
        };

        if nworkers <= 1 {
            worker();
        } else {
            // Real OS threads rather than a work-stealing pool, since
            // tasks may block while waiting on each other.
            thread::scope(|s| {
                for _ in 0..nworkers {
                    s.spawn(worker);
                }
            });
        }

        let recorded = match first_error.into_inner() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        match recorded {
            Some(err) => Err(err),
            None if state.failed() => Err(DispatchError::Panicked),
            None => Ok(()),
        }
    }
}
