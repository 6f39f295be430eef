use crate::parallel::RunState;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

const SPIN_LIMIT: u32 = 64;
const YIELD_LIMIT: u32 = 16;
const PARK_TIMEOUT: Duration = Duration::from_micros(200);

/// Progress of a single factor column
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnState {
    NotReady = 0,
    InProgress = 1,
    Ready = 2,
}

impl From<u8> for ColumnState {
    fn from(v: u8) -> Self {
        match v {
            0 => ColumnState::NotReady,
            1 => ColumnState::InProgress,
            _ => ColumnState::Ready,
        }
    }
}

/// Per-column readiness flags for the parallel numeric factorization.
///
/// A column is published as `Ready` with release ordering once all of
/// its values are written, so a reader that observes `Ready` with
/// acquire ordering sees the finished column.   Waiters spin, then
/// yield, then park on a condition variable with a short timeout,
/// re-checking the run failure flag each time they wake.
#[derive(Debug)]
pub(crate) struct ColumnStates {
    states: Vec<AtomicU8>,
    sleepers: AtomicUsize,
    lock: Mutex<()>,
    cvar: Condvar,
}

impl ColumnStates {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            states: (0..n).map(|_| AtomicU8::new(0)).collect(),
            sleepers: AtomicUsize::new(0),
            lock: Mutex::new(()),
            cvar: Condvar::new(),
        }
    }

    pub(crate) fn state(&self, col: usize) -> ColumnState {
        self.states[col].load(Ordering::Acquire).into()
    }

    pub(crate) fn begin(&self, col: usize) {
        self.states[col].store(ColumnState::InProgress as u8, Ordering::Relaxed);
    }

    pub(crate) fn publish(&self, col: usize) {
        self.states[col].store(ColumnState::Ready as u8, Ordering::SeqCst);
        if self.sleepers.load(Ordering::SeqCst) > 0 {
            let _guard = self.lock.lock();
            self.cvar.notify_all();
        }
    }

    pub(crate) fn is_ready(&self, col: usize) -> bool {
        self.state(col) == ColumnState::Ready
    }

    /// Blocks until column `col` is ready.   Returns false if the run
    /// failed while waiting.
    pub(crate) fn wait_ready(&self, col: usize, run: &RunState) -> bool {
        for _ in 0..SPIN_LIMIT {
            if self.is_ready(col) {
                return true;
            }
            std::hint::spin_loop();
        }
        for _ in 0..YIELD_LIMIT {
            if self.is_ready(col) {
                return true;
            }
            if run.failed() {
                return false;
            }
            std::thread::yield_now();
        }

        self.sleepers.fetch_add(1, Ordering::SeqCst);
        let ready = self.park_until_ready(col, run);
        self.sleepers.fetch_sub(1, Ordering::SeqCst);
        ready
    }

    fn park_until_ready(&self, col: usize, run: &RunState) -> bool {
        let mut guard = match self.lock.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        loop {
            if self.states[col].load(Ordering::SeqCst) == ColumnState::Ready as u8 {
                return true;
            }
            if run.failed() {
                return false;
            }
            guard = match self.cvar.wait_timeout(guard, PARK_TIMEOUT) {
                Ok((g, _)) => g,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}
