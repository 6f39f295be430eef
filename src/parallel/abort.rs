use std::sync::Arc;
use std::time::Duration;

cfg_if::cfg_if! {
    if #[cfg(target_family = "wasm")] {
        use web_time::Instant;
    } else {
        use std::time::Instant;
    }
}

/// Caller supplied cancellation predicate.   Returns true when the
/// current ordering or factorization should stop.
pub type AbortFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// Cancellation check combining an optional caller predicate with an
/// optional wall clock deadline.
#[derive(Clone, Default)]
pub struct AbortCheck {
    predicate: Option<AbortFn>,
    deadline: Option<Instant>,
}

impl std::fmt::Debug for AbortCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortCheck")
            .field("predicate", &self.predicate.is_some())
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl AbortCheck {
    /// Starts the clock for `time_limit` seconds from now.  An infinite
    /// limit means no deadline.
    pub fn new(predicate: Option<AbortFn>, time_limit: f64) -> Self {
        let deadline = Duration::try_from_secs_f64(time_limit.max(0.0))
            .ok()
            .and_then(|d| Instant::now().checked_add(d));
        Self {
            predicate,
            deadline,
        }
    }

    pub fn never() -> Self {
        Self::default()
    }

    pub fn should_abort(&self) -> bool {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        self.predicate.as_ref().is_some_and(|f| f())
    }
}

#[test]
fn test_abort_check() {
    use std::sync::atomic::{AtomicBool, Ordering};

    assert!(!AbortCheck::never().should_abort());
    assert!(AbortCheck::new(None, 0.0).should_abort());
    assert!(!AbortCheck::new(None, f64::INFINITY).should_abort());

    let flag = Arc::new(AtomicBool::new(false));
    let f2 = flag.clone();
    let check = AbortCheck::new(Some(Arc::new(move || f2.load(Ordering::Relaxed))), 1e6);
    assert!(!check.should_abort());
    flag.store(true, Ordering::Relaxed);
    assert!(check.should_abort());
}
