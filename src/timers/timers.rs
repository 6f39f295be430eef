use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

cfg_if::cfg_if! {
    if #[cfg(target_family = "wasm")] {
        use web_time::Instant;
    } else {
        use std::time::Instant;
    }
}

#[derive(Debug, Default, Clone)]
struct InnerTimer {
    start: Option<Instant>,
    elapsed: Duration,
    subtimers: SubTimersMap,
}

impl InnerTimer {
    fn reset(&mut self) {
        self.start = None;
        self.elapsed = Duration::ZERO;
        self.subtimers.clear();
    }

    fn start(&mut self) {
        self.start = Some(Instant::now());
    }

    fn stop(&mut self) {
        if let Some(instant) = self.start.take() {
            self.elapsed += instant.elapsed();
        }
    }

    fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[derive(Debug, Default, Clone)]
struct SubTimersMap(HashMap<&'static str, InnerTimer>);

impl Deref for SubTimersMap {
    type Target = HashMap<&'static str, InnerTimer>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
impl DerefMut for SubTimersMap {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl SubTimersMap {
    fn start_subtimer(&mut self, key: &'static str) {
        let t = self.0.entry(key).or_default();
        t.start();
    }

    fn total_time(&self) -> Duration {
        self.values()
            .fold(Duration::ZERO, |acc, t| acc + t.elapsed())
    }

    fn find(&self, key: &str) -> Option<Duration> {
        if let Some(t) = self.get(key) {
            return Some(t.elapsed());
        }
        self.values().find_map(|t| t.subtimers.find(key))
    }

    fn print(&self, depth: u8) {
        let mut keys: Vec<_> = self.keys().collect();
        keys.sort();
        for key in keys {
            let val = &self[key];
            let tabs = format!("{: <1$}", "", 4 * depth as usize);
            println!("{}{:} : {:?}", tabs, *key, val.elapsed);
            val.subtimers.print(depth + 1);
        }
    }
}

/// Nested phase timers.   Phases started while another is active are
/// recorded as its children.
#[derive(Default, Debug, Clone)]
pub struct Timers {
    stack: Vec<&'static str>,
    subtimers: SubTimersMap,
}

impl Timers {
    fn mut_active_timer(&mut self) -> Option<&mut InnerTimer> {
        let (first, rest) = self.stack.split_first()?;

        //first one gets special treatment since self is not
        //an InnerTimer and a common trait would be overkill
        let mut active_timer = self.subtimers.get_mut(first)?;
        for key in rest {
            active_timer = active_timer.subtimers.get_mut(key)?;
        }
        Some(active_timer)
    }

    pub fn reset(&mut self) {
        self.stack.clear();
        self.subtimers.values_mut().for_each(|t| t.reset());
    }

    pub fn start_as_current(&mut self, key: &'static str) {
        //starts a timer with name "key" as the current timer
        if let Some(active) = self.mut_active_timer() {
            // child of current active timer
            active.subtimers.start_subtimer(key);
        } else {
            // nothing active, create one at root
            self.subtimers.start_subtimer(key);
        }

        //append to timer call stack
        self.stack.push(key);
    }

    pub fn stop_current(&mut self) {
        if let Some(active) = self.mut_active_timer() {
            active.stop();
        }
        //remove from timer call stack
        self.stack.pop();
    }

    /// Accumulated time of the named phase at any nesting depth
    pub fn elapsed(&self, key: &str) -> Option<Duration> {
        self.subtimers.find(key)
    }

    pub fn total_time(&self) -> Duration {
        self.subtimers.total_time()
    }

    pub fn print(&self) {
        self.subtimers.print(0);
    }
}

// Evaluates to the value of the timed block.   The block must not
// return early, or the timer is left running.
macro_rules! timeit {
    ($timer:expr => $key:literal; $($tt:tt)+) => {{
        $timer.start_as_current($key);
        let out = { $($tt)+ };
        $timer.stop_current();
        out
    }};
}
pub(crate) use timeit;

#[test]
fn test_timers_nesting() {
    let mut t = Timers::default();
    t.start_as_current("outer");
    t.start_as_current("inner");
    t.stop_current();
    t.stop_current();

    assert!(t.elapsed("outer").is_some());
    assert!(t.elapsed("inner").is_some());
    assert!(t.elapsed("missing").is_none());
    assert!(t.total_time() >= t.elapsed("inner").unwrap_or_default());
}
