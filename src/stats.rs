//! Server Statistics Registry
//!
//! A fixed record of named entries served by the `stats` command. Three
//! kinds of entries exist:
//!
//! - static strings captured at startup (`pid`, `version`, `runtime`)
//! - samples evaluated at snapshot time (`uptime`, `time`, `threads`,
//!   `rusage_user`, `rusage_system`)
//! - monotonic counters updated from connection tasks (`cmd_get`,
//!   `cmd_set`, `get_hits`, `get_misses`, `curr_connections`,
//!   `total_connections`, `evictions`)
//!
//! Counters are plain atomics with relaxed ordering; every completed
//! update is eventually visible in a snapshot, and taking a snapshot
//! never blocks request handling.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Identifier of the runtime reported in the `runtime` stats entry.
const RUNTIME: &str = "rust/tokio";

/// A monotonic integer counter shared between connection tasks.
#[derive(Debug, Default)]
pub struct Counter(AtomicI64);

impl Counter {
    pub const fn new() -> Self {
        Self(AtomicI64::new(0))
    }

    pub fn incr(&self, delta: i64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn decr(&self, delta: i64) {
        self.0.fetch_sub(delta, Ordering::Relaxed);
    }

    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// The live statistics record. One instance exists for the process
/// lifetime, shared by every connection task.
#[derive(Debug)]
pub struct Stats {
    started: Instant,
    pid: u32,
    pub cmd_get: Counter,
    pub cmd_set: Counter,
    pub get_hits: Counter,
    pub get_misses: Counter,
    pub curr_connections: Counter,
    pub total_connections: Counter,
    pub evictions: Counter,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            pid: std::process::id(),
            cmd_get: Counter::new(),
            cmd_set: Counter::new(),
            get_hits: Counter::new(),
            get_misses: Counter::new(),
            curr_connections: Counter::new(),
            total_connections: Counter::new(),
            evictions: Counter::new(),
        }
    }

    /// Renders every entry into printable decimal form. Sampled entries
    /// are evaluated now; the order is fixed with `pid` first.
    pub fn snapshot(&self) -> Vec<(&'static str, String)> {
        vec![
            ("pid", self.pid.to_string()),
            ("uptime", self.started.elapsed().as_secs().to_string()),
            ("time", unix_now().to_string()),
            ("version", crate::VERSION.to_string()),
            ("runtime", RUNTIME.to_string()),
            ("threads", worker_threads().to_string()),
            ("rusage_user", format!("{:.6}", rusage_seconds(Usage::User))),
            (
                "rusage_system",
                format!("{:.6}", rusage_seconds(Usage::System)),
            ),
            ("cmd_get", self.cmd_get.get().to_string()),
            ("cmd_set", self.cmd_set.get().to_string()),
            ("get_hits", self.get_hits.get().to_string()),
            ("get_misses", self.get_misses.get().to_string()),
            ("curr_connections", self.curr_connections.get().to_string()),
            (
                "total_connections",
                self.total_connections.get().to_string(),
            ),
            ("evictions", self.evictions.get().to_string()),
        ]
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Worker thread count of the current tokio runtime, 0 off-runtime.
fn worker_threads() -> usize {
    tokio::runtime::Handle::try_current()
        .map(|handle| handle.metrics().num_workers())
        .unwrap_or(0)
}

enum Usage {
    User,
    System,
}

#[cfg(unix)]
fn rusage_seconds(which: Usage) -> f64 {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    if unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) } != 0 {
        return 0.0;
    }
    let tv = match which {
        Usage::User => usage.ru_utime,
        Usage::System => usage.ru_stime,
    };
    tv.tv_sec as f64 + tv.tv_usec as f64 / 1_000_000.0
}

#[cfg(not(unix))]
fn rusage_seconds(_which: Usage) -> f64 {
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Entries whose value may legitimately change between two
    /// back-to-back snapshots.
    const TIME_VARYING: &[&str] = &["uptime", "time", "threads", "rusage_user", "rusage_system"];

    #[test]
    fn test_counter_updates() {
        let counter = Counter::new();
        for _ in 0..10 {
            counter.incr(1);
        }
        assert_eq!(counter.get(), 10);
        for _ in 0..10 {
            counter.decr(1);
        }
        assert_eq!(counter.get(), 0);
        counter.set(100);
        assert_eq!(counter.get(), 100);
    }

    #[test]
    fn test_counter_concurrent_increments() {
        let stats = std::sync::Arc::new(Stats::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let stats = stats.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    stats.cmd_get.incr(1);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.cmd_get.get(), 8000);
    }

    #[test]
    fn test_snapshot_entries() {
        let stats = Stats::new();
        let snapshot = stats.snapshot();

        assert_eq!(snapshot.len(), 15);
        assert_eq!(snapshot[0].0, "pid");
        assert_eq!(snapshot[0].1, std::process::id().to_string());

        let names: Vec<&str> = snapshot.iter().map(|(name, _)| *name).collect();
        for expected in [
            "pid",
            "uptime",
            "time",
            "version",
            "runtime",
            "threads",
            "rusage_user",
            "rusage_system",
            "cmd_get",
            "cmd_set",
            "get_hits",
            "get_misses",
            "curr_connections",
            "total_connections",
            "evictions",
        ] {
            assert!(names.contains(&expected), "missing entry {expected}");
        }
    }

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = Stats::new();
        stats.cmd_get.incr(3);
        stats.get_hits.incr(2);
        stats.get_misses.incr(1);

        let snapshot = stats.snapshot();
        let value = |name: &str| {
            snapshot
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(value("cmd_get"), "3");
        assert_eq!(value("get_hits"), "2");
        assert_eq!(value("get_misses"), "1");
        assert_eq!(value("evictions"), "0");
    }

    #[test]
    fn test_consecutive_snapshots_stable() {
        let stats = Stats::new();
        let first = stats.snapshot();
        let second = stats.snapshot();

        for ((name, a), (_, b)) in first.iter().zip(second.iter()) {
            if !TIME_VARYING.contains(name) {
                assert_eq!(a, b, "entry {name} changed between snapshots");
            }
        }
    }

    #[test]
    fn test_version_entry() {
        let stats = Stats::new();
        let snapshot = stats.snapshot();
        assert!(snapshot.contains(&("version", crate::VERSION.to_string())));
    }
}
