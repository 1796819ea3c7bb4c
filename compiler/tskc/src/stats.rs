//! Factory performance counters.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Counters shared by every thread using one factory.
#[derive(Debug, Default)]
pub struct FactoryStats {
    compiles: AtomicU64,
    loads: AtomicU64,
    cache_hits: AtomicU64,
    load_nanos: AtomicU64,
    recent_compiles: Mutex<FxHashMap<PathBuf, Vec<Instant>>>,
}

/// A consistent-enough copy of [`FactoryStats`].
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct StatsSnapshot {
    pub compiles: u64,
    pub loads: u64,
    pub cache_hits: u64,
    /// Loads served without recompiling, over all loads.
    pub cache_hit_ratio: f64,
    pub average_load: Duration,
}

impl FactoryStats {
    /// Count a compile of `source`. Compiles older than `window` are
    /// forgotten, along with sources that have none left.
    pub(crate) fn record_compile(&self, source: &Path, window: Duration) {
        self.compiles.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let mut recent = self.recent_compiles.lock();
        prune(&mut recent, now, window);
        recent.entry(source.to_path_buf()).or_default().push(now);
    }

    #[cfg(test)]
    fn tracked_compiles(&self) -> usize {
        self.recent_compiles.lock().values().map(Vec::len).sum()
    }

    pub(crate) fn record_load(&self, duration: Duration, cache_hit: bool) {
        self.loads.fetch_add(1, Ordering::Relaxed);
        if cache_hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.load_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn compiles(&self) -> u64 {
        self.compiles.load(Ordering::Relaxed)
    }

    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn snapshot(&self) -> StatsSnapshot {
        let loads = self.loads();
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let load_nanos = self.load_nanos.load(Ordering::Relaxed);
        StatsSnapshot {
            compiles: self.compiles(),
            loads,
            cache_hits,
            cache_hit_ratio: if loads == 0 {
                0.0
            } else {
                cache_hits as f64 / loads as f64
            },
            average_load: Duration::from_nanos(load_nanos.checked_div(loads).unwrap_or(0)),
        }
    }

    /// Advice derived from the counters.
    ///
    /// A source recompiled at least `threshold` times within `window`
    /// should be precompiled at build time. A low hit ratio over a
    /// meaningful number of loads points at artifacts that cannot be kept.
    #[allow(clippy::cast_precision_loss)]
    pub fn recommendations(&self, window: Duration, threshold: usize) -> Vec<String> {
        let mut out = Vec::new();
        let now = Instant::now();
        let mut recent = self.recent_compiles.lock();
        prune(&mut recent, now, window);
        let mut noisy: Vec<(&PathBuf, usize)> = recent
            .iter()
            .map(|(path, times)| (path, times.len()))
            .filter(|&(_, n)| threshold > 0 && n >= threshold)
            .collect();
        noisy.sort();
        for (path, n) in noisy {
            out.push(format!(
                "`{}` recompiled {n} times in {} minutes; consider precompiling at build time",
                path.display(),
                window.as_secs().div_ceil(60)
            ));
        }

        let snapshot = self.snapshot();
        if snapshot.loads >= 10 && snapshot.cache_hit_ratio < 0.5 {
            out.push(format!(
                "cache hit ratio is {:.0}% over {} loads; \
                 check that artifacts are writable and sources are not rewritten on every start",
                snapshot.cache_hit_ratio * 100.0,
                snapshot.loads
            ));
        }
        out
    }
}

fn prune(recent: &mut FxHashMap<PathBuf, Vec<Instant>>, now: Instant, window: Duration) {
    recent.retain(|_, times| {
        times.retain(|t| now.duration_since(*t) <= window);
        !times.is_empty()
    });
}
