use std::sync::atomic::{AtomicU64, Ordering};

/// Commit-side counters for the periodic `STATS` log line, reset after
/// every read the way the original's `Counter()` is replaced each
/// interval in `print_info`.
#[derive(Default)]
pub struct Counters {
    added: AtomicU64,
    errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Snapshot {
    pub added: u64,
    pub errors: u64,
}

impl Counters {
    pub fn record_added(&self, n: u64) {
        self.added.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_errors(&self, n: u64) {
        self.errors.fetch_add(n, Ordering::Relaxed);
    }

    pub fn take_snapshot(&self) -> Snapshot {
        Snapshot {
            added: self.added.swap(0, Ordering::Relaxed),
            errors: self.errors.swap(0, Ordering::Relaxed),
        }
    }
}
