use derive_more::Display;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics bucket. Every file lands in exactly one of the first six.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Category {
    #[display("renamed")]
    Renamed,
    #[display("deleted")]
    Deleted,
    #[display("invalid")]
    Invalid,
    #[display("duplicate")]
    Duplicate,
    #[display("skipped")]
    Skipped,
    #[display("errored")]
    Errored,
    #[display("directories removed")]
    RemovedDirectory,
}
impl Category {
    pub const FILES: [Category; 6] =
        [Self::Renamed, Self::Deleted, Self::Invalid, Self::Duplicate, Self::Skipped, Self::Errored];
    const ALL: [Category; 7] = [
        Self::Renamed,
        Self::Deleted,
        Self::Invalid,
        Self::Duplicate,
        Self::Skipped,
        Self::Errored,
        Self::RemovedDirectory,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Plain copy of the counters, for comparisons and serialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Counts {
    pub discovered: u64,
    pub renamed: u64,
    pub deleted: u64,
    pub invalid: u64,
    pub duplicate: u64,
    pub skipped: u64,
    pub errored: u64,
    pub removed_directories: u64,
}
impl Counts {
    /// Files accounted for across all file categories.
    pub fn files(&self) -> u64 {
        self.renamed + self.deleted + self.invalid + self.duplicate + self.skipped + self.errored
    }
}

/// Outcome accounting for one run.
///
/// Fixed counters are atomic; each category also keeps up to `sample_limit`
/// example paths. Safe to update from several tasks at once.
#[derive(Debug)]
pub struct RunStatistics {
    discovered: AtomicU64,
    counters: [AtomicU64; 7],
    samples: Mutex<[Vec<PathBuf>; 7]>,
    sample_limit: usize,
}
impl RunStatistics {
    pub fn new(sample_limit: usize) -> Self {
        Self {
            discovered: AtomicU64::new(0),
            counters: Default::default(),
            samples: Mutex::default(),
            sample_limit,
        }
    }

    pub(crate) fn set_discovered(&self, files: u64) {
        self.discovered.store(files, Ordering::Relaxed);
    }

    pub fn record(&self, category: Category, path: &Path) {
        self.counters[category.index()].fetch_add(1, Ordering::Relaxed);
        let mut samples = self.samples.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let bucket = &mut samples[category.index()];
        if bucket.len() < self.sample_limit {
            bucket.push(path.to_path_buf());
        }
    }

    pub fn count(&self, category: Category) -> u64 {
        self.counters[category.index()].load(Ordering::Relaxed)
    }

    pub fn discovered(&self) -> u64 {
        self.discovered.load(Ordering::Relaxed)
    }

    pub fn samples(&self, category: Category) -> Vec<PathBuf> {
        self.samples.lock().map(|s| s[category.index()].clone()).unwrap_or_default()
    }

    pub fn counts(&self) -> Counts {
        Counts {
            discovered: self.discovered(),
            renamed: self.count(Category::Renamed),
            deleted: self.count(Category::Deleted),
            invalid: self.count(Category::Invalid),
            duplicate: self.count(Category::Duplicate),
            skipped: self.count(Category::Skipped),
            errored: self.count(Category::Errored),
            removed_directories: self.count(Category::RemovedDirectory),
        }
    }

    /// Add another run's numbers to this one. Samples are kept up to this
    /// accumulator's limit.
    pub fn merge(&self, other: &RunStatistics) {
        self.discovered.fetch_add(other.discovered(), Ordering::Relaxed);
        for category in Category::ALL {
            self.counters[category.index()].fetch_add(other.count(category), Ordering::Relaxed);
            let incoming = other.samples(category);
            let mut samples = self.samples.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let bucket = &mut samples[category.index()];
            let room = self.sample_limit.saturating_sub(bucket.len());
            bucket.extend(incoming.into_iter().take(room));
        }
    }
}
impl Default for RunStatistics {
    fn default() -> Self {
        Self::new(10)
    }
}

impl fmt::Display for RunStatistics {
    /// Human-readable report, one line per category followed by its samples.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<20} {:>8}", "files discovered", self.discovered())?;
        for category in Category::ALL {
            let count = self.count(category);
            writeln!(f, "{:<20} {count:>8}", category.to_string())?;
            let samples = self.samples(category);
            for sample in &samples {
                writeln!(f, "    {}", sample.display())?;
            }
            let hidden = count.saturating_sub(samples.len() as u64);
            if hidden > 0 {
                writeln!(f, "    ... and {hidden} more")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_counts() {
        let stats = RunStatistics::new(2);
        stats.set_discovered(4);
        stats.record(Category::Renamed, Path::new("a.jpg"));
        stats.record(Category::Renamed, Path::new("b.jpg"));
        stats.record(Category::Renamed, Path::new("c.jpg"));
        stats.record(Category::Errored, Path::new("d.jpg"));
        stats.record(Category::RemovedDirectory, Path::new("old"));

        let counts = stats.counts();
        assert_eq!(counts.renamed, 3);
        assert_eq!(counts.errored, 1);
        assert_eq!(counts.files(), counts.discovered);
        assert_eq!(counts.removed_directories, 1);
        assert_eq!(stats.samples(Category::Renamed), vec![PathBuf::from("a.jpg"), PathBuf::from("b.jpg")]);
    }

    #[test]
    fn test_merge_sums() {
        let a = RunStatistics::new(3);
        a.record(Category::Invalid, Path::new("x.gif"));
        let b = RunStatistics::new(3);
        b.set_discovered(2);
        b.record(Category::Invalid, Path::new("y.gif"));
        b.record(Category::Skipped, Path::new("z.jpg"));
        a.merge(&b);
        assert_eq!(a.count(Category::Invalid), 2);
        assert_eq!(a.count(Category::Skipped), 1);
        assert_eq!(a.discovered(), 2);
        assert_eq!(a.samples(Category::Invalid).len(), 2);
    }

    #[test]
    fn test_report() {
        let stats = RunStatistics::new(1);
        stats.set_discovered(2);
        stats.record(Category::Duplicate, Path::new("in/a.jpg"));
        stats.record(Category::Duplicate, Path::new("in/b.jpg"));
        let report = stats.to_string();
        assert!(report.contains("files discovered            2"));
        assert!(report.contains("duplicate                   2\n    in/a.jpg\n    ... and 1 more"));
    }

    #[test]
    fn test_concurrent_updates() {
        let stats = std::sync::Arc::new(RunStatistics::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        stats.record(Category::Skipped, Path::new("a"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.count(Category::Skipped), 1000);
        assert!(stats.samples(Category::Skipped).is_empty());
    }
}
