//! Table statistics and resize diagnostics.
//!
//! Diagnostics never influence the contents of a set: a [`ResizeObserver`] is
//! only told about resizes after the driver decided on them.

use std::fmt::{Display, Formatter};
use std::time::Duration;

use log::{debug, log_enabled, trace, Level};

/// Bucket occupancy statistics of a set
#[derive(Clone, Debug, PartialEq)]
pub struct TableStats {
    /// Number of distinct values stored
    pub items: usize,
    /// Number of buckets
    pub buckets: usize,
    /// Smallest bucket size
    pub min_bucket_size: usize,
    /// Largest bucket size
    pub max_bucket_size: usize,
    /// Average bucket size
    pub average: f64,
    /// Variance of bucket sizes
    pub variance: f64,
    /// `histogram[n]` is the number of buckets holding `n` values
    pub histogram: Vec<usize>,
}

impl TableStats {
    /// Compute statistics from the sizes of all buckets
    pub(crate) fn from_bucket_sizes(items: usize, sizes: impl Iterator<Item = usize> + Clone) -> Self {
        let mut histogram = vec![0; sizes.clone().max().map_or(1, |m| m + 1)];
        let mut buckets = 0;
        for size in sizes.clone() {
            histogram[size] += 1;
            buckets += 1;
        }

        let average = if buckets == 0 {
            0.0
        } else {
            items as f64 / buckets as f64
        };
        let variance = if buckets == 0 {
            0.0
        } else {
            sizes
                .map(|size| (size as f64 - average) * (size as f64 - average))
                .sum::<f64>()
                / buckets as f64
        };

        Self {
            items,
            buckets,
            min_bucket_size: histogram.iter().position(|&n| n > 0).unwrap_or(0),
            max_bucket_size: histogram.len() - 1,
            average,
            variance,
            histogram,
        }
    }

    /// Standard deviation of bucket sizes
    pub fn stddev(&self) -> f64 {
        self.variance.sqrt()
    }
}

impl Display for TableStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "items: {}, buckets: {}, min bucket size: {}, max bucket size: {}, \
             bucket size variance: {:.3}, bucket size stddev: {:.3}",
            self.items,
            self.buckets,
            self.min_bucket_size,
            self.max_bucket_size,
            self.variance,
            self.stddev()
        )
    }
}

/// Description of a finished resize
#[derive(Clone, Debug, PartialEq)]
pub struct ResizeEvent {
    /// Number of values moved into the new table
    pub items: usize,
    /// Bucket count before the resize
    pub old_buckets: usize,
    /// Bucket count after the resize
    pub new_buckets: usize,
    /// Time spent redistributing values
    pub duration: Duration,
}

/// Observer invoked by the aggregation driver around table resizes.
pub trait ResizeObserver {
    /// Whether the driver should compute `TableStats` for this observer.
    /// Computing them visits every bucket.
    fn wants_stats(&self) -> bool {
        false
    }

    /// Called right before a resize, with stats when `wants_stats` is true
    fn before_resize(&mut self, _stats: Option<&TableStats>) {}

    /// Called right after a resize, with stats when `wants_stats` is true
    fn after_resize(&mut self, event: &ResizeEvent, stats: Option<&TableStats>);
}

/// Observer writing resize timings and table statistics to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver {
    /// Also log bucket size histograms at trace level
    pub histogram: bool,
}

impl LogObserver {
    fn log_stats(&self, stats: &TableStats) {
        debug!("hash table stats: {}", stats);
        if self.histogram && log_enabled!(Level::Trace) {
            for (size, &count) in stats.histogram.iter().enumerate() {
                trace!(
                    "[{:3}] => {:7.3}% [{}]",
                    size,
                    (count * 100) as f64 / stats.buckets as f64,
                    count
                );
            }
        }
    }
}

impl ResizeObserver for LogObserver {
    fn wants_stats(&self) -> bool {
        log_enabled!(Level::Debug)
    }

    fn before_resize(&mut self, stats: Option<&TableStats>) {
        if let Some(stats) = stats {
            self.log_stats(stats);
        }
    }

    fn after_resize(&mut self, event: &ResizeEvent, stats: Option<&TableStats>) {
        if let Some(stats) = stats {
            self.log_stats(stats);
        }
        debug!(
            "resize: items={} [{} => {}] duration={} us",
            event.items,
            event.old_buckets,
            event.new_buckets,
            event.duration.as_micros()
        );
    }
}
