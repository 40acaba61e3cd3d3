// Progress reporting for the reader loop.

use std::time::Instant;

use crate::record::Record;

/// Logs a progress line every `interval` records.
pub struct ProgressTracker {
    interval: u64,
    count: u64,
    start: Instant,
}

impl ProgressTracker {
    pub fn new(interval: u64) -> Self {
        ProgressTracker {
            interval: interval.max(1),
            count: 0,
            start: Instant::now(),
        }
    }

    /// Count one record; logs position and throughput at each interval.
    pub fn record(&mut self, record: &Record) {
        self.count += 1;
        if self.count % self.interval == 0 {
            let elapsed = self.start.elapsed().as_secs_f64();
            let rate = self.count as f64 / elapsed.max(f64::EPSILON);
            log::info!(
                "Processed {} records ({:.0} records/s), last at reference index {:?} position {}",
                self.count,
                rate,
                record.reference_index,
                record.position
            );
        }
    }

    /// Total records seen so far.
    pub fn count(&self) -> u64 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ordinal: u64) -> Record {
        Record {
            ordinal,
            name: format!("r{ordinal}"),
            flag: 0,
            reference_index: Some(0),
            position: ordinal + 1,
            mapq: 60,
            sequence: Vec::new(),
        }
    }

    #[test]
    fn test_count_tracks_records() {
        let mut progress = ProgressTracker::new(10);
        for i in 0..25 {
            progress.record(&record(i));
        }
        assert_eq!(progress.count(), 25);
    }

    #[test]
    fn test_zero_interval_clamped() {
        let mut progress = ProgressTracker::new(0);
        progress.record(&record(0));
        assert_eq!(progress.count(), 1);
    }
}
