// Reference GC-content collector
//
// For each mapped record with a reference slice, measures the GC fraction
// of the reference window under the record and accumulates a histogram in
// 5%-wide bins. Declares uses_no_ref_reads = false: it has no use for the
// unmapped tail, which lets the reader stop early when it is the only
// registered collector.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::collect::Collector;
use crate::header::ScanHeader;
use crate::record::Record;
use crate::reference::ReferenceSlice;

const BIN_WIDTH: usize = 5;
const BIN_COUNT: usize = 100 / BIN_WIDTH + 1; // 0..=100 inclusive

pub struct GcContentCollector {
    output: Option<PathBuf>,
    bins: [u64; BIN_COUNT],
    windows: u64,
    skipped: u64,
    gc_sum: f64,
}

/// GC fraction of `bases`, or `None` when the window is empty.
fn gc_fraction(bases: &[u8]) -> Option<f64> {
    if bases.is_empty() {
        return None;
    }
    let gc = bases
        .iter()
        .filter(|b| matches!(b.to_ascii_uppercase(), b'G' | b'C'))
        .count();
    Some(gc as f64 / bases.len() as f64)
}

impl GcContentCollector {
    /// Writes to `output` at finish, or stdout when `None`.
    pub fn new(output: Option<PathBuf>) -> Self {
        GcContentCollector {
            output,
            bins: [0; BIN_COUNT],
            windows: 0,
            skipped: 0,
            gc_sum: 0.0,
        }
    }

    pub fn windows(&self) -> u64 {
        self.windows
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn bins(&self) -> &[u64] {
        &self.bins
    }

    pub fn mean_gc(&self) -> Option<f64> {
        if self.windows == 0 {
            None
        } else {
            Some(self.gc_sum / self.windows as f64)
        }
    }

    pub fn report(&self) -> String {
        let mut out = String::new();
        out.push_str("gc_pct\twindows\n");
        for (i, count) in self.bins.iter().enumerate() {
            out.push_str(&format!("{}\t{}\n", i * BIN_WIDTH, count));
        }
        match self.mean_gc() {
            Some(mean) => out.push_str(&format!("# mean_gc\t{:.4}\n", mean)),
            None => out.push_str("# mean_gc\tN/A\n"),
        }
        out.push_str(&format!("# windows\t{}\n", self.windows));
        out.push_str(&format!("# skipped\t{}\n", self.skipped));
        out
    }
}

impl Collector for GcContentCollector {
    fn name(&self) -> &str {
        "gc-content"
    }

    fn setup(&mut self, header: &ScanHeader, _source_path: Option<&Path>) -> Result<()> {
        log::debug!(
            "gc-content: {} reference sequences in input dictionary",
            header.dictionary.len()
        );
        Ok(())
    }

    fn uses_no_ref_reads(&self) -> bool {
        false
    }

    fn accept(&mut self, record: &Record, slice: Option<&ReferenceSlice>) -> Result<()> {
        let Some(slice) = slice else {
            self.skipped += 1;
            return Ok(());
        };
        if record.position == 0 || record.sequence.is_empty() {
            self.skipped += 1;
            return Ok(());
        }

        // Reference window under the record, clamped to the sequence end
        let start = (record.position - 1) as usize;
        let end = (start + record.sequence.len()).min(slice.bases.len());
        if start >= end {
            self.skipped += 1;
            return Ok(());
        }

        match gc_fraction(&slice.bases[start..end]) {
            Some(fraction) => {
                let bin = ((fraction * 100.0 / BIN_WIDTH as f64).round() as usize)
                    .min(BIN_COUNT - 1);
                self.bins[bin] += 1;
                self.windows += 1;
                self.gc_sum += fraction;
            }
            None => self.skipped += 1,
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        log::info!(
            "gc-content: {} windows measured, {} records skipped, mean GC {}",
            self.windows,
            self.skipped,
            self.mean_gc()
                .map_or_else(|| "N/A".to_string(), |m| format!("{m:.4}"))
        );
        let report = self.report();
        match &self.output {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("cannot create {}", path.display()))?;
                let mut writer = BufWriter::new(file);
                writer.write_all(report.as_bytes())?;
                writer.flush()?;
            }
            None => {
                let stdout = std::io::stdout();
                stdout.lock().write_all(report.as_bytes())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(bases: &[u8]) -> ReferenceSlice {
        ReferenceSlice {
            index: 0,
            name: "chr1".to_string(),
            bases: bases.to_vec(),
        }
    }

    fn record(position: u64, sequence: &[u8]) -> Record {
        Record {
            ordinal: 0,
            name: "r".to_string(),
            flag: 0,
            reference_index: Some(0),
            position,
            mapq: 60,
            sequence: sequence.to_vec(),
        }
    }

    #[test]
    fn test_gc_fraction() {
        assert_eq!(gc_fraction(b"GGCC"), Some(1.0));
        assert_eq!(gc_fraction(b"AATT"), Some(0.0));
        assert_eq!(gc_fraction(b"ACGT"), Some(0.5));
        assert_eq!(gc_fraction(b"acgt"), Some(0.5));
        assert_eq!(gc_fraction(b""), None);
    }

    #[test]
    fn test_window_binning() {
        let reference = slice(b"AAAAGGCCAAAA");
        let mut collector = GcContentCollector::new(None);
        // Window covers positions 5-8 (1-based): "GGCC" -> 100% GC
        collector
            .accept(&record(5, b"NNNN"), Some(&reference))
            .unwrap();
        assert_eq!(collector.windows(), 1);
        assert_eq!(collector.bins()[BIN_COUNT - 1], 1);
        assert_eq!(collector.mean_gc(), Some(1.0));
    }

    #[test]
    fn test_window_clamped_at_sequence_end() {
        let reference = slice(b"ACGT");
        let mut collector = GcContentCollector::new(None);
        // Record hangs off the end; window clamps to "GT" -> 50% GC
        collector
            .accept(&record(3, b"NNNNNN"), Some(&reference))
            .unwrap();
        assert_eq!(collector.windows(), 1);
        assert_eq!(collector.bins()[10], 1);
    }

    #[test]
    fn test_no_slice_skipped() {
        let mut collector = GcContentCollector::new(None);
        collector.accept(&record(1, b"ACGT"), None).unwrap();
        assert_eq!(collector.windows(), 0);
        assert_eq!(collector.skipped(), 1);
    }

    #[test]
    fn test_window_past_sequence_skipped() {
        let reference = slice(b"ACGT");
        let mut collector = GcContentCollector::new(None);
        collector
            .accept(&record(100, b"ACGT"), Some(&reference))
            .unwrap();
        assert_eq!(collector.windows(), 0);
        assert_eq!(collector.skipped(), 1);
    }

    #[test]
    fn test_skips_unmapped_tail() {
        let collector = GcContentCollector::new(None);
        assert!(!collector.uses_no_ref_reads());
    }
}
