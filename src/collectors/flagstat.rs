// Flag-field tally collector
//
// Counts records by flag category over the whole stream, including the
// unmapped tail, and writes a flagstat-style text report at finish.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::collect::Collector;
use crate::header::ScanHeader;
use crate::record::{Record, flags};
use crate::reference::ReferenceSlice;

#[derive(Debug, Default)]
pub struct FlagstatCounts {
    pub total: u64,
    pub mapped: u64,
    pub unmapped: u64,
    pub paired: u64,
    pub proper_pair: u64,
    pub mate_unmapped: u64,
    pub secondary: u64,
    pub supplementary: u64,
    pub duplicate: u64,
    pub mapq_at_least_30: u64,
}

pub struct FlagstatCollector {
    output: Option<PathBuf>,
    counts: FlagstatCounts,
}

impl FlagstatCollector {
    /// Writes to `output` at finish, or stdout when `None`.
    pub fn new(output: Option<PathBuf>) -> Self {
        FlagstatCollector {
            output,
            counts: FlagstatCounts::default(),
        }
    }

    pub fn counts(&self) -> &FlagstatCounts {
        &self.counts
    }

    pub fn report(&self) -> String {
        let c = &self.counts;
        let pct = |n: u64| {
            if c.total == 0 {
                "N/A".to_string()
            } else {
                format!("{:.2}%", 100.0 * n as f64 / c.total as f64)
            }
        };
        let mut out = String::new();
        out.push_str(&format!("{} total records\n", c.total));
        out.push_str(&format!("{} secondary\n", c.secondary));
        out.push_str(&format!("{} supplementary\n", c.supplementary));
        out.push_str(&format!("{} duplicates\n", c.duplicate));
        out.push_str(&format!("{} mapped ({})\n", c.mapped, pct(c.mapped)));
        out.push_str(&format!("{} unmapped ({})\n", c.unmapped, pct(c.unmapped)));
        out.push_str(&format!("{} paired\n", c.paired));
        out.push_str(&format!(
            "{} properly paired ({})\n",
            c.proper_pair,
            pct(c.proper_pair)
        ));
        out.push_str(&format!("{} with mate unmapped\n", c.mate_unmapped));
        out.push_str(&format!("{} with MAPQ>=30\n", c.mapq_at_least_30));
        out
    }
}

impl Collector for FlagstatCollector {
    fn name(&self) -> &str {
        "flagstat"
    }

    fn setup(&mut self, _header: &ScanHeader, source_path: Option<&Path>) -> Result<()> {
        if let Some(path) = source_path {
            log::debug!("flagstat: scanning {}", path.display());
        }
        Ok(())
    }

    // Default uses_no_ref_reads() = true: the unmapped tail counts too.

    fn accept(&mut self, record: &Record, _slice: Option<&ReferenceSlice>) -> Result<()> {
        let c = &mut self.counts;
        c.total += 1;
        if record.flag & flags::SECONDARY != 0 {
            c.secondary += 1;
        }
        if record.flag & flags::SUPPLEMENTARY != 0 {
            c.supplementary += 1;
        }
        if record.flag & flags::DUPLICATE != 0 {
            c.duplicate += 1;
        }
        if record.is_unmapped() {
            c.unmapped += 1;
        } else {
            c.mapped += 1;
            if record.mapq != 255 && record.mapq >= 30 {
                c.mapq_at_least_30 += 1;
            }
        }
        if record.flag & flags::PAIRED != 0 {
            c.paired += 1;
            if record.flag & flags::PROPER_PAIR != 0 {
                c.proper_pair += 1;
            }
            if record.flag & flags::MATE_UNMAPPED != 0 {
                c.mate_unmapped += 1;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        log::info!(
            "flagstat: {} records ({} mapped, {} unmapped)",
            self.counts.total,
            self.counts.mapped,
            self.counts.unmapped
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

    fn record(flag: u16, reference_index: Option<usize>, mapq: u8) -> Record {
        Record {
            ordinal: 0,
            name: "r".to_string(),
            flag,
            reference_index,
            position: 1,
            mapq,
            sequence: Vec::new(),
        }
    }

    #[test]
    fn test_basic_counts() {
        let mut collector = FlagstatCollector::new(None);
        collector
            .accept(&record(flags::PAIRED | flags::PROPER_PAIR, Some(0), 60), None)
            .unwrap();
        collector.accept(&record(0, Some(0), 10), None).unwrap();
        collector
            .accept(&record(flags::UNMAPPED, None, 0), None)
            .unwrap();
        collector
            .accept(&record(flags::DUPLICATE | flags::SECONDARY, Some(0), 40), None)
            .unwrap();

        let c = collector.counts();
        assert_eq!(c.total, 4);
        assert_eq!(c.mapped, 3);
        assert_eq!(c.unmapped, 1);
        assert_eq!(c.paired, 1);
        assert_eq!(c.proper_pair, 1);
        assert_eq!(c.duplicate, 1);
        assert_eq!(c.secondary, 1);
        assert_eq!(c.mapq_at_least_30, 2);
    }

    #[test]
    fn test_mapq_255_not_counted() {
        let mut collector = FlagstatCollector::new(None);
        collector.accept(&record(0, Some(0), 255), None).unwrap();
        assert_eq!(collector.counts().mapq_at_least_30, 0);
    }

    #[test]
    fn test_report_mentions_totals() {
        let mut collector = FlagstatCollector::new(None);
        collector.accept(&record(0, Some(0), 60), None).unwrap();
        let report = collector.report();
        assert!(report.contains("1 total records"));
        assert!(report.contains("1 mapped (100.00%)"));
    }

    #[test]
    fn test_finish_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.flagstat.txt");
        let mut collector = FlagstatCollector::new(Some(path.clone()));
        collector.accept(&record(0, Some(0), 60), None).unwrap();
        collector.finish().unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("1 total records"));
    }

    #[test]
    fn test_wants_unmapped_tail() {
        let collector = FlagstatCollector::new(None);
        assert!(collector.uses_no_ref_reads());
    }
}
