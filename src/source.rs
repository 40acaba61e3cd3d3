// Record source
//
// The ordered, resumable record iterator the pipeline reads from, plus the
// shipped SAM-text implementation with:
// - Automatic gzip/BGZF detection by file extension and magic bytes
// - Parallel BGZF decompression (if BGZF format detected)
// - Header parsing for sort order and the reference-name dictionary
//
// BGZF (used in bioinformatics) enables parallel decompression via
// independent compressed blocks. Standard gzip uses a single-threaded
// fallback.

use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use noodles_bgzf as bgzf;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::header::{ReferenceSequence, ScanHeader, SortOrder};
use crate::record::{Record, flags};

const BUFFER_SIZE: usize = 4 * 1024 * 1024; // 4MB buffer

/// Detect if a gzipped file is BGZF format by checking for the BGZF-specific header
fn is_bgzf_format(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    let mut header = [0u8; 18]; // BGZF header is at least 18 bytes

    if file.read(&mut header).unwrap_or(0) < 18 {
        return Ok(false); // Not enough bytes for a BGZF header
    }

    // Check for gzip magic bytes
    if header[0] != 0x1f || header[1] != 0x8b {
        return Ok(false);
    }

    // BGZF uses an extra field (FEXTRA flag = 0x04)
    if header[3] & 0x04 == 0 {
        return Ok(false);
    }

    // BGZF has a specific extra field with the 'BC' subfield ID
    if header[12] == b'B' && header[13] == b'C' {
        return Ok(true);
    }

    Ok(false)
}

/// Open a text file for reading, transparently decoding gzip/BGZF by
/// extension and magic bytes.
pub fn open_decoded_reader(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    let is_gz = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz") || ext.eq_ignore_ascii_case("bgz"));
    let reader: Box<dyn BufRead + Send> = if is_gz {
        if is_bgzf_format(path)? {
            log::debug!("Detected BGZF format, using parallel decompression");
            let file = File::open(path)?;
            let bgzf_reader = bgzf::MultithreadedReader::new(file);
            Box::new(BufReader::with_capacity(BUFFER_SIZE, bgzf_reader))
        } else {
            log::debug!("Detected standard gzip format, using single-threaded decompression");
            let file = File::open(path)?;
            Box::new(BufReader::with_capacity(BUFFER_SIZE, GzDecoder::new(file)))
        }
    } else {
        let file = File::open(path)?;
        Box::new(BufReader::with_capacity(BUFFER_SIZE, file))
    };
    Ok(reader)
}

/// Ordered record iterator plus the header describing it.
///
/// Owned exclusively by the reader loop; `next_record` is pulled one record
/// at a time, in source order.
pub trait RecordSource {
    fn header(&self) -> &ScanHeader;

    /// Path of the underlying resource, when there is one (handed to
    /// collectors at setup).
    fn path(&self) -> Option<&Path>;

    /// Next record in source order, or `None` at end of stream.
    fn next_record(&mut self) -> Result<Option<Record>>;
}

/// SAM-text record source (plain, gzip or BGZF compressed).
pub struct SamReader {
    path: PathBuf,
    header: ScanHeader,
    reader: Box<dyn BufRead + Send>,
    /// First alignment line, consumed while scanning past the header.
    pending_line: Option<String>,
    line_number: u64,
    next_ordinal: u64,
}

impl SamReader {
    /// Open a SAM file and parse its header section.
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = open_decoded_reader(path)
            .with_context(|| format!("cannot open input {}", path.display()))?;

        let mut sort_order = SortOrder::Unknown;
        let mut dictionary = Vec::new();
        let mut pending_line = None;
        let mut line_number = 0u64;

        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            line_number += 1;
            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix('@') {
                Self::parse_header_line(rest, &mut sort_order, &mut dictionary)
                    .with_context(|| format!("{}:{}", path.display(), line_number))?;
            } else {
                pending_line = Some(trimmed.to_string());
                break;
            }
        }

        log::debug!(
            "Opened {}: sort order '{}', {} reference sequences",
            path.display(),
            sort_order,
            dictionary.len()
        );

        Ok(SamReader {
            path: path.to_path_buf(),
            header: ScanHeader::new(sort_order, dictionary),
            reader,
            pending_line,
            line_number,
            next_ordinal: 0,
        })
    }

    fn parse_header_line(
        rest: &str,
        sort_order: &mut SortOrder,
        dictionary: &mut Vec<ReferenceSequence>,
    ) -> Result<()> {
        let mut fields = rest.split('\t');
        match fields.next() {
            Some("HD") => {
                for field in fields {
                    if let Some(value) = field.strip_prefix("SO:") {
                        *sort_order = SortOrder::from_tag(value);
                    }
                }
            }
            Some("SQ") => {
                let mut name = None;
                let mut length = None;
                for field in fields {
                    if let Some(value) = field.strip_prefix("SN:") {
                        name = Some(value.to_string());
                    } else if let Some(value) = field.strip_prefix("LN:") {
                        length = Some(value.parse::<u64>().context("bad LN field")?);
                    }
                }
                match (name, length) {
                    (Some(name), Some(length)) => {
                        dictionary.push(ReferenceSequence { name, length })
                    }
                    _ => bail!("@SQ line missing SN or LN"),
                }
            }
            // @RG, @PG, @CO and friends carry nothing the scan needs
            _ => {}
        }
        Ok(())
    }

    fn parse_record(&self, line: &str, ordinal: u64) -> Result<Record> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 11 {
            bail!(
                "{}:{}: alignment line has {} fields, expected at least 11",
                self.path.display(),
                self.line_number,
                fields.len()
            );
        }

        let name = fields[0].to_string();
        let flag: u16 = fields[1]
            .parse()
            .with_context(|| format!("{}:{}: bad FLAG", self.path.display(), self.line_number))?;
        let rname = fields[2];
        let position: u64 = fields[3]
            .parse()
            .with_context(|| format!("{}:{}: bad POS", self.path.display(), self.line_number))?;
        let mapq: u8 = fields[4]
            .parse()
            .with_context(|| format!("{}:{}: bad MAPQ", self.path.display(), self.line_number))?;

        let reference_index = if rname == "*" || flag & flags::UNMAPPED != 0 {
            None
        } else {
            match self.header.reference_index(rname) {
                Some(index) => Some(index),
                None => bail!(
                    "{}:{}: reference '{}' not in header dictionary",
                    self.path.display(),
                    self.line_number,
                    rname
                ),
            }
        };

        let sequence = if fields[9] == "*" {
            Vec::new()
        } else {
            fields[9].as_bytes().to_vec()
        };

        Ok(Record {
            ordinal,
            name,
            flag,
            reference_index,
            position,
            mapq,
            sequence,
        })
    }
}

impl RecordSource for SamReader {
    fn header(&self) -> &ScanHeader {
        &self.header
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        let line = match self.pending_line.take() {
            Some(line) => line,
            None => {
                let mut line = String::new();
                loop {
                    line.clear();
                    if self.reader.read_line(&mut line)? == 0 {
                        return Ok(None);
                    }
                    self.line_number += 1;
                    if !line.trim_end().is_empty() {
                        break;
                    }
                }
                line.trim_end().to_string()
            }
        };

        let record = self.parse_record(&line, self.next_ordinal)?;
        self.next_ordinal += 1;
        Ok(Some(record))
    }
}
