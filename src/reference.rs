// Reference resolver
//
// Random-access-by-index lookup of reference sequence data, keyed by the
// record's reference index. The pipeline calls the resolver from exactly
// one worker, so implementations may be freely stateful and need no
// internal locking.
//
// `FastaResolver` is the shipped walker-style implementation: because the
// record stream is coordinate sorted, lookups arrive with non-decreasing
// indexes, so the FASTA file is streamed strictly forward with a single
// cached sequence. The dictionary is built by a cheap pre-scan so it can be
// validated against the input header before any record flows.

use anyhow::{Result, bail};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::header::ReferenceSequence;
use crate::source::open_decoded_reader;

/// Immutable bases of one reference sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSlice {
    /// Index of this sequence in the reference dictionary.
    pub index: usize,
    pub name: String,
    pub bases: Vec<u8>,
}

/// Keyed lookup over a secondary reference resource.
///
/// Invoked only by the annotation worker; implementations may assume
/// non-reentrant, single-threaded access.
pub trait ReferenceResolver: Send {
    /// Ordered name/length dictionary of the resource.
    fn dictionary(&self) -> &[ReferenceSequence];

    /// Fetch the sequence for `reference_index`, or `None` when the index
    /// is not covered by the resource.
    fn lookup(&mut self, reference_index: usize) -> Result<Option<Arc<ReferenceSlice>>>;
}

/// Forward-only FASTA resolver with a one-sequence cache.
pub struct FastaResolver {
    path: PathBuf,
    dictionary: Vec<ReferenceSequence>,
    reader: Box<dyn BufRead + Send>,
    /// Header line of the next sequence, already consumed from the reader.
    pending_name: Option<String>,
    /// Index the next sequence read from the stream will receive.
    next_index: usize,
    cached: Option<Arc<ReferenceSlice>>,
}

fn header_name(line: &str) -> String {
    // ">chr1 description" -> "chr1"
    line[1..]
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_string()
}

impl FastaResolver {
    /// Open a FASTA file (plain, gzip or BGZF). Scans the file once to
    /// build the name/length dictionary, then re-opens it for streaming.
    pub fn open(path: &Path) -> Result<Self> {
        let dictionary = Self::scan_dictionary(path)?;
        if dictionary.is_empty() {
            bail!("reference {} contains no sequences", path.display());
        }
        log::debug!(
            "Reference {}: {} sequences in dictionary",
            path.display(),
            dictionary.len()
        );

        let reader = open_decoded_reader(path)?;
        Ok(FastaResolver {
            path: path.to_path_buf(),
            dictionary,
            reader,
            pending_name: None,
            next_index: 0,
            cached: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn scan_dictionary(path: &Path) -> Result<Vec<ReferenceSequence>> {
        let reader = open_decoded_reader(path)?;
        let mut dictionary = Vec::new();
        let mut current: Option<(String, u64)> = None;

        for line in reader.lines() {
            let line = line?;
            if let Some(rest) = line.strip_prefix('>') {
                if let Some((name, length)) = current.take() {
                    dictionary.push(ReferenceSequence { name, length });
                }
                let name = header_name(&format!(">{rest}"));
                if name.is_empty() {
                    bail!("unnamed sequence in reference {}", path.display());
                }
                current = Some((name, 0));
            } else if let Some((_, length)) = current.as_mut() {
                *length += line.trim_end().len() as u64;
            } else if !line.trim().is_empty() {
                bail!(
                    "reference {} has sequence data before the first header",
                    path.display()
                );
            }
        }
        if let Some((name, length)) = current {
            dictionary.push(ReferenceSequence { name, length });
        }
        Ok(dictionary)
    }

    /// Read the next sequence from the stream, or `None` at EOF.
    fn read_next_sequence(&mut self) -> Result<Option<(String, Vec<u8>)>> {
        // Find the header line if the previous read did not leave one behind
        let name = match self.pending_name.take() {
            Some(name) => name,
            None => {
                let mut found = None;
                let mut line = String::new();
                loop {
                    line.clear();
                    if self.reader.read_line(&mut line)? == 0 {
                        break;
                    }
                    if line.starts_with('>') {
                        found = Some(header_name(line.trim_end()));
                        break;
                    }
                }
                match found {
                    Some(name) => name,
                    None => return Ok(None),
                }
            }
        };

        let mut bases = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                break;
            }
            let trimmed = line.trim_end();
            if trimmed.starts_with('>') {
                self.pending_name = Some(header_name(trimmed));
                break;
            }
            bases.extend_from_slice(trimmed.as_bytes());
        }
        Ok(Some((name, bases)))
    }
}

impl ReferenceResolver for FastaResolver {
    fn dictionary(&self) -> &[ReferenceSequence] {
        &self.dictionary
    }

    fn lookup(&mut self, reference_index: usize) -> Result<Option<Arc<ReferenceSlice>>> {
        if let Some(cached) = &self.cached {
            if cached.index == reference_index {
                return Ok(Some(Arc::clone(cached)));
            }
            if reference_index < cached.index {
                // Coordinate-sorted input never looks backwards
                bail!(
                    "reference lookup went backwards: {} after {} in {}",
                    reference_index,
                    cached.index,
                    self.path.display()
                );
            }
        }
        if reference_index >= self.dictionary.len() {
            return Ok(None);
        }

        while self.next_index <= reference_index {
            let index = self.next_index;
            match self.read_next_sequence()? {
                Some((name, bases)) => {
                    if name != self.dictionary[index].name {
                        log::warn!(
                            "Reference sequence {} named '{}' on re-read but '{}' in dictionary",
                            index,
                            name,
                            self.dictionary[index].name
                        );
                    }
                    self.next_index += 1;
                    self.cached = Some(Arc::new(ReferenceSlice { index, name, bases }));
                }
                None => return Ok(None),
            }
        }
        Ok(self.cached.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fasta(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".fa")
            .tempfile()
            .expect("create temp fasta");
        file.write_all(content.as_bytes()).expect("write fasta");
        file.flush().expect("flush fasta");
        file
    }

    const FASTA: &str = ">chr1 test sequence\nACGTACGT\nACGT\n>chr2\nGGGGCCCC\n";

    #[test]
    fn test_dictionary_from_prescan() {
        let file = write_fasta(FASTA);
        let resolver = FastaResolver::open(file.path()).unwrap();
        let dict = resolver.dictionary();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict[0].name, "chr1");
        assert_eq!(dict[0].length, 12);
        assert_eq!(dict[1].name, "chr2");
        assert_eq!(dict[1].length, 8);
    }

    #[test]
    fn test_lookup_in_order() {
        let file = write_fasta(FASTA);
        let mut resolver = FastaResolver::open(file.path()).unwrap();

        let slice = resolver.lookup(0).unwrap().expect("chr1 present");
        assert_eq!(slice.name, "chr1");
        assert_eq!(slice.bases, b"ACGTACGTACGT");

        // Repeated lookup hits the cache
        let again = resolver.lookup(0).unwrap().expect("chr1 cached");
        assert!(Arc::ptr_eq(&slice, &again));

        let slice = resolver.lookup(1).unwrap().expect("chr2 present");
        assert_eq!(slice.name, "chr2");
        assert_eq!(slice.bases, b"GGGGCCCC");
    }

    #[test]
    fn test_lookup_skips_ahead() {
        let file = write_fasta(FASTA);
        let mut resolver = FastaResolver::open(file.path()).unwrap();
        let slice = resolver.lookup(1).unwrap().expect("chr2 present");
        assert_eq!(slice.name, "chr2");
    }

    #[test]
    fn test_backwards_lookup_fails() {
        let file = write_fasta(FASTA);
        let mut resolver = FastaResolver::open(file.path()).unwrap();
        resolver.lookup(1).unwrap();
        assert!(resolver.lookup(0).is_err());
    }

    #[test]
    fn test_lookup_past_dictionary_is_none() {
        let file = write_fasta(FASTA);
        let mut resolver = FastaResolver::open(file.path()).unwrap();
        assert!(resolver.lookup(5).unwrap().is_none());
    }

    #[test]
    fn test_empty_reference_rejected() {
        let file = write_fasta("");
        assert!(FastaResolver::open(file.path()).is_err());
    }
}
