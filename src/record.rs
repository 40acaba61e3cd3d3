// Record model
//
// One item of the ordered input stream. Records are produced once by the
// source, are read-only afterwards, and travel through the pipeline inside
// chunks; no stage mutates a record after it has been sealed into a chunk.

/// SAM flag bits used by the collectors.
pub mod flags {
    pub const PAIRED: u16 = 0x1;
    pub const PROPER_PAIR: u16 = 0x2;
    pub const UNMAPPED: u16 = 0x4;
    pub const MATE_UNMAPPED: u16 = 0x8;
    pub const REVERSE: u16 = 0x10;
    pub const SECONDARY: u16 = 0x100;
    pub const QC_FAIL: u16 = 0x200;
    pub const DUPLICATE: u16 = 0x400;
    pub const SUPPLEMENTARY: u16 = 0x800;
}

/// One aligned (or unmapped) record of the input stream.
#[derive(Debug, Clone)]
pub struct Record {
    /// 0-based position of this record in source iteration order.
    pub ordinal: u64,
    /// Query/read name.
    pub name: String,
    /// SAM flag word.
    pub flag: u16,
    /// Index into the header dictionary, or `None` for unmapped records.
    pub reference_index: Option<usize>,
    /// 1-based leftmost mapping position (0 when unmapped).
    pub position: u64,
    /// Mapping quality (255 = unavailable).
    pub mapq: u8,
    /// Read bases (may be empty when the source stores none).
    pub sequence: Vec<u8>,
}

impl Record {
    pub fn is_unmapped(&self) -> bool {
        self.reference_index.is_none() || self.flag & flags::UNMAPPED != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmapped_by_missing_reference() {
        let rec = Record {
            ordinal: 0,
            name: "r1".to_string(),
            flag: 0,
            reference_index: None,
            position: 0,
            mapq: 0,
            sequence: Vec::new(),
        };
        assert!(rec.is_unmapped());
    }

    #[test]
    fn test_unmapped_by_flag() {
        let rec = Record {
            ordinal: 0,
            name: "r1".to_string(),
            flag: flags::UNMAPPED,
            reference_index: Some(0),
            position: 100,
            mapq: 0,
            sequence: b"ACGT".to_vec(),
        };
        assert!(rec.is_unmapped());
    }
}
