// Stream header model
//
// Mirrors the information the pipeline needs from a SAM-style header:
// the declared sort order and the ordered reference-name dictionary.

use std::fmt;

/// Declared record ordering of the input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Coordinate,
    QueryName,
    Unsorted,
    Unknown,
}

impl SortOrder {
    /// Parse the `SO:` value of an `@HD` line. Unrecognized values map to
    /// `Unknown`, matching the permissive behavior of SAM readers.
    pub fn from_tag(value: &str) -> Self {
        match value {
            "coordinate" => SortOrder::Coordinate,
            "queryname" => SortOrder::QueryName,
            "unsorted" => SortOrder::Unsorted,
            _ => SortOrder::Unknown,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SortOrder::Coordinate => "coordinate",
            SortOrder::QueryName => "queryname",
            SortOrder::Unsorted => "unsorted",
            SortOrder::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One entry of the reference dictionary: a named sequence and its length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSequence {
    pub name: String,
    pub length: u64,
}

/// Header of the record stream: sort order plus the ordered reference
/// dictionary records resolve their reference index against.
#[derive(Debug, Clone)]
pub struct ScanHeader {
    pub sort_order: SortOrder,
    pub dictionary: Vec<ReferenceSequence>,
}

impl ScanHeader {
    pub fn new(sort_order: SortOrder, dictionary: Vec<ReferenceSequence>) -> Self {
        ScanHeader {
            sort_order,
            dictionary,
        }
    }

    /// Position of `name` in the dictionary, used to resolve RNAME fields.
    pub fn reference_index(&self, name: &str) -> Option<usize> {
        self.dictionary.iter().position(|seq| seq.name == name)
    }

    /// Compare this dictionary against another ordered name/length list.
    /// Returns a human-readable description of the first difference, or
    /// `None` when the dictionaries agree.
    pub fn dictionary_mismatch(&self, other: &[ReferenceSequence]) -> Option<String> {
        if self.dictionary.len() != other.len() {
            return Some(format!(
                "dictionary sizes differ: {} vs {}",
                self.dictionary.len(),
                other.len()
            ));
        }
        for (i, (a, b)) in self.dictionary.iter().zip(other).enumerate() {
            if a.name != b.name {
                return Some(format!(
                    "sequence {} named '{}' in input but '{}' in reference",
                    i, a.name, b.name
                ));
            }
            if a.length != b.length {
                return Some(format!(
                    "sequence '{}' has length {} in input but {} in reference",
                    a.name, a.length, b.length
                ));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(name: &str, length: u64) -> ReferenceSequence {
        ReferenceSequence {
            name: name.to_string(),
            length,
        }
    }

    #[test]
    fn test_sort_order_parsing() {
        assert_eq!(SortOrder::from_tag("coordinate"), SortOrder::Coordinate);
        assert_eq!(SortOrder::from_tag("queryname"), SortOrder::QueryName);
        assert_eq!(SortOrder::from_tag("unsorted"), SortOrder::Unsorted);
        assert_eq!(SortOrder::from_tag("banana"), SortOrder::Unknown);
    }

    #[test]
    fn test_reference_index() {
        let header = ScanHeader::new(
            SortOrder::Coordinate,
            vec![seq("chr1", 1000), seq("chr2", 500)],
        );
        assert_eq!(header.reference_index("chr1"), Some(0));
        assert_eq!(header.reference_index("chr2"), Some(1));
        assert_eq!(header.reference_index("chrM"), None);
    }

    #[test]
    fn test_dictionary_match() {
        let header = ScanHeader::new(
            SortOrder::Coordinate,
            vec![seq("chr1", 1000), seq("chr2", 500)],
        );
        assert!(header
            .dictionary_mismatch(&[seq("chr1", 1000), seq("chr2", 500)])
            .is_none());
    }

    #[test]
    fn test_dictionary_mismatch_reports_first_difference() {
        let header = ScanHeader::new(SortOrder::Coordinate, vec![seq("chr1", 1000)]);
        let msg = header
            .dictionary_mismatch(&[seq("chr2", 1000)])
            .expect("mismatch expected");
        assert!(msg.contains("chr1"));
        assert!(msg.contains("chr2"));

        let msg = header
            .dictionary_mismatch(&[seq("chr1", 999)])
            .expect("mismatch expected");
        assert!(msg.contains("999"));
    }

    #[test]
    fn test_dictionary_mismatch_size() {
        let header = ScanHeader::new(SortOrder::Coordinate, vec![seq("chr1", 1000)]);
        assert!(header.dictionary_mismatch(&[]).is_some());
    }
}
