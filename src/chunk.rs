// Chunk types
//
// Chunks are the unit of cross-stage transfer: the reader seals up to
// MAX_CHUNK records into a chunk and hands it off; the annotation stage
// consumes it exactly once and replaces it with an annotated chunk; the
// dispatch stage consumes that exactly once and drops it.

use std::sync::Arc;

use crate::record::Record;
use crate::reference::ReferenceSlice;

/// Default number of records per chunk.
pub const MAX_CHUNK: usize = 1000;

/// Default bounded-handoff capacity, in chunks.
pub const QUEUE_CAPACITY: usize = 5;

/// Ordered batch of records, sealed before handoff and never mutated after.
#[derive(Debug, Default)]
pub struct Chunk {
    pub records: Vec<Record>,
}

impl Chunk {
    pub fn with_capacity(capacity: usize) -> Self {
        Chunk {
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parallel sequence of (record, reference slice) pairs, in chunk order.
/// The slice is `None` when no resolver is configured, the record is
/// unmapped, or the lookup yielded nothing.
#[derive(Debug, Default)]
pub struct AnnotatedChunk {
    pub pairs: Vec<(Record, Option<Arc<ReferenceSlice>>)>,
}

impl AnnotatedChunk {
    pub fn with_capacity(capacity: usize) -> Self {
        AnnotatedChunk {
            pairs: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_capacity() {
        let chunk = Chunk::with_capacity(MAX_CHUNK);
        assert!(chunk.is_empty());
        assert_eq!(chunk.records.capacity(), MAX_CHUNK);
    }
}
