// Collector contract
//
// A collector is a stateful accumulator registered with the pipeline. The
// dispatch stage is the only actor that touches a collector between `setup`
// and `finish`, and it is single-threaded, so implementations need no
// internal synchronization on the accept path.

use anyhow::Result;
use std::path::Path;

use crate::header::ScanHeader;
use crate::record::Record;
use crate::reference::ReferenceSlice;

pub trait Collector: Send {
    /// Short name used in log and fault messages.
    fn name(&self) -> &str;

    /// One-time initialization, called in registration order before any
    /// record flows. `source_path` is the input path when the source has one.
    fn setup(&mut self, header: &ScanHeader, source_path: Option<&Path>) -> Result<()>;

    /// Whether this collector wants the contiguous run of unmapped records
    /// at the end of a coordinate-sorted stream. When no registered
    /// collector does, the reader stops as soon as that run begins.
    fn uses_no_ref_reads(&self) -> bool {
        true
    }

    /// Accept one record, with the reference slice it maps to (when a
    /// resolver is configured and the record is mapped). Called exactly
    /// once per delivered record, in source order.
    fn accept(&mut self, record: &Record, slice: Option<&ReferenceSlice>) -> Result<()>;

    /// One-time finalization, called in registration order after the stream
    /// has fully drained. Never called for a run that faulted.
    fn finish(&mut self) -> Result<()>;
}
