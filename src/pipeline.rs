// Scan pipeline orchestration
//
// Three actors run concurrently: the reader loop on the caller's thread,
// one annotation worker, and one dispatch worker, connected by bounded
// FIFO channels. Each stage is a single dedicated thread, never a pool, so
// the global order of accept calls equals source iteration order without
// any sequence numbers; the bounded channels cap the number of in-flight
// chunks past each handoff.
//
// Shutdown is drain-to-completion: the reader propagates an End sentinel,
// the annotation worker forwards it and terminates, the dispatch worker
// terminates on it, and only then does any collector see finish(). The
// annotation worker is joined before the dispatch result is taken because
// it still produces work for dispatch. A stage that dies early drops its
// channel ends, which unblocks its neighbors instead of hanging the drain.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::thread;

use crate::chunk::{AnnotatedChunk, Chunk, MAX_CHUNK, QUEUE_CAPACITY};
use crate::collect::Collector;
use crate::error::ScanError;
use crate::header::SortOrder;
use crate::progress::ProgressTracker;
use crate::reference::ReferenceResolver;
use crate::source::RecordSource;

/// Tuning knobs of one scan run.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Treat the input as coordinate sorted even when the header says
    /// otherwise (warn instead of failing).
    pub assume_sorted: bool,
    /// Stop after this many records; 0 means unbounded.
    pub stop_after: u64,
    /// Records per chunk.
    pub chunk_size: usize,
    /// Chunks each handoff may hold.
    pub queue_capacity: usize,
    /// Records between progress log lines.
    pub progress_interval: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            assume_sorted: true,
            stop_after: 0,
            chunk_size: MAX_CHUNK,
            queue_capacity: QUEUE_CAPACITY,
            progress_interval: 1_000_000,
        }
    }
}

/// Cross-stage message: a sealed chunk, or the end-of-stream sentinel.
enum StageMsg<T> {
    Chunk(T),
    End,
}

/// Run the scan: drive `source` once from start to finish (or early stop),
/// annotate records via `resolver`, and feed every registered collector in
/// registration order. Returns the collectors after their finish step so
/// the caller can extract results.
pub fn run(
    mut source: Box<dyn RecordSource>,
    resolver: Option<Box<dyn ReferenceResolver>>,
    config: &ScanConfig,
    mut collectors: Vec<Box<dyn Collector>>,
) -> Result<Vec<Box<dyn Collector>>, ScanError> {
    if config.chunk_size == 0 {
        return Err(ScanError::Configuration("chunk size must be >= 1".into()));
    }
    if config.queue_capacity == 0 {
        return Err(ScanError::Configuration(
            "queue capacity must be >= 1".into(),
        ));
    }

    // Validate the reference dictionary against the input's, when the
    // input declares one. Must happen before any collector setup.
    if let Some(resolver) = &resolver {
        let header = source.header();
        if !header.dictionary.is_empty() {
            if let Some(mismatch) = header.dictionary_mismatch(resolver.dictionary()) {
                return Err(ScanError::Configuration(format!(
                    "reference dictionary does not match input: {mismatch}"
                )));
            }
        }
    }

    // Check the declared sort order
    let sort_order = source.header().sort_order;
    if sort_order != SortOrder::Coordinate {
        if config.assume_sorted {
            log::warn!(
                "Input reports sort order '{sort_order}', assuming it's coordinate sorted anyway"
            );
        } else {
            return Err(ScanError::Ordering(format!(
                "input should be coordinate sorted but the header says '{sort_order}'"
            )));
        }
    }

    // One-time collector setup, in registration order, before any record flows
    let mut any_no_ref_reads = false;
    let (header, source_path) = (source.header().clone(), source.path().map(|p| p.to_path_buf()));
    for collector in collectors.iter_mut() {
        if let Err(e) = collector.setup(&header, source_path.as_deref()) {
            return Err(ScanError::WorkerFault {
                stage: "setup",
                message: format!("collector '{}' failed: {e:#}", collector.name()),
            });
        }
        any_no_ref_reads = any_no_ref_reads || collector.uses_no_ref_reads();
    }

    let (annotate_tx, annotate_rx) = bounded::<StageMsg<Chunk>>(config.queue_capacity);
    let (dispatch_tx, dispatch_rx) = bounded::<StageMsg<AnnotatedChunk>>(config.queue_capacity);

    let annotation_handle = thread::Builder::new()
        .name("annotation".to_string())
        .spawn(move || annotation_worker(resolver, annotate_rx, dispatch_tx))?;
    let dispatch_handle = thread::Builder::new()
        .name("dispatch".to_string())
        .spawn(move || dispatch_worker(collectors, dispatch_rx))?;

    let reader_result = read_loop(source.as_mut(), &annotate_tx, config, any_no_ref_reads);
    // Sentinel may fail to send if a worker already died; the join below
    // surfaces the underlying fault in that case.
    let _ = annotate_tx.send(StageMsg::End);
    drop(annotate_tx);

    // The annotation worker still produces work for dispatch, so it must be
    // awaited to completion first. No timeouts: drain however long it takes.
    let annotation_result = match annotation_handle.join() {
        Ok(result) => result,
        Err(_) => Err(ScanError::WorkerFault {
            stage: "annotation",
            message: "worker thread panicked".to_string(),
        }),
    };
    let dispatch_result = match dispatch_handle.join() {
        Ok(result) => result,
        Err(_) => Err(ScanError::WorkerFault {
            stage: "dispatch",
            message: "worker thread panicked".to_string(),
        }),
    };

    let records_read = reader_result?;
    annotation_result?;
    let mut collectors = dispatch_result?;

    log::debug!("Stream drained after {records_read} records, finishing collectors");
    for collector in collectors.iter_mut() {
        if let Err(e) = collector.finish() {
            return Err(ScanError::WorkerFault {
                stage: "finish",
                message: format!("collector '{}' failed: {e:#}", collector.name()),
            });
        }
    }
    Ok(collectors)
}

/// Reader loop: builds chunks of up to `chunk_size` records and submits
/// them to the annotation handoff. Runs on the caller's thread.
fn read_loop(
    source: &mut dyn RecordSource,
    tx: &Sender<StageMsg<Chunk>>,
    config: &ScanConfig,
    any_no_ref_reads: bool,
) -> Result<u64, ScanError> {
    let mut progress = ProgressTracker::new(config.progress_interval);
    let mut chunk = Chunk::with_capacity(config.chunk_size);

    loop {
        let record = match source.next_record() {
            Ok(Some(record)) => record,
            Ok(None) => break,
            Err(e) => return Err(ScanError::fault("reader", e)),
        };
        let unmapped = record.reference_index.is_none();
        progress.record(&record);
        chunk.records.push(record);

        if chunk.len() == config.chunk_size {
            let sealed = std::mem::replace(&mut chunk, Chunk::with_capacity(config.chunk_size));
            if tx.send(StageMsg::Chunk(sealed)).is_err() {
                // Annotation worker is gone; the fault surfaces at join
                return Ok(progress.count());
            }
        }

        // Early stop: record cap reached?
        if config.stop_after > 0 && progress.count() >= config.stop_after {
            log::debug!("Stopping after {} records", progress.count());
            break;
        }

        // Early stop: into the trailing unmapped run nobody wants?
        if !any_no_ref_reads && unmapped {
            log::debug!(
                "Reached unmapped records at position {} and no collector wants them, stopping",
                progress.count()
            );
            break;
        }
    }

    // Trailing partial chunk; an empty one is not submitted
    if !chunk.is_empty() {
        let _ = tx.send(StageMsg::Chunk(chunk));
    }
    Ok(progress.count())
}

/// Annotation stage: the single worker that owns the resolver. Preserves
/// chunk order; forwards the sentinel and terminates on receipt.
fn annotation_worker(
    mut resolver: Option<Box<dyn ReferenceResolver>>,
    rx: Receiver<StageMsg<Chunk>>,
    tx: Sender<StageMsg<AnnotatedChunk>>,
) -> Result<(), ScanError> {
    while let Ok(msg) = rx.recv() {
        match msg {
            StageMsg::Chunk(chunk) => {
                let mut annotated = AnnotatedChunk::with_capacity(chunk.len());
                for record in chunk.records {
                    let slice = match (resolver.as_mut(), record.reference_index) {
                        (Some(resolver), Some(index)) => resolver
                            .lookup(index)
                            .map_err(|e| ScanError::fault("annotation", e))?,
                        _ => None,
                    };
                    annotated.pairs.push((record, slice));
                }
                if tx.send(StageMsg::Chunk(annotated)).is_err() {
                    // Dispatch worker is gone; its fault surfaces at join
                    return Ok(());
                }
            }
            StageMsg::End => {
                let _ = tx.send(StageMsg::End);
                return Ok(());
            }
        }
    }
    // Upstream dropped without a sentinel (reader failed); nothing to do
    Ok(())
}

/// Dispatch stage: the single worker that owns the collectors. Invokes
/// every collector's accept per record, in chunk order then registration
/// order, and hands the collectors back at shutdown.
fn dispatch_worker(
    mut collectors: Vec<Box<dyn Collector>>,
    rx: Receiver<StageMsg<AnnotatedChunk>>,
) -> Result<Vec<Box<dyn Collector>>, ScanError> {
    while let Ok(msg) = rx.recv() {
        match msg {
            StageMsg::Chunk(chunk) => {
                for (record, slice) in &chunk.pairs {
                    for collector in collectors.iter_mut() {
                        if let Err(e) = collector.accept(record, slice.as_deref()) {
                            return Err(ScanError::WorkerFault {
                                stage: "dispatch",
                                message: format!(
                                    "collector '{}' failed on record {}: {e:#}",
                                    collector.name(),
                                    record.ordinal
                                ),
                            });
                        }
                    }
                }
            }
            StageMsg::End => break,
        }
    }
    Ok(collectors)
}
