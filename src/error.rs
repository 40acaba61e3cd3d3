// Error taxonomy for the scan pipeline.
//
// All failures are fatal: the pipeline performs no retries and never
// suppresses a collector error, since silently dropping one would corrupt
// the accumulated statistics invisibly.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// Unreadable input, reference dictionary mismatch, or other setup
    /// problem detected before any stage starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The input header does not declare coordinate sort order and the run
    /// was not told to assume it anyway.
    #[error("ordering error: {0}")]
    Ordering(String),

    /// An uncaught failure inside a stage worker or a collector's
    /// accept/finish path. Aborts the whole pipeline.
    #[error("worker fault in {stage} stage: {message}")]
    WorkerFault {
        stage: &'static str,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScanError {
    /// Wrap a collaborator error as a fault attributed to `stage`.
    pub(crate) fn fault(stage: &'static str, err: anyhow::Error) -> Self {
        ScanError::WorkerFault {
            stage,
            message: format!("{err:#}"),
        }
    }
}
