pub mod chunk; // Chunk/AnnotatedChunk batch types moved between stages
pub mod collect; // Collector contract (setup / accept / finish)
pub mod collectors; // Shipped collectors (flagstat, gc-content)
pub mod error; // ScanError taxonomy
pub mod header; // Sort order and reference dictionary model
pub mod pipeline; // Orchestration: reader loop, stage workers, shutdown
pub mod progress; // Periodic progress logging
pub mod record; // Record model and flag constants
pub mod reference; // ReferenceResolver trait and FASTA walker
pub mod source; // RecordSource trait and SAM text reader
