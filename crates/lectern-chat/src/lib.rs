//! Session workflow engine for Lectern.
//!
//! Collects requirements and supplementary materials per conversation,
//! transcribes voice and audio input, and drives segmented document
//! generation with per-segment failure tolerance.

pub mod chunk;
pub mod error;
pub mod ingest;
pub mod machine;
pub mod messages;
pub mod orchestrator;
pub mod store;
pub mod transport;

pub use chunk::split_for_transport;
pub use error::ChatError;
pub use ingest::IngestionPipeline;
pub use machine::{MaterialInput, SessionMachine};
pub use orchestrator::{
    DocumentOrchestrator, GeneratedDocument, GenerationReport, GenerationSettings, SegmentOutcome,
};
pub use store::{SessionHandle, SessionStore};
pub use transport::{Outbound, RecordingTransport, Transport};
