//! Chunked report building: bounded digests, size-capped prompts, templated
//! fallback, and all-or-nothing persistence.

pub mod builder;
pub mod content;
pub mod digest;

pub use builder::{BuildRequest, BuilderConfig, ChunkedReportBuilder, ReportBuilder};
pub use content::{truncate_to_ceiling, TRUNCATION_MARKER};
pub use digest::PeerDigest;
