//! SiteSync Conflict - Mobile ingestion and conflict resolution
//!
//! Provides:
//! - Merging of inbound device payloads into the workforce store
//! - Detection of local records that changed after the device's base watermark
//! - Configurable resolution policies, deferring to a reviewer by default

pub mod detector;
pub mod error;
pub mod ingest;
pub mod policy;

pub use detector::{ConflictDetector, Detection};
pub use error::IngestError;
pub use ingest::{IngestReport, MobileIngestor};
pub use policy::ConflictPolicy;
