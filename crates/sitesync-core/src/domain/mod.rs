//! Domain entities and business logic
//!
//! This module contains the core domain types for SiteSync:
//! - Workforce records (assignments, sites, users, shifts)
//! - Change sets and sync cursors
//! - Network status and sync recommendations
//! - Inbound mobile payloads and conflicts
//! - Authentication token pairs
//! - Domain-specific error types and the failure taxonomy

pub mod change_set;
pub mod conflict;
pub mod errors;
pub mod network;
pub mod payload;
pub mod records;
pub mod sync_state;
pub mod tokens;

// Re-export commonly used types
pub use change_set::ChangeSet;
pub use conflict::{Conflict, Resolution};
pub use errors::{DomainError, FailureClass, TransportError};
pub use network::{LinkType, NetworkQuality, NetworkStatus, SyncRecommendation};
pub use payload::{MobileSyncPayload, PayloadMetadata};
pub use records::{
    Assignment, AssignmentPatch, AssignmentStatus, EntityKind, RecordId, Shift, Site,
    TrackedRecord, User, UserRole,
};
pub use sync_state::{
    SyncAck, SyncCursor, SyncHistoryEntry, SyncHistoryStatus, SyncStatus, SyncType,
};
pub use tokens::TokenPair;
