//! Workforce records tracked by the sync engine
//!
//! Every record carries an `updated_at` timestamp and a monotonic
//! `revision` so the change-set filter can select it either by time or by
//! revision. Field names serialize in camelCase to match the wire format
//! used by the mobile and admin clients.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// RecordId
// ============================================================================

/// Identifier of a workforce record, assigned by whichever side created it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a RecordId, rejecting empty or whitespace-only values
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::InvalidId(value));
        }
        Ok(Self(value))
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ============================================================================
// EntityKind and TrackedRecord
// ============================================================================

/// The kinds of records the engine synchronizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Assignment,
    Site,
    User,
    Shift,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Assignment => "assignment",
            EntityKind::Site => "site",
            EntityKind::User => "user",
            EntityKind::Shift => "shift",
        };
        f.write_str(s)
    }
}

/// Common accessors the change-set filter and conflict detector rely on
pub trait TrackedRecord {
    /// The kind of entity this record is
    const KIND: EntityKind;

    fn record_id(&self) -> &RecordId;
    fn updated_at(&self) -> DateTime<Utc>;
    fn revision(&self) -> u64;
}

macro_rules! tracked_record {
    ($ty:ty, $kind:expr) => {
        impl TrackedRecord for $ty {
            const KIND: EntityKind = $kind;

            fn record_id(&self) -> &RecordId {
                &self.id
            }

            fn updated_at(&self) -> DateTime<Utc> {
                self.updated_at
            }

            fn revision(&self) -> u64 {
                self.revision
            }
        }
    };
}

// ============================================================================
// Assignment
// ============================================================================

/// Lifecycle of a worker's assignment to a construction site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Scheduled,
    Active,
    Completed,
    Cancelled,
}

/// A worker assigned to a construction site for a period of time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: RecordId,
    pub user_id: RecordId,
    pub site_id: RecordId,
    pub status: AssignmentStatus,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub revision: u64,
}

tracked_record!(Assignment, EntityKind::Assignment);

/// Partial update of an [`Assignment`]
///
/// `None` leaves a field untouched. `notes`, `start_date` and `end_date` use
/// a nested `Option` so a patch can clear them explicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AssignmentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl AssignmentPatch {
    /// Builds a patch that overwrites every mutable field with `source`'s values
    pub fn overwrite_from(source: &Assignment) -> Self {
        Self {
            user_id: Some(source.user_id.clone()),
            site_id: Some(source.site_id.clone()),
            status: Some(source.status),
            start_date: Some(source.start_date),
            end_date: Some(source.end_date),
            notes: Some(source.notes.clone()),
            updated_at: Some(source.updated_at),
        }
    }

    /// Returns true if the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.user_id.is_none()
            && self.site_id.is_none()
            && self.status.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.notes.is_none()
            && self.updated_at.is_none()
    }

    /// Applies the patch field by field
    ///
    /// The record's revision is bumped when anything changed. `updated_at`
    /// falls back to `now` when the patch does not carry one.
    pub fn apply(&self, target: &mut Assignment, now: DateTime<Utc>) {
        if self.is_empty() {
            return;
        }
        if let Some(user_id) = &self.user_id {
            target.user_id = user_id.clone();
        }
        if let Some(site_id) = &self.site_id {
            target.site_id = site_id.clone();
        }
        if let Some(status) = self.status {
            target.status = status;
        }
        if let Some(start_date) = self.start_date {
            target.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            target.end_date = end_date;
        }
        if let Some(notes) = &self.notes {
            target.notes = notes.clone();
        }
        target.updated_at = self.updated_at.unwrap_or(now);
        target.revision += 1;
    }
}

// ============================================================================
// Site
// ============================================================================

/// A construction site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub revision: u64,
}

tracked_record!(Site, EntityKind::Site);

// ============================================================================
// User
// ============================================================================

/// Role of a person in the workforce directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Worker,
    Foreman,
    Admin,
}

/// A person known to the system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: UserRole,
    #[serde(default = "default_true")]
    pub active: bool,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub revision: u64,
}

tracked_record!(User, EntityKind::User);

// ============================================================================
// Shift
// ============================================================================

/// A clocked work period recorded on a mobile device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    pub id: RecordId,
    pub user_id: RecordId,
    pub site_id: RecordId,
    #[serde(default)]
    pub assignment_id: Option<RecordId>,
    pub clock_in: DateTime<Utc>,
    #[serde(default)]
    pub clock_out: Option<DateTime<Utc>>,
    #[serde(default)]
    pub break_minutes: u32,
    #[serde(default)]
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub revision: u64,
}

tracked_record!(Shift, EntityKind::Shift);

impl Shift {
    /// Worked minutes excluding breaks, or `None` while the shift is open
    pub fn worked_minutes(&self) -> Option<i64> {
        let clock_out = self.clock_out?;
        let gross = (clock_out - self.clock_in).num_minutes();
        Some((gross - i64::from(self.break_minutes)).max(0))
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn id(s: &str) -> RecordId {
        RecordId::new(s).unwrap()
    }

    fn assignment() -> Assignment {
        Assignment {
            id: id("a-1"),
            user_id: id("u-1"),
            site_id: id("s-1"),
            status: AssignmentStatus::Scheduled,
            start_date: None,
            end_date: None,
            notes: Some("bring harness".to_string()),
            updated_at: Utc::now() - Duration::hours(2),
            revision: 3,
        }
    }

    #[test]
    fn record_id_rejects_blank() {
        assert!(RecordId::new("").is_err());
        assert!(RecordId::new("   ").is_err());
        assert_eq!(RecordId::new("a-1").unwrap().as_str(), "a-1");
    }

    #[test]
    fn patch_overwrites_only_given_fields() {
        let mut target = assignment();
        let now = Utc::now();
        let patch = AssignmentPatch {
            status: Some(AssignmentStatus::Active),
            ..Default::default()
        };

        patch.apply(&mut target, now);

        assert_eq!(target.status, AssignmentStatus::Active);
        assert_eq!(target.notes.as_deref(), Some("bring harness"));
        assert_eq!(target.updated_at, now);
        assert_eq!(target.revision, 4);
    }

    #[test]
    fn patch_can_clear_optional_fields() {
        let mut target = assignment();
        let patch = AssignmentPatch {
            notes: Some(None),
            ..Default::default()
        };
        patch.apply(&mut target, Utc::now());
        assert!(target.notes.is_none());
    }

    #[test]
    fn empty_patch_is_a_no_op() {
        let mut target = assignment();
        let before = target.clone();
        AssignmentPatch::default().apply(&mut target, Utc::now());
        assert_eq!(target, before);
    }

    #[test]
    fn overwrite_patch_copies_source() {
        let mut target = assignment();
        let mut source = assignment();
        source.site_id = id("s-9");
        source.status = AssignmentStatus::Completed;
        source.notes = None;

        AssignmentPatch::overwrite_from(&source).apply(&mut target, Utc::now());

        assert_eq!(target.site_id, source.site_id);
        assert_eq!(target.status, AssignmentStatus::Completed);
        assert!(target.notes.is_none());
        assert_eq!(target.updated_at, source.updated_at);
    }

    #[test]
    fn assignment_wire_format_is_camel_case() {
        let json = serde_json::to_value(assignment()).unwrap();
        assert!(json.get("userId").is_some());
        assert!(json.get("siteId").is_some());
        assert!(json.get("updatedAt").is_some());
        assert_eq!(json["status"], "scheduled");
    }

    #[test]
    fn shift_worked_minutes_subtracts_breaks() {
        let clock_in = Utc::now() - Duration::hours(8);
        let shift = Shift {
            id: id("sh-1"),
            user_id: id("u-1"),
            site_id: id("s-1"),
            assignment_id: None,
            clock_in,
            clock_out: Some(clock_in + Duration::hours(8)),
            break_minutes: 30,
            notes: None,
            updated_at: Utc::now(),
            revision: 0,
        };
        assert_eq!(shift.worked_minutes(), Some(450));

        let open = Shift {
            clock_out: None,
            ..shift
        };
        assert_eq!(open.worked_minutes(), None);
    }

    #[test]
    fn entity_kind_display() {
        assert_eq!(EntityKind::Assignment.to_string(), "assignment");
        assert_eq!(EntityKind::Shift.to_string(), "shift");
    }
}
