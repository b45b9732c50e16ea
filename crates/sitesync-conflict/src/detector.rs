//! Conflict detection logic
//!
//! An inbound record conflicts with its local counterpart when:
//! 1. the payload names a base watermark and the local record was modified
//!    after it, AND
//! 2. the two versions differ in content.
//!
//! Without a base watermark there is nothing to compare against, so a
//! differing record is applied as a plain update.
//!
//! Content is compared on the JSON form of each record with the
//! bookkeeping fields `updatedAt` and `revision` removed, so a record that
//! was merely re-stamped does not count as changed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sitesync_core::domain::TrackedRecord;
use tracing::debug;

use crate::error::IngestError;

const BOOKKEEPING_FIELDS: [&str; 2] = ["updatedAt", "revision"];

/// Outcome of comparing an inbound record with the local store
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// No local record with this id
    New,
    /// Same content on both sides; nothing to write
    Unchanged,
    /// Content differs, but the local record predates the base watermark
    /// (or the payload carries none)
    Clean,
    /// Both sides changed; carries JSON snapshots of both versions
    Conflicted { local: Value, remote: Value },
}

pub struct ConflictDetector;

impl ConflictDetector {
    /// Compares `incoming` against `local`, if there is one
    pub fn check<R>(
        local: Option<&R>,
        incoming: &R,
        base_watermark: Option<DateTime<Utc>>,
    ) -> Result<Detection, IngestError>
    where
        R: TrackedRecord + Serialize,
    {
        let Some(local) = local else {
            return Ok(Detection::New);
        };

        let local_json = snapshot(local)?;
        let remote_json = snapshot(incoming)?;
        if content(&local_json) == content(&remote_json) {
            return Ok(Detection::Unchanged);
        }

        let Some(base) = base_watermark else {
            return Ok(Detection::Clean);
        };
        if local.updated_at() <= base {
            return Ok(Detection::Clean);
        }

        debug!(
            kind = %R::KIND,
            id = %local.record_id(),
            local_updated = %local.updated_at(),
            %base,
            "Local record changed after the payload's base watermark"
        );
        Ok(Detection::Conflicted {
            local: local_json,
            remote: remote_json,
        })
    }
}

fn snapshot<R: TrackedRecord + Serialize>(record: &R) -> Result<Value, IngestError> {
    serde_json::to_value(record).map_err(|source| IngestError::Snapshot {
        kind: R::KIND,
        id: record.record_id().to_string(),
        source,
    })
}

fn content(value: &Value) -> Value {
    let mut stripped = value.clone();
    if let Value::Object(map) = &mut stripped {
        for field in BOOKKEEPING_FIELDS {
            map.remove(field);
        }
    }
    stripped
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use sitesync_core::domain::{RecordId, Shift};

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap()
    }

    fn shift(break_minutes: u32, updated_at: DateTime<Utc>) -> Shift {
        Shift {
            id: RecordId::new("sh-1").unwrap(),
            user_id: RecordId::new("u-1").unwrap(),
            site_id: RecordId::new("s-1").unwrap(),
            assignment_id: None,
            clock_in: t0(),
            clock_out: Some(t0() + Duration::hours(8)),
            break_minutes,
            notes: None,
            updated_at,
            revision: 1,
        }
    }

    #[test]
    fn missing_local_record_is_new() {
        let incoming = shift(30, t0());
        assert_eq!(
            ConflictDetector::check(None, &incoming, Some(t0())).unwrap(),
            Detection::New
        );
    }

    #[test]
    fn restamped_record_is_unchanged() {
        let local = shift(30, t0() + Duration::hours(9));
        let mut incoming = shift(30, t0() + Duration::hours(10));
        incoming.revision = 7;
        assert_eq!(
            ConflictDetector::check(Some(&local), &incoming, Some(t0())).unwrap(),
            Detection::Unchanged
        );
    }

    #[test]
    fn local_edit_before_base_is_clean() {
        let local = shift(30, t0() + Duration::hours(1));
        let incoming = shift(45, t0() + Duration::hours(9));
        let base = t0() + Duration::hours(2);
        assert_eq!(
            ConflictDetector::check(Some(&local), &incoming, Some(base)).unwrap(),
            Detection::Clean
        );
    }

    #[test]
    fn local_edit_after_base_conflicts() {
        let local = shift(30, t0() + Duration::hours(3));
        let incoming = shift(45, t0() + Duration::hours(9));
        let base = t0() + Duration::hours(2);

        match ConflictDetector::check(Some(&local), &incoming, Some(base)).unwrap() {
            Detection::Conflicted { local, remote } => {
                assert_eq!(local["breakMinutes"], 30);
                assert_eq!(remote["breakMinutes"], 45);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn payload_without_base_is_a_plain_update() {
        let local = shift(30, t0() + Duration::hours(8));
        let incoming = shift(45, t0() + Duration::hours(9));
        assert_eq!(
            ConflictDetector::check(Some(&local), &incoming, None).unwrap(),
            Detection::Clean
        );
    }
}
