//! Row shapes and error mapping shared by the store implementations.

use checkin_core::error::StoreError;
use checkin_core::types::{
    Capacity, Credential, EventId, EventRecord, EventStatus, EventVisibility, IdentityId,
    IdentityProjection, InviteCode, Registration, RegistrationId, RegistrationStatus,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Column list matching [`RegistrationRow`].
pub const REGISTRATION_COLUMNS: &str =
    "id, event_id, identity_id, status, credential, created_at, checked_in_at";

/// Column list matching [`EventRow`].
pub const EVENT_COLUMNS: &str = "id, capacity, status, visibility, invite_code";

/// `registrations` row as read by `query_as`.
pub type RegistrationRow = (
    Uuid,
    Uuid,
    Uuid,
    String,
    String,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

/// `events` row as read by `query_as`.
pub type EventRow = (Uuid, Option<i64>, String, String, Option<String>);

/// `identities` projection columns.
pub type ProjectionRow = (String, Option<String>, Option<String>);

/// Map a driver error onto the storage taxonomy.
///
/// Serialization failures and deadlocks are retryable conflicts. A unique
/// violation that slipped past the in-transaction probes means a concurrent
/// writer won a race the probes could not see; retrying re-evaluates it, so
/// it is a conflict too.
pub fn storage_error(context: &str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let retryable = matches!(db_err.code().as_deref(), Some("40001" | "40P01"))
            || db_err.is_unique_violation();
        if retryable {
            metrics::counter!("checkin_storage_conflicts_total").increment(1);
            tracing::warn!(context, error = %db_err, "Storage conflict");
            return StoreError::Conflict(format!("{context}: {db_err}"));
        }
    }
    StoreError::Unavailable(format!("{context}: {err}"))
}

pub fn into_registration(row: RegistrationRow) -> Result<Registration, StoreError> {
    let (id, event_id, identity_id, status, credential, created_at, checked_in_at) = row;
    let status: RegistrationStatus = status
        .parse()
        .map_err(|e| StoreError::Unavailable(format!("corrupt registration {id}: {e}")))?;

    Ok(Registration {
        id: RegistrationId::from_uuid(id),
        event_id: EventId::from_uuid(event_id),
        identity_id: IdentityId::from_uuid(identity_id),
        status,
        credential: Credential::new(credential),
        created_at,
        checked_in_at,
    })
}

/// Map the nullable `capacity` column onto a [`Capacity`]. A value outside
/// `1..=u32::MAX` is corruption, not a silent fallback to unbounded.
pub fn capacity_from_column(event_id: Uuid, seats: Option<i64>) -> Result<Capacity, StoreError> {
    match seats {
        None => Ok(Capacity::Unbounded),
        Some(n) => u32::try_from(n)
            .ok()
            .and_then(Capacity::limited)
            .ok_or_else(|| {
                StoreError::Unavailable(format!("corrupt event {event_id}: capacity {n}"))
            }),
    }
}

pub fn into_event(row: EventRow) -> Result<EventRecord, StoreError> {
    let (id, capacity, status, visibility, invite_code) = row;
    let corrupt = |what: &str, value: &str| {
        StoreError::Unavailable(format!("corrupt event {id}: unknown {what} {value:?}"))
    };

    let status = match status.as_str() {
        "draft" => EventStatus::Draft,
        "published" => EventStatus::Published,
        other => return Err(corrupt("status", other)),
    };
    let visibility = match visibility.as_str() {
        "public" => EventVisibility::Public,
        "private" => EventVisibility::Private,
        other => return Err(corrupt("visibility", other)),
    };

    let invite_code = match invite_code {
        Some(code) => Some(InviteCode::parse(&code).map_err(|_| corrupt("invite code", &code))?),
        None => None,
    };

    Ok(EventRecord {
        id: EventId::from_uuid(id),
        capacity: capacity_from_column(id, capacity)?,
        status,
        visibility,
        invite_code,
    })
}

pub fn into_projection(row: ProjectionRow) -> IdentityProjection {
    let (name, company, job_title) = row;
    IdentityProjection {
        name,
        company,
        job_title,
    }
}

pub const fn event_status_str(status: EventStatus) -> &'static str {
    match status {
        EventStatus::Draft => "draft",
        EventStatus::Published => "published",
    }
}

pub const fn event_visibility_str(visibility: EventVisibility) -> &'static str {
    match visibility {
        EventVisibility::Public => "public",
        EventVisibility::Private => "private",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_capacity_round_trips_as_null() {
        let event = into_event((Uuid::new_v4(), None, "published".into(), "public".into(), None))
            .unwrap();
        assert_eq!(event.capacity, Capacity::Unbounded);

        let event = into_event((Uuid::new_v4(), Some(40), "draft".into(), "private".into(), None))
            .unwrap();
        assert_eq!(event.capacity, Capacity::Limited(40));
        assert_eq!(event.status, EventStatus::Draft);
        assert_eq!(event.visibility, EventVisibility::Private);
    }

    #[test]
    fn unknown_status_is_reported_as_corruption() {
        let row = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "waitlisted".to_string(),
            "token".to_string(),
            Utc::now(),
            None,
        );
        assert!(matches!(into_registration(row), Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn malformed_invite_code_is_reported_as_corruption() {
        let row = (
            Uuid::new_v4(),
            None,
            "published".to_string(),
            "public".to_string(),
            Some("no!".to_string()),
        );
        assert!(matches!(into_event(row), Err(StoreError::Unavailable(msg)) if msg.contains("invite code")));
    }

    #[test]
    fn out_of_range_capacity_is_reported_as_corruption() {
        let id = Uuid::new_v4();
        assert_eq!(capacity_from_column(id, Some(12)).unwrap(), Capacity::Limited(12));
        assert_eq!(
            capacity_from_column(id, Some(i64::from(u32::MAX))).unwrap(),
            Capacity::Limited(u32::MAX)
        );
        for bad in [0, -3, i64::from(u32::MAX) + 1] {
            assert!(matches!(capacity_from_column(id, Some(bad)), Err(StoreError::Unavailable(_))));
        }
    }

    #[test]
    fn pool_errors_are_unavailable() {
        let err = storage_error("insert", sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Unavailable(msg) if msg.starts_with("insert")));
    }
}
