//! `RegistrationStore` over the `registrations` table.

use crate::PostgresStore;
use crate::rows::{
    REGISTRATION_COLUMNS, RegistrationRow, capacity_from_column, into_registration, storage_error,
};
use checkin_core::error::StoreError;
use checkin_core::store::{CheckInOutcome, InsertOutcome, RegistrationStore, StoreFuture};
use checkin_core::types::{
    ActiveCounts, Credential, EventId, NewRegistration, Registration, RegistrationId,
    RegistrationStatus,
};
use chrono::{DateTime, Utc};

impl RegistrationStore for PostgresStore {
    fn insert_registration(&self, registration: NewRegistration) -> StoreFuture<'_, InsertOutcome> {
        Box::pin(async move {
            let event_id = *registration.event_id.as_uuid();
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| storage_error("begin registration", e))?;

            // Per-event serialization point: concurrent inserts for the same
            // event queue here until this transaction ends.
            let event: Option<(Option<i64>,)> =
                sqlx::query_as("SELECT capacity FROM events WHERE id = $1 FOR UPDATE")
                    .bind(event_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| storage_error("lock event", e))?;
            let Some((capacity,)) = event else {
                return Ok(InsertOutcome::EventNotFound);
            };
            let capacity = capacity_from_column(event_id, capacity)?;

            let existing: Option<RegistrationRow> = sqlx::query_as(&format!(
                "SELECT {REGISTRATION_COLUMNS} FROM registrations
                 WHERE event_id = $1 AND identity_id = $2 AND status <> 'cancelled'"
            ))
            .bind(event_id)
            .bind(registration.identity_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| storage_error("probe duplicate", e))?;
            if let Some(row) = existing {
                return Ok(InsertOutcome::AlreadyRegistered(into_registration(row)?));
            }

            let (active,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM registrations WHERE event_id = $1 AND status <> 'cancelled'",
            )
            .bind(event_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| storage_error("count active", e))?;
            if capacity.is_full(u64::try_from(active).unwrap_or(0)) {
                return Ok(InsertOutcome::EventFull { capacity });
            }

            let inserted = sqlx::query(
                "INSERT INTO registrations (id, event_id, identity_id, status, credential, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (credential) DO NOTHING",
            )
            .bind(registration.id.as_uuid())
            .bind(event_id)
            .bind(registration.identity_id.as_uuid())
            .bind(RegistrationStatus::Registered.as_str())
            .bind(registration.credential.as_str())
            .bind(registration.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage_error("insert registration", e))?;
            if inserted.rows_affected() == 0 {
                return Ok(InsertOutcome::CredentialTaken);
            }

            tx.commit()
                .await
                .map_err(|e| storage_error("commit registration", e))?;

            Ok(InsertOutcome::Inserted(registration.into_registration()))
        })
    }

    fn check_in(
        &self,
        credential: &Credential,
        event_id: EventId,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, CheckInOutcome> {
        let credential = credential.as_str().to_string();
        Box::pin(async move {
            let updated: Option<RegistrationRow> = sqlx::query_as(&format!(
                "UPDATE registrations
                 SET status = 'checked_in', checked_in_at = $3
                 WHERE credential = $1 AND event_id = $2 AND status = 'registered'
                 RETURNING {REGISTRATION_COLUMNS}"
            ))
            .bind(&credential)
            .bind(event_id.as_uuid())
            .bind(at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("check in", e))?;
            if let Some(row) = updated {
                return Ok(CheckInOutcome::CheckedIn(into_registration(row)?));
            }

            // Nothing changed: find out why.
            let current: Option<RegistrationRow> = sqlx::query_as(&format!(
                "SELECT {REGISTRATION_COLUMNS} FROM registrations
                 WHERE credential = $1 AND event_id = $2"
            ))
            .bind(&credential)
            .bind(event_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("classify check-in", e))?;

            let Some(row) = current else {
                return Ok(CheckInOutcome::NotFound);
            };
            let registration = into_registration(row)?;
            match registration.status {
                RegistrationStatus::CheckedIn => Ok(CheckInOutcome::AlreadyCheckedIn(registration)),
                RegistrationStatus::Cancelled => Ok(CheckInOutcome::Cancelled(registration)),
                RegistrationStatus::Registered => Err(StoreError::Conflict(
                    "registration changed while checking in".to_string(),
                )),
            }
        })
    }

    fn count_active(&self, event_id: EventId) -> StoreFuture<'_, ActiveCounts> {
        Box::pin(async move {
            let (registered, checked_in): (i64, i64) = sqlx::query_as(
                "SELECT COUNT(*) FILTER (WHERE status <> 'cancelled'),
                        COUNT(*) FILTER (WHERE status = 'checked_in')
                 FROM registrations WHERE event_id = $1",
            )
            .bind(event_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| storage_error("count active", e))?;

            Ok(ActiveCounts {
                registered: u64::try_from(registered).unwrap_or(0),
                checked_in: u64::try_from(checked_in).unwrap_or(0),
            })
        })
    }

    fn active_registrations(&self, event_id: EventId) -> StoreFuture<'_, Vec<Registration>> {
        Box::pin(async move {
            let rows: Vec<RegistrationRow> = sqlx::query_as(&format!(
                "SELECT {REGISTRATION_COLUMNS} FROM registrations
                 WHERE event_id = $1 AND status <> 'cancelled'
                 ORDER BY created_at, id"
            ))
            .bind(event_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("load registrations", e))?;

            rows.into_iter().map(into_registration).collect()
        })
    }

    fn get_registration(&self, id: RegistrationId) -> StoreFuture<'_, Option<Registration>> {
        Box::pin(async move {
            let row: Option<RegistrationRow> = sqlx::query_as(&format!(
                "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = $1"
            ))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("load registration", e))?;

            row.map(into_registration).transpose()
        })
    }
}
