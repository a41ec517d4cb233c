//! `EventDirectory` and `IdentityDirectory` over the `events` and `identities` tables.

use crate::PostgresStore;
use crate::rows::{
    EVENT_COLUMNS, EventRow, ProjectionRow, into_event, into_projection, storage_error,
};
use checkin_core::store::{EventDirectory, IdentityDirectory, InviteCodeAssignment, StoreFuture};
use checkin_core::types::{
    EventId, EventRecord, IdentityId, IdentityProfile, IdentityProjection, InviteCode,
};
use std::collections::HashMap;
use uuid::Uuid;

impl EventDirectory for PostgresStore {
    fn get_event(&self, event_id: EventId) -> StoreFuture<'_, Option<EventRecord>> {
        Box::pin(async move {
            let row: Option<EventRow> =
                sqlx::query_as(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
                    .bind(event_id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| storage_error("load event", e))?;

            row.map(into_event).transpose()
        })
    }

    fn assign_invite_code(
        &self,
        event_id: EventId,
        code: &InviteCode,
    ) -> StoreFuture<'_, InviteCodeAssignment> {
        let code = code.as_str().to_string();
        Box::pin(async move {
            let result = sqlx::query("UPDATE events SET invite_code = $2 WHERE id = $1")
                .bind(event_id.as_uuid())
                .bind(&code)
                .execute(&self.pool)
                .await;

            match result {
                Ok(done) if done.rows_affected() == 0 => Ok(InviteCodeAssignment::EventNotFound),
                Ok(_) => Ok(InviteCodeAssignment::Assigned),
                Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                    Ok(InviteCodeAssignment::CodeTaken)
                }
                Err(e) => Err(storage_error("assign invite code", e)),
            }
        })
    }

    fn find_event_by_invite_code(&self, code: &InviteCode) -> StoreFuture<'_, Option<EventRecord>> {
        let code = code.as_str().to_string();
        Box::pin(async move {
            let row: Option<EventRow> = sqlx::query_as(&format!(
                "SELECT {EVENT_COLUMNS} FROM events WHERE invite_code = $1"
            ))
            .bind(&code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("find event by invite code", e))?;

            row.map(into_event).transpose()
        })
    }
}

impl IdentityDirectory for PostgresStore {
    fn find_or_create_identity(&self, profile: &IdentityProfile) -> StoreFuture<'_, IdentityId> {
        let profile = profile.clone();
        Box::pin(async move {
            // The no-op update makes RETURNING yield the existing row on conflict.
            let (id,): (Uuid,) = sqlx::query_as(
                "INSERT INTO identities (id, email, name, company, job_title)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
                 RETURNING id",
            )
            .bind(Uuid::new_v4())
            .bind(profile.normalized_email())
            .bind(&profile.name)
            .bind(&profile.company)
            .bind(&profile.job_title)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| storage_error("find or create identity", e))?;

            Ok(IdentityId::from_uuid(id))
        })
    }

    fn identity_projection(&self, id: IdentityId) -> StoreFuture<'_, Option<IdentityProjection>> {
        Box::pin(async move {
            let row: Option<ProjectionRow> =
                sqlx::query_as("SELECT name, company, job_title FROM identities WHERE id = $1")
                    .bind(id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| storage_error("load identity", e))?;

            Ok(row.map(into_projection))
        })
    }

    fn identity_projections(
        &self,
        ids: &[IdentityId],
    ) -> StoreFuture<'_, HashMap<IdentityId, IdentityProjection>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        Box::pin(async move {
            let rows: Vec<(Uuid, String, Option<String>, Option<String>)> = sqlx::query_as(
                "SELECT id, name, company, job_title FROM identities WHERE id = ANY($1)",
            )
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("load identities", e))?;

            Ok(rows
                .into_iter()
                .map(|(id, name, company, job_title)| {
                    (
                        IdentityId::from_uuid(id),
                        into_projection((name, company, job_title)),
                    )
                })
                .collect())
        })
    }
}
