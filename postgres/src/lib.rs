//! `PostgreSQL` storage for the check-in core.
//!
//! [`PostgresStore`] implements `RegistrationStore`, `EventDirectory` and
//! `IdentityDirectory` from `checkin-core` over one connection pool. The
//! registration invariants are enforced here, at commit time:
//!
//! - **Capacity**: every insert for an event first takes a row lock on that
//!   event (`SELECT ... FOR UPDATE`), so the duplicate probe, the active
//!   count and the insert of concurrent registrations for the same event run
//!   one after the other.
//! - **One active registration per identity**: a partial unique index on
//!   `(event_id, identity_id) WHERE status <> 'cancelled'` backs the probe.
//! - **Global credential uniqueness**: a unique constraint on `credential`.
//! - **Exactly-once check-in**: a single conditional `UPDATE ... WHERE
//!   status = 'registered'`.
//!
//! Serialization failures and deadlocks (`40001`, `40P01`) surface as
//! `StoreError::Conflict`; everything else that goes wrong with the database
//! surfaces as `StoreError::Unavailable`.
//!
//! # Example
//!
//! ```no_run
//! use checkin_postgres::PostgresStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgresStore::new("postgres://localhost/checkin").await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod directory;
mod registrations;
mod rows;

use checkin_core::error::StoreError;
use checkin_core::types::EventRecord;
use rows::{event_status_str, event_visibility_str, storage_error};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use thiserror::Error;

/// Failure to bring the store up.
#[derive(Error, Debug)]
pub enum SetupError {
    /// The database could not be reached
    #[error("Failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// Schema migrations failed
    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Registration, event and identity storage backed by `PostgreSQL`.
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect with sqlx's default pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Connect`] if the database cannot be reached.
    pub async fn new(database_url: &str) -> Result<Self, SetupError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(SetupError::Connect)?;
        Ok(Self::from_pool(pool))
    }

    /// Connect with an explicit pool size and acquire timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Connect`] if the database cannot be reached.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, SetupError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(SetupError::Connect)?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Migrate`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), SetupError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Round-trip a trivial query. Used by readiness probes.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the database does not answer.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("ping", e))?;
        Ok(())
    }

    /// Insert or replace an event's metadata.
    ///
    /// Event CRUD belongs to the surrounding application; this exists for
    /// seeding and tests.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the write fails.
    pub async fn upsert_event(&self, event: &EventRecord) -> Result<(), StoreError> {
        let capacity = event.capacity.seats().map(i64::from);

        sqlx::query(
            "INSERT INTO events (id, capacity, status, visibility, invite_code)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE
             SET capacity = EXCLUDED.capacity,
                 status = EXCLUDED.status,
                 visibility = EXCLUDED.visibility,
                 invite_code = EXCLUDED.invite_code",
        )
        .bind(event.id.as_uuid())
        .bind(capacity)
        .bind(event_status_str(event.status))
        .bind(event_visibility_str(event.visibility))
        .bind(event.invite_code.as_ref().map(|c| c.as_str().to_string()))
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error("upsert event", e))?;

        Ok(())
    }
}
