//! PostgreSQL-backed [`ReservationStore`].
//!
//! Thin adapter over `db::queries`: each trait method delegates to the
//! matching query function and maps `DatabaseError` into the service
//! error taxonomy. The interesting guarantees (exclusion constraint,
//! conditional-UPDATE transitions) live in the SQL, not here.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::db::{
    queries, Database, DatabaseError, Listing, NotificationJob, PaymentStatus, Reservation,
    WebhookEventRecord,
};
use crate::services::BookingError;
use crate::store::ReservationStore;

/// Production store over the shared connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    db: Database,
}

impl PostgresStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

/// Map storage errors into the service taxonomy.
///
/// `DateConflict` is the exclusion constraint firing, which is an
/// expected user-facing outcome, not an infrastructure failure.
fn map_db_err(e: DatabaseError) -> BookingError {
    match e {
        DatabaseError::NotFound(msg) => BookingError::NotFound(msg),
        DatabaseError::DateConflict(msg) => BookingError::Conflict(msg),
        other => BookingError::Persistence(other.to_string()),
    }
}

#[async_trait]
impl ReservationStore for PostgresStore {
    async fn get_listing(&self, id: i64) -> Result<Option<Listing>, BookingError> {
        queries::get_listing(self.db.pool(), id)
            .await
            .map_err(map_db_err)
    }

    async fn is_available(
        &self,
        listing_id: i64,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<bool, BookingError> {
        let occupied =
            queries::has_overlapping_reservation(self.db.pool(), listing_id, check_in, check_out)
                .await
                .map_err(map_db_err)?;
        Ok(!occupied)
    }

    async fn insert_pending(&self, reservation: &Reservation) -> Result<(), BookingError> {
        queries::insert_reservation(self.db.pool(), reservation)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    async fn get_reservation(&self, id: Uuid) -> Result<Option<Reservation>, BookingError> {
        queries::get_reservation(self.db.pool(), id)
            .await
            .map_err(map_db_err)
    }

    async fn get_by_session(&self, session_id: &str) -> Result<Option<Reservation>, BookingError> {
        queries::get_reservation_by_session(self.db.pool(), session_id)
            .await
            .map_err(map_db_err)
    }

    async fn set_gateway_session(&self, id: Uuid, session_id: &str) -> Result<(), BookingError> {
        queries::set_gateway_session(self.db.pool(), id, session_id)
            .await
            .map_err(map_db_err)
    }

    async fn confirm_if_pending(
        &self,
        id: Uuid,
        payment_intent_id: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Reservation>, BookingError> {
        queries::confirm_reservation_if_pending(self.db.pool(), id, payment_intent_id, paid_at)
            .await
            .map_err(map_db_err)
    }

    async fn cancel_if_pending(
        &self,
        id: Uuid,
        payment_status: PaymentStatus,
        reason: &str,
        cancelled_at: DateTime<Utc>,
    ) -> Result<Option<Reservation>, BookingError> {
        queries::cancel_reservation_if_pending(
            self.db.pool(),
            id,
            &payment_status.to_string(),
            reason,
            cancelled_at,
        )
        .await
        .map_err(map_db_err)
    }

    async fn cancel_if_confirmed(
        &self,
        id: Uuid,
        reason: &str,
        cancelled_at: DateTime<Utc>,
    ) -> Result<Option<Reservation>, BookingError> {
        queries::cancel_reservation_if_confirmed(self.db.pool(), id, reason, cancelled_at)
            .await
            .map_err(map_db_err)
    }

    async fn find_stale_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Reservation>, BookingError> {
        queries::find_stale_pending_reservations(self.db.pool(), cutoff, limit)
            .await
            .map_err(map_db_err)
    }

    async fn record_webhook_event(&self, event: &WebhookEventRecord) -> Result<bool, BookingError> {
        queries::insert_webhook_event(self.db.pool(), event)
            .await
            .map_err(map_db_err)
    }

    async fn get_webhook_event(
        &self,
        gateway_event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, BookingError> {
        queries::get_webhook_event(self.db.pool(), gateway_event_id)
            .await
            .map_err(map_db_err)
    }

    async fn mark_webhook_event(
        &self,
        gateway_event_id: &str,
        processed: bool,
        error: Option<&str>,
    ) -> Result<(), BookingError> {
        queries::mark_webhook_event(self.db.pool(), gateway_event_id, processed, error)
            .await
            .map_err(map_db_err)
    }

    async fn enqueue_notification(&self, job: &NotificationJob) -> Result<(), BookingError> {
        queries::insert_notification_job(self.db.pool(), job)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    async fn pending_notifications(&self, limit: i64) -> Result<Vec<NotificationJob>, BookingError> {
        queries::get_pending_notification_jobs(self.db.pool(), limit)
            .await
            .map_err(map_db_err)
    }

    async fn mark_notification(
        &self,
        id: Uuid,
        status: &str,
        error: Option<&str>,
    ) -> Result<(), BookingError> {
        queries::mark_notification_job(self.db.pool(), id, status, error)
            .await
            .map_err(map_db_err)
    }

    async fn reservation_count(&self) -> Result<i64, BookingError> {
        queries::get_reservation_count(self.db.pool())
            .await
            .map_err(map_db_err)
    }
}
