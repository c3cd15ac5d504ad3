//! # Database Queries
//!
//! This module contains all the SQL queries for interacting with the database.
//! Each function performs a specific database operation.
//!
//! ## Query Organization
//!
//! Queries are grouped by the table they operate on:
//! - `listing_*` / `get_listing` - Listing table operations
//! - `*_reservation*` - Reservation table operations
//! - `*_webhook_event` - Webhook event operations
//! - `*_notification*` - Notification job operations
//!
//! ## Error Handling
//!
//! All queries return `Result<T, DatabaseError>`. Common errors:
//! - `NotFound` - Record doesn't exist
//! - `DateConflict` - The exclusion constraint rejected an overlapping insert
//! - `QueryError` - SQL execution failed
//!
//! ## Transition Queries
//!
//! Lifecycle transitions are single conditional UPDATEs with a status
//! precondition in the WHERE clause and `RETURNING *`. Zero rows back
//! means the precondition no longer held (someone else won the race);
//! callers re-fetch to find out which terminal state they lost to.

use chrono::{DateTime, NaiveDate, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use tracing::{debug, info};
use uuid::Uuid;

use super::models::*;
use super::{DatabaseError, SQLSTATE_EXCLUSION_VIOLATION};

// ============================================
// HELPER FUNCTIONS
// ============================================

/// Helper to convert a database row to Listing
fn row_to_listing(row: &Row) -> Result<Listing, DatabaseError> {
    Ok(Listing {
        id: row.get("id"),
        title: row.get("title"),
        nightly_rate: row.get("nightly_rate"),
        cleaning_fee: row.get("cleaning_fee"),
        service_fee: row.get("service_fee"),
        max_guests: row.get("max_guests"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    })
}

/// Helper to convert a database row to Reservation
fn row_to_reservation(row: &Row) -> Result<Reservation, DatabaseError> {
    Ok(Reservation {
        id: row.get("id"),
        listing_id: row.get("listing_id"),
        guest_id: row.get("guest_id"),
        check_in: row.get("check_in"),
        check_out: row.get("check_out"),
        guest_count: row.get("guest_count"),
        nightly_rate: row.get("nightly_rate"),
        cleaning_fee: row.get("cleaning_fee"),
        service_fee: row.get("service_fee"),
        total: row.get("total"),
        currency: row.get("currency"),
        status: row.get("status"),
        payment_status: row.get("payment_status"),
        gateway_session_id: row.get("gateway_session_id"),
        payment_intent_id: row.get("payment_intent_id"),
        created_at: row.get("created_at"),
        paid_at: row.get("paid_at"),
        cancelled_at: row.get("cancelled_at"),
        cancellation_reason: row.get("cancellation_reason"),
    })
}

/// Helper to convert a database row to WebhookEventRecord
fn row_to_webhook_event(row: &Row) -> Result<WebhookEventRecord, DatabaseError> {
    Ok(WebhookEventRecord {
        id: row.get("id"),
        gateway_event_id: row.get("gateway_event_id"),
        event_type: row.get("event_type"),
        payload: row.get("payload"),
        processed: row.get("processed"),
        processing_error: row.get("processing_error"),
        created_at: row.get("created_at"),
    })
}

/// Helper to convert a database row to NotificationJob
fn row_to_notification_job(row: &Row) -> Result<NotificationJob, DatabaseError> {
    Ok(NotificationJob {
        id: row.get("id"),
        job_type: row.get("job_type"),
        reservation_id: row.get("reservation_id"),
        payload: row.get("payload"),
        status: row.get("status"),
        error_message: row.get("error_message"),
        created_at: row.get("created_at"),
        sent_at: row.get("sent_at"),
    })
}

const RESERVATION_COLUMNS: &str = r#"
    id, listing_id, guest_id, check_in, check_out, guest_count,
    nightly_rate, cleaning_fee, service_fee, total, currency,
    status, payment_status, gateway_session_id, payment_intent_id,
    created_at, paid_at, cancelled_at, cancellation_reason
"#;

// ============================================
// LISTING QUERIES
// ============================================

/// Get a listing by id.
pub async fn get_listing(pool: &Pool, id: i64) -> Result<Option<Listing>, DatabaseError> {
    debug!("Fetching listing: {}", id);

    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client
        .query(
            r#"
            SELECT
                id, title, nightly_rate, cleaning_fee, service_fee,
                max_guests, is_active, created_at
            FROM listings
            WHERE id = $1
            "#,
            &[&id],
        )
        .await?;

    if rows.is_empty() {
        Ok(None)
    } else {
        Ok(Some(row_to_listing(&rows[0])?))
    }
}

// ============================================
// RESERVATION QUERIES
// ============================================

/// Check whether any non-cancelled reservation overlaps `[check_in, check_out)`.
///
/// Two half-open ranges overlap iff each starts before the other ends,
/// which is exactly the WHERE clause below.
pub async fn has_overlapping_reservation(
    pool: &Pool,
    listing_id: i64,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> Result<bool, DatabaseError> {
    debug!(
        "Checking availability for listing {} over [{}, {})",
        listing_id, check_in, check_out
    );

    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let row = client
        .query_one(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM reservations
                WHERE listing_id = $1
                  AND status <> 'cancelled'
                  AND check_in < $3
                  AND check_out > $2
            ) AS occupied
            "#,
            &[&listing_id, &check_in, &check_out],
        )
        .await?;

    Ok(row.get("occupied"))
}

/// Insert a new pending reservation.
///
/// The exclusion constraint makes this the authoritative availability
/// check: if another non-cancelled reservation overlaps, PostgreSQL
/// rejects the insert with SQLSTATE 23P01 and this returns
/// `DateConflict` for the caller to surface as "dates unavailable".
pub async fn insert_reservation(
    pool: &Pool,
    reservation: &Reservation,
) -> Result<Uuid, DatabaseError> {
    debug!(
        "Inserting reservation {} for listing {} [{} .. {})",
        reservation.id, reservation.listing_id, reservation.check_in, reservation.check_out
    );

    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let result = client
        .execute(
            r#"
            INSERT INTO reservations (
                id, listing_id, guest_id, check_in, check_out, guest_count,
                nightly_rate, cleaning_fee, service_fee, total, currency,
                status, payment_status, gateway_session_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
            &[
                &reservation.id,
                &reservation.listing_id,
                &reservation.guest_id,
                &reservation.check_in,
                &reservation.check_out,
                &reservation.guest_count,
                &reservation.nightly_rate,
                &reservation.cleaning_fee,
                &reservation.service_fee,
                &reservation.total,
                &reservation.currency,
                &reservation.status,
                &reservation.payment_status,
                &reservation.gateway_session_id,
                &reservation.created_at,
            ],
        )
        .await;

    match result {
        Ok(_) => {
            info!("Reservation created: {}", reservation.id);
            Ok(reservation.id)
        }
        Err(e) => {
            let is_exclusion = e
                .code()
                .map(|code| code.code() == SQLSTATE_EXCLUSION_VIOLATION)
                .unwrap_or(false);

            if is_exclusion {
                Err(DatabaseError::DateConflict(format!(
                    "listing {} already has a reservation overlapping [{}, {})",
                    reservation.listing_id, reservation.check_in, reservation.check_out
                )))
            } else {
                Err(DatabaseError::QueryError(e))
            }
        }
    }
}

/// Get a reservation by id.
pub async fn get_reservation(pool: &Pool, id: Uuid) -> Result<Option<Reservation>, DatabaseError> {
    debug!("Fetching reservation: {}", id);

    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client
        .query(
            &format!("SELECT {} FROM reservations WHERE id = $1", RESERVATION_COLUMNS),
            &[&id],
        )
        .await?;

    if rows.is_empty() {
        Ok(None)
    } else {
        Ok(Some(row_to_reservation(&rows[0])?))
    }
}

/// Get a reservation by its gateway checkout session id.
pub async fn get_reservation_by_session(
    pool: &Pool,
    session_id: &str,
) -> Result<Option<Reservation>, DatabaseError> {
    debug!("Fetching reservation for session: {}", session_id);

    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client
        .query(
            &format!(
                "SELECT {} FROM reservations WHERE gateway_session_id = $1",
                RESERVATION_COLUMNS
            ),
            &[&session_id],
        )
        .await?;

    if rows.is_empty() {
        Ok(None)
    } else {
        Ok(Some(row_to_reservation(&rows[0])?))
    }
}

/// Attach the gateway checkout session to a freshly inserted reservation.
pub async fn set_gateway_session(
    pool: &Pool,
    id: Uuid,
    session_id: &str,
) -> Result<(), DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows_affected = client
        .execute(
            r#"
            UPDATE reservations
            SET gateway_session_id = $2
            WHERE id = $1
            "#,
            &[&id, &session_id],
        )
        .await?;

    if rows_affected == 0 {
        return Err(DatabaseError::NotFound(format!("Reservation not found: {}", id)));
    }

    Ok(())
}

/// Confirm a reservation, but only if it is still pending.
///
/// Compare-and-swap: the `status = 'pending'` precondition and the
/// update commit atomically. Returns the updated row, or `None` if the
/// reservation had already left `pending` (duplicate webhook, sweeper
/// got there first, guest cancelled).
pub async fn confirm_reservation_if_pending(
    pool: &Pool,
    id: Uuid,
    payment_intent_id: &str,
    paid_at: DateTime<Utc>,
) -> Result<Option<Reservation>, DatabaseError> {
    debug!("Confirming reservation {} (intent: {})", id, payment_intent_id);

    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client
        .query(
            &format!(
                r#"
                UPDATE reservations
                SET
                    status = 'confirmed',
                    payment_status = 'completed',
                    payment_intent_id = $2,
                    paid_at = $3
                WHERE id = $1 AND status = 'pending'
                RETURNING {}
                "#,
                RESERVATION_COLUMNS
            ),
            &[&id, &payment_intent_id, &paid_at],
        )
        .await?;

    if rows.is_empty() {
        Ok(None)
    } else {
        info!("✅ Reservation {} confirmed", id);
        Ok(Some(row_to_reservation(&rows[0])?))
    }
}

/// Cancel a reservation, but only if it is still pending.
///
/// Same compare-and-swap shape as confirmation. `payment_status`
/// distinguishes a guest abort before payment ("pending") from an
/// expired or failed session ("failed").
pub async fn cancel_reservation_if_pending(
    pool: &Pool,
    id: Uuid,
    payment_status: &str,
    reason: &str,
    cancelled_at: DateTime<Utc>,
) -> Result<Option<Reservation>, DatabaseError> {
    debug!("Cancelling pending reservation {} ({})", id, reason);

    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client
        .query(
            &format!(
                r#"
                UPDATE reservations
                SET
                    status = 'cancelled',
                    payment_status = $2,
                    cancellation_reason = $3,
                    cancelled_at = $4
                WHERE id = $1 AND status = 'pending'
                RETURNING {}
                "#,
                RESERVATION_COLUMNS
            ),
            &[&id, &payment_status, &reason, &cancelled_at],
        )
        .await?;

    if rows.is_empty() {
        Ok(None)
    } else {
        info!("Reservation {} cancelled: {}", id, reason);
        Ok(Some(row_to_reservation(&rows[0])?))
    }
}

/// Cancel a confirmed reservation (post-payment cancellation).
///
/// Payment status is left at 'completed'; refund handling happens in a
/// separate system.
pub async fn cancel_reservation_if_confirmed(
    pool: &Pool,
    id: Uuid,
    reason: &str,
    cancelled_at: DateTime<Utc>,
) -> Result<Option<Reservation>, DatabaseError> {
    debug!("Cancelling confirmed reservation {} ({})", id, reason);

    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client
        .query(
            &format!(
                r#"
                UPDATE reservations
                SET
                    status = 'cancelled',
                    cancellation_reason = $2,
                    cancelled_at = $3
                WHERE id = $1 AND status = 'confirmed'
                RETURNING {}
                "#,
                RESERVATION_COLUMNS
            ),
            &[&id, &reason, &cancelled_at],
        )
        .await?;

    if rows.is_empty() {
        Ok(None)
    } else {
        info!("Reservation {} cancelled after confirmation: {}", id, reason);
        Ok(Some(row_to_reservation(&rows[0])?))
    }
}

/// Find pending reservations created before `cutoff`.
///
/// Used by the abandonment sweeper as a backstop for expiry events the
/// gateway never delivered.
pub async fn find_stale_pending_reservations(
    pool: &Pool,
    cutoff: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Reservation>, DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client
        .query(
            &format!(
                r#"
                SELECT {}
                FROM reservations
                WHERE status = 'pending' AND created_at < $1
                ORDER BY created_at ASC
                LIMIT $2
                "#,
                RESERVATION_COLUMNS
            ),
            &[&cutoff, &limit],
        )
        .await?;

    let mut reservations = Vec::new();
    for row in rows {
        reservations.push(row_to_reservation(&row)?);
    }

    Ok(reservations)
}

/// Get reservation count (used by the health check).
pub async fn get_reservation_count(pool: &Pool) -> Result<i64, DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let row = client
        .query_one(r#"SELECT COUNT(*) as count FROM reservations"#, &[])
        .await?;

    Ok(row.get("count"))
}

// ============================================
// WEBHOOK EVENT QUERIES
// ============================================

/// Record a delivered webhook event.
///
/// Returns `false` when the gateway event id was already recorded, in
/// which case the existing row (and its `processed` flag) is the source
/// of truth for replay handling.
pub async fn insert_webhook_event(
    pool: &Pool,
    event: &WebhookEventRecord,
) -> Result<bool, DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows_affected = client
        .execute(
            r#"
            INSERT INTO webhook_events (
                id, gateway_event_id, event_type, payload,
                processed, processing_error, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (gateway_event_id) DO NOTHING
            "#,
            &[
                &event.id,
                &event.gateway_event_id,
                &event.event_type,
                &event.payload,
                &event.processed,
                &event.processing_error,
                &event.created_at,
            ],
        )
        .await?;

    Ok(rows_affected == 1)
}

/// Get a webhook event by its gateway event id.
pub async fn get_webhook_event(
    pool: &Pool,
    gateway_event_id: &str,
) -> Result<Option<WebhookEventRecord>, DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client
        .query(
            r#"
            SELECT id, gateway_event_id, event_type, payload,
                   processed, processing_error, created_at
            FROM webhook_events
            WHERE gateway_event_id = $1
            "#,
            &[&gateway_event_id],
        )
        .await?;

    if rows.is_empty() {
        Ok(None)
    } else {
        Ok(Some(row_to_webhook_event(&rows[0])?))
    }
}

/// Record the processing outcome for a webhook event.
pub async fn mark_webhook_event(
    pool: &Pool,
    gateway_event_id: &str,
    processed: bool,
    error: Option<&str>,
) -> Result<(), DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    client
        .execute(
            r#"
            UPDATE webhook_events
            SET processed = $2, processing_error = $3
            WHERE gateway_event_id = $1
            "#,
            &[&gateway_event_id, &processed, &error],
        )
        .await?;

    Ok(())
}

// ============================================
// NOTIFICATION JOB QUERIES
// ============================================

/// Enqueue a notification job.
pub async fn insert_notification_job(
    pool: &Pool,
    job: &NotificationJob,
) -> Result<Uuid, DatabaseError> {
    debug!(
        "Enqueueing {} notification for reservation {}",
        job.job_type, job.reservation_id
    );

    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    client
        .execute(
            r#"
            INSERT INTO notification_jobs (
                id, job_type, reservation_id, payload,
                status, error_message, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
            &[
                &job.id,
                &job.job_type,
                &job.reservation_id,
                &job.payload,
                &job.status,
                &job.error_message,
                &job.created_at,
            ],
        )
        .await?;

    Ok(job.id)
}

/// Fetch pending notification jobs, oldest first.
pub async fn get_pending_notification_jobs(
    pool: &Pool,
    limit: i64,
) -> Result<Vec<NotificationJob>, DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client
        .query(
            r#"
            SELECT id, job_type, reservation_id, payload,
                   status, error_message, created_at, sent_at
            FROM notification_jobs
            WHERE status = 'pending'
            ORDER BY created_at ASC
            LIMIT $1
            "#,
            &[&limit],
        )
        .await?;

    let mut jobs = Vec::new();
    for row in rows {
        jobs.push(row_to_notification_job(&row)?);
    }

    Ok(jobs)
}

/// Record the delivery outcome for a notification job.
pub async fn mark_notification_job(
    pool: &Pool,
    id: Uuid,
    status: &str,
    error: Option<&str>,
) -> Result<(), DatabaseError> {
    let client = pool
        .get()
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let sent_at = if status == "sent" { Some(Utc::now()) } else { None };

    client
        .execute(
            r#"
            UPDATE notification_jobs
            SET status = $2, error_message = $3, sent_at = $4
            WHERE id = $1
            "#,
            &[&id, &status, &error, &sent_at],
        )
        .await?;

    Ok(())
}
