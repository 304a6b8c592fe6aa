//! # Booking Repository
//!
//! Bookings created by the reconciliation step, plus the same-day lookup the
//! conflict detector needs.
//!
//! ## Idempotency
//! `payment_transaction_id` carries a UNIQUE index. [`insert`] uses
//! `ON CONFLICT DO NOTHING`, so two concurrent appliers for the same payment
//! leave exactly one row and the loser gets `None` back.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use bookpay_core::{Booking, BookingStatus, Money, TenantScope};

#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: i64,
    tenant_id: Option<String>,
    store_id: Option<i64>,
    service_id: i64,
    customer_id: Option<i64>,
    payment_transaction_id: Option<i64>,
    service_title: String,
    service_description: Option<String>,
    duration_minutes: Option<i64>,
    price: i64,
    scheduled_at: NaiveDateTime,
    status: BookingStatus,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Booking {
            id: row.id,
            tenant_id: row.tenant_id,
            store_id: row.store_id,
            service_id: row.service_id,
            customer_id: row.customer_id,
            payment_transaction_id: row.payment_transaction_id,
            service_title: row.service_title,
            service_description: row.service_description,
            duration_minutes: row.duration_minutes,
            price: Money::from_minor(row.price),
            scheduled_at: row.scheduled_at,
            status: row.status,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

const SELECT_BOOKING: &str = r#"
    SELECT id, tenant_id, store_id, service_id, customer_id, payment_transaction_id,
           service_title, service_description, duration_minutes, price,
           scheduled_at, status, notes, created_at
    FROM bookings
"#;

/// A booking about to be written.
///
/// Service fields are a snapshot taken at payment time.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub tenant_id: Option<String>,
    pub store_id: Option<i64>,
    pub service_id: i64,
    pub customer_id: Option<i64>,
    pub payment_transaction_id: Option<i64>,
    pub service_title: String,
    pub service_description: Option<String>,
    pub duration_minutes: Option<i64>,
    pub price: Money,
    pub scheduled_at: NaiveDateTime,
    pub status: BookingStatus,
    pub notes: Option<String>,
}

/// Repository for booking database operations.
#[derive(Debug, Clone)]
pub struct BookingRepository {
    pool: SqlitePool,
}

impl BookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BookingRepository { pool }
    }

    /// Slot-holding bookings for a service on one calendar day.
    pub async fn blocking_on_day(
        &self,
        scope: &TenantScope,
        service_id: i64,
        store_id: Option<i64>,
        day: NaiveDate,
    ) -> DbResult<Vec<Booking>> {
        let mut conn = self.pool.acquire().await?;
        blocking_on_day(&mut conn, scope, service_id, store_id, day).await
    }

    pub async fn get_for_transaction(&self, transaction_id: i64) -> DbResult<Option<Booking>> {
        let mut conn = self.pool.acquire().await?;
        get_for_transaction(&mut conn, transaction_id).await
    }

    pub async fn count_for_transaction(&self, transaction_id: i64) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE payment_transaction_id = ?1")
                .bind(transaction_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Inserts a booking outside any payment (manual bookings, seed data).
    pub async fn insert(&self, booking: &NewBooking) -> DbResult<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, booking).await
    }
}

// =============================================================================
// Connection-level operations
// =============================================================================

/// Slot-holding (`pending` / `confirmed`) bookings on `day`.
///
/// When `store_id` is given, only that store's bookings count.
pub async fn blocking_on_day(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    service_id: i64,
    store_id: Option<i64>,
    day: NaiveDate,
) -> DbResult<Vec<Booking>> {
    let day_start = day.and_time(chrono::NaiveTime::MIN);
    let day_end = day_start + Duration::days(1);

    let sql = format!(
        "{SELECT_BOOKING}
        WHERE service_id = ?1
          AND tenant_id IS ?2
          AND (?3 IS NULL OR store_id = ?3)
          AND scheduled_at >= ?4 AND scheduled_at < ?5
          AND status IN ('pending', 'confirmed')
        ORDER BY scheduled_at"
    );

    let rows: Vec<BookingRow> = sqlx::query_as(&sql)
        .bind(service_id)
        .bind(scope.tenant_id())
        .bind(store_id)
        .bind(day_start)
        .bind(day_end)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(Booking::from).collect())
}

/// The booking created for a payment, if any.
pub async fn get_for_transaction(
    conn: &mut SqliteConnection,
    transaction_id: i64,
) -> DbResult<Option<Booking>> {
    let sql = format!("{SELECT_BOOKING} WHERE payment_transaction_id = ?1");
    let row: Option<BookingRow> = sqlx::query_as(&sql)
        .bind(transaction_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(Booking::from))
}

/// Inserts a booking; returns `None` if one already exists for the payment.
pub async fn insert(conn: &mut SqliteConnection, booking: &NewBooking) -> DbResult<Option<i64>> {
    debug!(
        service_id = booking.service_id,
        scheduled_at = %booking.scheduled_at,
        transaction_id = ?booking.payment_transaction_id,
        "Inserting booking"
    );

    let id: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO bookings (
            tenant_id, store_id, service_id, customer_id, payment_transaction_id,
            service_title, service_description, duration_minutes, price,
            scheduled_at, status, notes, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        ON CONFLICT(payment_transaction_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(&booking.tenant_id)
    .bind(booking.store_id)
    .bind(booking.service_id)
    .bind(booking.customer_id)
    .bind(booking.payment_transaction_id)
    .bind(&booking.service_title)
    .bind(&booking.service_description)
    .bind(booking.duration_minutes)
    .bind(booking.price.minor())
    .bind(booking.scheduled_at)
    .bind(booking.status)
    .bind(&booking.notes)
    .bind(Utc::now())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(id)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::service::NewService;
    use crate::{Database, DbConfig};

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    async fn setup() -> (Database, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let service_id = db
            .services()
            .insert(&NewService {
                tenant_id: None,
                store_id: None,
                title: "Massage".into(),
                description: None,
                price: Money::from_major(8000),
                duration_minutes: 60,
                availability: None,
            })
            .await
            .unwrap();
        (db, service_id)
    }

    fn booking(service_id: i64, at: NaiveDateTime, status: BookingStatus) -> NewBooking {
        NewBooking {
            tenant_id: None,
            store_id: None,
            service_id,
            customer_id: None,
            payment_transaction_id: None,
            service_title: "Massage".into(),
            service_description: None,
            duration_minutes: Some(60),
            price: Money::from_major(8000),
            scheduled_at: at,
            status,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_blocking_on_day_filters_day_and_status() {
        let (db, service_id) = setup().await;
        let repo = db.bookings();

        repo.insert(&booking(service_id, at(2, 9, 0), BookingStatus::Confirmed)).await.unwrap();
        repo.insert(&booking(service_id, at(2, 11, 0), BookingStatus::Cancelled)).await.unwrap();
        repo.insert(&booking(service_id, at(3, 9, 0), BookingStatus::Pending)).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2026, 2, 2).unwrap();
        let found = repo
            .blocking_on_day(&TenantScope::Isolated, service_id, None, day)
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].scheduled_at, at(2, 9, 0));
        assert_eq!(found[0].status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_manual_bookings_without_payment_do_not_collide() {
        let (db, service_id) = setup().await;
        let repo = db.bookings();

        // NULL payment_transaction_id is exempt from the unique index
        assert!(repo.insert(&booking(service_id, at(2, 9, 0), BookingStatus::Pending)).await.unwrap().is_some());
        assert!(repo.insert(&booking(service_id, at(2, 10, 0), BookingStatus::Pending)).await.unwrap().is_some());
    }
}
