//! # Service Repository
//!
//! Bookable services and their relational availability rows.
//!
//! ## Picking the Availability Source
//! ```text
//! load service ──► availability_json covers weekday? ──yes──► Inline(schedule)
//!                                  │
//!                                  no
//!                                  ▼
//!                  availability_slots for (service, weekday) ──► Relational(rows)
//! ```

use chrono::{NaiveTime, Utc, Weekday};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use bookpay_core::availability::{AvailabilitySlot, AvailabilitySource, WeeklySchedule};
use bookpay_core::{Money, Service, TenantScope};

const SLOT_TIME_FORMAT: &str = "%H:%M";

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ServiceRow {
    id: i64,
    tenant_id: Option<String>,
    store_id: Option<i64>,
    title: String,
    description: Option<String>,
    price: i64,
    duration_minutes: i64,
    availability_json: Option<String>,
    is_active: bool,
}

impl TryFrom<ServiceRow> for Service {
    type Error = DbError;

    fn try_from(row: ServiceRow) -> DbResult<Self> {
        let availability = match row.availability_json.as_deref().map(str::trim) {
            None | Some("") | Some("null") => None,
            Some(raw) => Some(
                serde_json::from_str::<WeeklySchedule>(raw)
                    .map_err(|e| DbError::corrupt("availability_json", e))?,
            ),
        };

        Ok(Service {
            id: row.id,
            tenant_id: row.tenant_id,
            store_id: row.store_id,
            title: row.title,
            description: row.description,
            price: Money::from_minor(row.price),
            duration_minutes: row.duration_minutes,
            availability,
            is_active: row.is_active,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SlotRow {
    id: i64,
    service_id: i64,
    day_of_week: i64,
    start_time: String,
    end_time: String,
    is_available: bool,
}

impl TryFrom<SlotRow> for AvailabilitySlot {
    type Error = DbError;

    fn try_from(row: SlotRow) -> DbResult<Self> {
        Ok(AvailabilitySlot {
            id: row.id,
            service_id: row.service_id,
            day_of_week: u32::try_from(row.day_of_week)
                .map_err(|e| DbError::corrupt("day_of_week", e))?,
            start_time: parse_slot_time("start_time", &row.start_time)?,
            end_time: parse_slot_time("end_time", &row.end_time)?,
            is_available: row.is_available,
        })
    }
}

/// Slot times are stored as `HH:MM`; `HH:MM:SS` is tolerated.
fn parse_slot_time(column: &str, raw: &str) -> DbResult<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, SLOT_TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|e| DbError::corrupt(column, format!("'{raw}': {e}")))
}

// =============================================================================
// Inputs
// =============================================================================

/// Fields for creating a service (seed / tests; services are managed by
/// the catalogue module in production).
#[derive(Debug, Clone)]
pub struct NewService {
    pub tenant_id: Option<String>,
    pub store_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub price: Money,
    pub duration_minutes: i64,
    pub availability: Option<WeeklySchedule>,
}

/// Fields for a weekly availability row.
#[derive(Debug, Clone)]
pub struct NewAvailabilitySlot {
    pub tenant_id: Option<String>,
    pub service_id: i64,
    pub store_id: Option<i64>,
    pub weekday: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for services and availability.
#[derive(Debug, Clone)]
pub struct ServiceRepository {
    pool: SqlitePool,
}

impl ServiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ServiceRepository { pool }
    }

    pub async fn get(&self, scope: &TenantScope, id: i64) -> DbResult<Option<Service>> {
        let mut conn = self.pool.acquire().await?;
        get(&mut conn, scope, id).await
    }

    /// Loads the availability source for a service on one weekday.
    pub async fn availability_for(
        &self,
        scope: &TenantScope,
        service: &Service,
        store_id: Option<i64>,
        weekday: Weekday,
    ) -> DbResult<AvailabilitySource> {
        let mut conn = self.pool.acquire().await?;
        availability_for(&mut conn, scope, service, store_id, weekday).await
    }

    pub async fn insert(&self, service: &NewService) -> DbResult<i64> {
        let availability_json = service
            .availability
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DbError::corrupt("availability_json", e))?;

        debug!(title = %service.title, "Inserting service");

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO services (
                tenant_id, store_id, title, description, price,
                duration_minutes, availability_json, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8)
            RETURNING id
            "#,
        )
        .bind(&service.tenant_id)
        .bind(service.store_id)
        .bind(&service.title)
        .bind(&service.description)
        .bind(service.price.minor())
        .bind(service.duration_minutes)
        .bind(availability_json)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn insert_slot(&self, slot: &NewAvailabilitySlot) -> DbResult<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO availability_slots (
                tenant_id, service_id, store_id, day_of_week,
                start_time, end_time, is_available
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING id
            "#,
        )
        .bind(&slot.tenant_id)
        .bind(slot.service_id)
        .bind(slot.store_id)
        .bind(slot.weekday.num_days_from_sunday() as i64)
        .bind(slot.start_time.format(SLOT_TIME_FORMAT).to_string())
        .bind(slot.end_time.format(SLOT_TIME_FORMAT).to_string())
        .bind(slot.is_available)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }
}

// =============================================================================
// Connection-level operations
// =============================================================================

/// Gets an active service within the tenant scope.
pub async fn get(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    id: i64,
) -> DbResult<Option<Service>> {
    let row: Option<ServiceRow> = sqlx::query_as(
        r#"
        SELECT id, tenant_id, store_id, title, description, price,
               duration_minutes, availability_json, is_active
        FROM services
        WHERE id = ?1 AND tenant_id IS ?2 AND is_active = 1
        "#,
    )
    .bind(id)
    .bind(scope.tenant_id())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Service::try_from).transpose()
}

/// Relational availability rows for a service on one weekday.
///
/// Rows bound to a different store are excluded when `store_id` is given;
/// rows with no store apply to every store.
pub async fn slots_for_day(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    service_id: i64,
    store_id: Option<i64>,
    weekday: Weekday,
) -> DbResult<Vec<AvailabilitySlot>> {
    let rows: Vec<SlotRow> = sqlx::query_as(
        r#"
        SELECT id, service_id, day_of_week, start_time, end_time, is_available
        FROM availability_slots
        WHERE service_id = ?1
          AND tenant_id IS ?2
          AND day_of_week = ?3
          AND is_available = 1
          AND (?4 IS NULL OR store_id IS NULL OR store_id = ?4)
        ORDER BY start_time
        "#,
    )
    .bind(service_id)
    .bind(scope.tenant_id())
    .bind(weekday.num_days_from_sunday() as i64)
    .bind(store_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(AvailabilitySlot::try_from).collect()
}

/// Chooses the authoritative availability source for one lookup.
pub async fn availability_for(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    service: &Service,
    store_id: Option<i64>,
    weekday: Weekday,
) -> DbResult<AvailabilitySource> {
    if let Some(schedule) = service.availability.as_ref().filter(|s| s.covers(weekday)) {
        return Ok(AvailabilitySource::Inline(schedule.clone()));
    }
    let slots = slots_for_day(conn, scope, service.id, store_id, weekday).await?;
    Ok(AvailabilitySource::Relational(slots))
}

// =============================================================================
// Unit Tests
// =============================================================================
