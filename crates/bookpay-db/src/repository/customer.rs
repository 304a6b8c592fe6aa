//! # Customer Repository
//!
//! Idempotent customer resolution for booking payments.
//!
//! ## Lookup Order
//! ```text
//! email given? ──► match by email (case-insensitive) ──► found → reuse
//!      │
//! phone given? ──► match by phone ──► found → reuse
//!      │
//!      └──────────► insert new (name from caller)
//!                       │
//!                       └── UNIQUE(tenant, email) lost a race → re-read by email
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use bookpay_core::{Customer, TenantScope};

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i64,
    tenant_id: Option<String>,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            tenant_id: row.tenant_id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            created_at: row.created_at,
        }
    }
}

/// Contact details a payment carries about its payer.
#[derive(Debug, Clone, Default)]
pub struct CustomerContact {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn find_or_create(
        &self,
        scope: &TenantScope,
        contact: &CustomerContact,
    ) -> DbResult<Customer> {
        let mut conn = self.pool.acquire().await?;
        find_or_create(&mut conn, scope, contact).await
    }

    pub async fn count(&self, scope: &TenantScope) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers WHERE tenant_id IS ?1")
            .bind(scope.tenant_id())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Connection-level operations
// =============================================================================

async fn find_by_email(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    email: &str,
) -> DbResult<Option<Customer>> {
    let row: Option<CustomerRow> = sqlx::query_as(
        r#"
        SELECT id, tenant_id, name, email, phone, created_at
        FROM customers
        WHERE tenant_id IS ?1 AND email = ?2
        LIMIT 1
        "#,
    )
    .bind(scope.tenant_id())
    .bind(email)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(Customer::from))
}

async fn find_by_phone(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    phone: &str,
) -> DbResult<Option<Customer>> {
    let row: Option<CustomerRow> = sqlx::query_as(
        r#"
        SELECT id, tenant_id, name, email, phone, created_at
        FROM customers
        WHERE tenant_id IS ?1 AND phone = ?2
        ORDER BY id
        LIMIT 1
        "#,
    )
    .bind(scope.tenant_id())
    .bind(phone)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(Customer::from))
}

/// Resolves the customer by email, then phone, else creates one.
pub async fn find_or_create(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    contact: &CustomerContact,
) -> DbResult<Customer> {
    let email = contact
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());
    let phone = contact
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    if let Some(email) = email.as_deref() {
        if let Some(found) = find_by_email(conn, scope, email).await? {
            return Ok(found);
        }
    }
    if let Some(phone) = phone.as_deref() {
        if let Some(found) = find_by_phone(conn, scope, phone).await? {
            return Ok(found);
        }
    }

    debug!(tenant_id = ?scope.tenant_id(), "Creating customer");

    let inserted: DbResult<CustomerRow> = sqlx::query_as(
        r#"
        INSERT INTO customers (tenant_id, name, email, phone, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        RETURNING id, tenant_id, name, email, phone, created_at
        "#,
    )
    .bind(scope.tenant_id())
    .bind(contact.name.trim())
    .bind(email.as_deref())
    .bind(phone.as_deref())
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
    .map_err(Into::into);

    match (inserted, email.as_deref()) {
        (Ok(row), _) => Ok(row.into()),
        (Err(err), Some(email)) if err.is_unique_violation() => {
            debug!("Customer created concurrently, re-reading by email");
            find_by_email(conn, scope, email)
                .await?
                .ok_or(err)
        }
        (Err(err), _) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn contact(name: &str, email: Option<&str>, phone: Option<&str>) -> CustomerContact {
        CustomerContact {
            name: name.into(),
            email: email.map(Into::into),
            phone: phone.map(Into::into),
        }
    }

    #[tokio::test]
    async fn test_email_then_phone_then_create() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();
        let scope = TenantScope::Isolated;

        let ada = repo
            .find_or_create(&scope, &contact("Ada", Some("Ada@Example.com"), Some("0801")))
            .await
            .unwrap();
        assert_eq!(ada.email.as_deref(), Some("ada@example.com"));

        // Same email, different case: reused
        let again = repo
            .find_or_create(&scope, &contact("Ada L.", Some("ada@example.com"), None))
            .await
            .unwrap();
        assert_eq!(again.id, ada.id);

        // No email, same phone: reused
        let by_phone = repo
            .find_or_create(&scope, &contact("A", None, Some(" 0801 ")))
            .await
            .unwrap();
        assert_eq!(by_phone.id, ada.id);

        // Name only: always new
        let walk_in = repo.find_or_create(&scope, &contact("Walk-in", None, None)).await.unwrap();
        assert_ne!(walk_in.id, ada.id);
        assert_eq!(repo.count(&scope).await.unwrap(), 2);
    }
}
