//! # Order & Invoice Repository
//!
//! The two settlement targets a payment can reconcile. Both "mark paid"
//! operations are compare-and-set updates: they report whether THIS call
//! changed the row, which is what gates the confirmation email.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use bookpay_core::{Invoice, Money, Order, TenantScope};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    tenant_id: Option<String>,
    order_number: String,
    customer_email: Option<String>,
    customer_name: Option<String>,
    total: i64,
    status: String,
    payment_status: String,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            tenant_id: row.tenant_id,
            order_number: row.order_number,
            customer_email: row.customer_email,
            customer_name: row.customer_name,
            total: Money::from_minor(row.total),
            status: row.status,
            payment_status: row.payment_status,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: i64,
    tenant_id: Option<String>,
    invoice_number: String,
    total: i64,
    status: String,
}

impl From<InvoiceRow> for Invoice {
    fn from(row: InvoiceRow) -> Self {
        Invoice {
            id: row.id,
            tenant_id: row.tenant_id,
            invoice_number: row.invoice_number,
            total: Money::from_minor(row.total),
            status: row.status,
        }
    }
}

/// Repository for orders and invoices.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    pub async fn get_order(&self, scope: &TenantScope, id: i64) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        get_order(&mut conn, scope, id).await
    }

    pub async fn get_invoice(&self, scope: &TenantScope, id: i64) -> DbResult<Option<Invoice>> {
        let row: Option<InvoiceRow> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, invoice_number, total, status
            FROM invoices
            WHERE id = ?1 AND tenant_id IS ?2
            "#,
        )
        .bind(id)
        .bind(scope.tenant_id())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Invoice::from))
    }

    /// Creates an unpaid order (seed / tests).
    pub async fn insert_order(
        &self,
        scope: &TenantScope,
        order_number: &str,
        customer_email: Option<&str>,
        customer_name: Option<&str>,
        total: Money,
    ) -> DbResult<i64> {
        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (
                tenant_id, order_number, customer_email, customer_name, total,
                status, payment_status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 'pending', 'unpaid', ?6, ?6)
            RETURNING id
            "#,
        )
        .bind(scope.tenant_id())
        .bind(order_number)
        .bind(customer_email)
        .bind(customer_name)
        .bind(total.minor())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Creates an unpaid invoice (seed / tests).
    pub async fn insert_invoice(
        &self,
        scope: &TenantScope,
        invoice_number: &str,
        total: Money,
    ) -> DbResult<i64> {
        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO invoices (tenant_id, invoice_number, total, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, 'sent', ?4, ?4)
            RETURNING id
            "#,
        )
        .bind(scope.tenant_id())
        .bind(invoice_number)
        .bind(total.minor())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }
}

// =============================================================================
// Connection-level operations
// =============================================================================

pub async fn get_order(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    id: i64,
) -> DbResult<Option<Order>> {
    let row: Option<OrderRow> = sqlx::query_as(
        r#"
        SELECT id, tenant_id, order_number, customer_email, customer_name,
               total, status, payment_status
        FROM orders
        WHERE id = ?1 AND tenant_id IS ?2
        "#,
    )
    .bind(id)
    .bind(scope.tenant_id())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(Order::from))
}

/// Marks an order paid and confirmed unless it already is.
///
/// Returns true only if this call changed the row.
pub async fn mark_order_paid(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    order_id: i64,
    reference: &str,
    paid_at: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET
            payment_status = 'paid',
            status = 'confirmed',
            payment_reference = ?3,
            paid_at = ?4,
            updated_at = ?4
        WHERE id = ?1 AND tenant_id IS ?2 AND payment_status != 'paid'
        "#,
    )
    .bind(order_id)
    .bind(scope.tenant_id())
    .bind(reference)
    .bind(paid_at)
    .execute(&mut *conn)
    .await?;

    let changed = result.rows_affected() > 0;
    debug!(order_id, changed, "Order paid update");
    Ok(changed)
}

/// Marks an invoice paid unless it already is.
///
/// Returns true only if this call changed the row.
pub async fn mark_invoice_paid(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    invoice_id: i64,
    paid_at: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE invoices SET
            status = 'paid',
            paid_at = ?3,
            updated_at = ?3
        WHERE id = ?1 AND tenant_id IS ?2 AND status != 'paid'
        "#,
    )
    .bind(invoice_id)
    .bind(scope.tenant_id())
    .bind(paid_at)
    .execute(&mut *conn)
    .await?;

    let changed = result.rows_affected() > 0;
    debug!(invoice_id, changed, "Invoice paid update");
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_mark_order_paid_only_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let scope = TenantScope::Isolated;
        let id = db
            .orders()
            .insert_order(&scope, "ORD-1", Some("a@b.com"), None, Money::from_major(100))
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(mark_order_paid(&mut conn, &scope, id, "TXN-1", Utc::now()).await.unwrap());
        assert!(!mark_order_paid(&mut conn, &scope, id, "TXN-1", Utc::now()).await.unwrap());
        drop(conn);

        let order = db.orders().get_order(&scope, id).await.unwrap().unwrap();
        assert_eq!(order.payment_status, "paid");
        assert_eq!(order.status, "confirmed");
    }

    #[tokio::test]
    async fn test_mark_invoice_paid_respects_scope() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let scope = TenantScope::Isolated;
        let id = db
            .orders()
            .insert_invoice(&scope, "INV-1", Money::from_major(100))
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let other = TenantScope::Tenant("someone-else".into());
        assert!(!mark_invoice_paid(&mut conn, &other, id, Utc::now()).await.unwrap());
        assert!(mark_invoice_paid(&mut conn, &scope, id, Utc::now()).await.unwrap());
        assert!(!mark_invoice_paid(&mut conn, &scope, id, Utc::now()).await.unwrap());
        drop(conn);

        let invoice = db.orders().get_invoice(&scope, id).await.unwrap().unwrap();
        assert_eq!(invoice.status, "paid");
    }
}
