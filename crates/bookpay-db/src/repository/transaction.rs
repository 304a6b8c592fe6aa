//! # Payment Transaction Repository
//!
//! Persistence for the transaction state machine.
//!
//! ## Write Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  initialize   insert()                    → pending row                 │
//! │               record_initialization()     → provider payload attached   │
//! │                                                                         │
//! │  verify       lock_by_reference()         → write lock held by this tx  │
//! │  (locked)     update_status()             → unconditional, lock held    │
//! │                                                                         │
//! │  webhook      insert_reconstructed()      → ON CONFLICT DO NOTHING      │
//! │  (autocommit) transition_if_pending()     → WHERE status = 'pending'    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locking on SQLite
//! SQLite has no `SELECT ... FOR UPDATE`. [`lock_by_reference`] issues a no-op
//! UPDATE on the row first: the first write in a transaction takes the
//! database write lock, so a second locker waits (busy timeout) until the
//! first commits, then re-reads committed state.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use bookpay_core::{
    GatewayName, Money, PaymentMetadata, PaymentTransaction, TenantScope, TransactionStatus,
};

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    reference: String,
    tenant_id: Option<String>,
    order_id: Option<i64>,
    invoice_id: Option<i64>,
    gateway_name: GatewayName,
    gateway_transaction_id: Option<String>,
    amount: i64,
    currency: String,
    platform_fee: i64,
    merchant_amount: i64,
    customer_email: String,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    status: TransactionStatus,
    gateway_response: Option<String>,
    metadata: String,
    failure_reason: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for PaymentTransaction {
    type Error = DbError;

    fn try_from(row: TransactionRow) -> DbResult<Self> {
        let metadata: PaymentMetadata = if row.metadata.trim().is_empty() {
            PaymentMetadata::default()
        } else {
            serde_json::from_str(&row.metadata).map_err(|e| DbError::corrupt("metadata", e))?
        };
        let gateway_response = row
            .gateway_response
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| DbError::corrupt("gateway_response", e))?;

        Ok(PaymentTransaction {
            id: row.id,
            reference: row.reference,
            tenant_id: row.tenant_id,
            order_id: row.order_id,
            invoice_id: row.invoice_id,
            gateway_name: row.gateway_name,
            gateway_transaction_id: row.gateway_transaction_id,
            amount: Money::from_minor(row.amount),
            currency: row.currency,
            platform_fee: Money::from_minor(row.platform_fee),
            merchant_amount: Money::from_minor(row.merchant_amount),
            customer_email: row.customer_email,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            status: row.status,
            gateway_response,
            metadata,
            failure_reason: row.failure_reason,
            paid_at: row.paid_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_TRANSACTION: &str = r#"
    SELECT id, reference, tenant_id, order_id, invoice_id, gateway_name,
           gateway_transaction_id, amount, currency, platform_fee, merchant_amount,
           customer_email, customer_name, customer_phone, status, gateway_response,
           metadata, failure_reason, paid_at, created_at, updated_at
    FROM payment_transactions
"#;

// =============================================================================
// Inputs
// =============================================================================

/// A transaction about to be written.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub reference: String,
    pub tenant_id: Option<String>,
    pub order_id: Option<i64>,
    pub invoice_id: Option<i64>,
    pub gateway_name: GatewayName,
    pub gateway_transaction_id: Option<String>,
    pub amount: Money,
    pub currency: String,
    pub platform_fee: Money,
    pub merchant_amount: Money,
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub status: TransactionStatus,
    pub gateway_response: Option<serde_json::Value>,
    pub metadata: PaymentMetadata,
    pub paid_at: Option<DateTime<Utc>>,
}

/// New state for a row that is moving out of `pending`.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub status: TransactionStatus,
    pub gateway_transaction_id: Option<String>,
    pub gateway_response: Option<serde_json::Value>,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

fn to_json_text<T: serde::Serialize>(column: &str, value: &T) -> DbResult<String> {
    serde_json::to_string(value).map_err(|e| DbError::corrupt(column, e))
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for payment transactions.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    pub async fn insert(&self, tx: &NewTransaction) -> DbResult<PaymentTransaction> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, tx).await
    }

    /// Gets a transaction by reference within a tenant scope.
    pub async fn get_by_reference(
        &self,
        scope: &TenantScope,
        reference: &str,
    ) -> DbResult<Option<PaymentTransaction>> {
        let sql = format!("{SELECT_TRANSACTION} WHERE reference = ?1 AND tenant_id IS ?2");
        let row: Option<TransactionRow> = sqlx::query_as(&sql)
            .bind(reference)
            .bind(scope.tenant_id())
            .fetch_optional(&self.pool)
            .await?;
        row.map(PaymentTransaction::try_from).transpose()
    }

    /// Gets a transaction by reference regardless of tenant.
    ///
    /// Only for provider-driven paths, where the reference itself is the
    /// authenticated identity.
    pub async fn find_by_reference(&self, reference: &str) -> DbResult<Option<PaymentTransaction>> {
        let mut conn = self.pool.acquire().await?;
        find_by_reference(&mut conn, reference).await
    }

    /// Attaches the provider's initialization payload to a pending row.
    pub async fn record_initialization(
        &self,
        id: i64,
        gateway_transaction_id: Option<&str>,
        gateway_response: &serde_json::Value,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE payment_transactions SET
                gateway_transaction_id = COALESCE(?2, gateway_transaction_id),
                gateway_response = ?3,
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(gateway_transaction_id)
        .bind(to_json_text("gateway_response", gateway_response)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Marks a pending row failed because the provider could not start it.
    pub async fn fail_pending(&self, id: i64, reason: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payment_transactions SET
                status = 'failed',
                failure_reason = ?2,
                updated_at = ?3
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payment_transactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Connection-level operations
// =============================================================================

/// Inserts a new transaction and returns the stored row.
pub async fn insert(conn: &mut SqliteConnection, tx: &NewTransaction) -> DbResult<PaymentTransaction> {
    debug!(reference = %tx.reference, status = %tx.status, "Inserting transaction");

    let sql = format!(
        "INSERT INTO payment_transactions (
            reference, tenant_id, order_id, invoice_id, gateway_name, gateway_transaction_id,
            amount, currency, platform_fee, merchant_amount,
            customer_email, customer_name, customer_phone, status,
            gateway_response, metadata, paid_at, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?18)
        RETURNING {}",
        RETURNED_COLUMNS
    );

    let row: TransactionRow = bind_new(sqlx::query_as(&sql), tx)?
        .fetch_one(&mut *conn)
        .await?;
    row.try_into()
}

/// Inserts a transaction rebuilt from a webhook unless the reference exists.
///
/// Returns the new row, or `None` if another path created it first.
pub async fn insert_reconstructed(
    conn: &mut SqliteConnection,
    tx: &NewTransaction,
) -> DbResult<Option<PaymentTransaction>> {
    debug!(reference = %tx.reference, "Reconstructing transaction from webhook");

    let sql = format!(
        "INSERT INTO payment_transactions (
            reference, tenant_id, order_id, invoice_id, gateway_name, gateway_transaction_id,
            amount, currency, platform_fee, merchant_amount,
            customer_email, customer_name, customer_phone, status,
            gateway_response, metadata, paid_at, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?18)
        ON CONFLICT(reference) DO NOTHING
        RETURNING {}",
        RETURNED_COLUMNS
    );

    let row: Option<TransactionRow> = bind_new(sqlx::query_as(&sql), tx)?
        .fetch_optional(&mut *conn)
        .await?;
    row.map(PaymentTransaction::try_from).transpose()
}

const RETURNED_COLUMNS: &str = "id, reference, tenant_id, order_id, invoice_id, gateway_name, \
    gateway_transaction_id, amount, currency, platform_fee, merchant_amount, \
    customer_email, customer_name, customer_phone, status, gateway_response, \
    metadata, failure_reason, paid_at, created_at, updated_at";

type RowQuery<'q> = sqlx::query::QueryAs<'q, sqlx::Sqlite, TransactionRow, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_new<'q>(query: RowQuery<'q>, tx: &'q NewTransaction) -> DbResult<RowQuery<'q>> {
    let metadata = to_json_text("metadata", &tx.metadata)?;
    let gateway_response = tx
        .gateway_response
        .as_ref()
        .map(|v| to_json_text("gateway_response", v))
        .transpose()?;

    Ok(query
        .bind(&tx.reference)
        .bind(&tx.tenant_id)
        .bind(tx.order_id)
        .bind(tx.invoice_id)
        .bind(tx.gateway_name)
        .bind(&tx.gateway_transaction_id)
        .bind(tx.amount.minor())
        .bind(&tx.currency)
        .bind(tx.platform_fee.minor())
        .bind(tx.merchant_amount.minor())
        .bind(&tx.customer_email)
        .bind(&tx.customer_name)
        .bind(&tx.customer_phone)
        .bind(tx.status)
        .bind(gateway_response)
        .bind(metadata)
        .bind(tx.paid_at)
        .bind(Utc::now()))
}

/// Gets a transaction by reference, no tenant filter.
pub async fn find_by_reference(
    conn: &mut SqliteConnection,
    reference: &str,
) -> DbResult<Option<PaymentTransaction>> {
    let sql = format!("{SELECT_TRANSACTION} WHERE reference = ?1");
    let row: Option<TransactionRow> = sqlx::query_as(&sql)
        .bind(reference)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(PaymentTransaction::try_from).transpose()
}

/// Takes the write lock on a transaction row and reads it back.
///
/// Must run on a transactional [`UnitOfWork`](crate::UnitOfWork) and be its
/// first statement; the lock is held until commit or rollback.
pub async fn lock_by_reference(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    reference: &str,
) -> DbResult<Option<PaymentTransaction>> {
    let touched = sqlx::query(
        "UPDATE payment_transactions SET updated_at = updated_at \
         WHERE reference = ?1 AND tenant_id IS ?2",
    )
    .bind(reference)
    .bind(scope.tenant_id())
    .execute(&mut *conn)
    .await?;

    if touched.rows_affected() == 0 {
        return Ok(None);
    }

    debug!(reference, "Transaction row locked");
    find_by_reference(conn, reference).await
}

/// Writes the new status of a locked row.
pub async fn update_status(
    conn: &mut SqliteConnection,
    id: i64,
    update: &StatusUpdate,
) -> DbResult<()> {
    let gateway_response = update
        .gateway_response
        .as_ref()
        .map(|v| to_json_text("gateway_response", v))
        .transpose()?;

    let result = sqlx::query(
        r#"
        UPDATE payment_transactions SET
            status = ?2,
            gateway_transaction_id = COALESCE(?3, gateway_transaction_id),
            gateway_response = COALESCE(?4, gateway_response),
            failure_reason = ?5,
            paid_at = COALESCE(?6, paid_at),
            updated_at = ?7
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(update.status)
    .bind(&update.gateway_transaction_id)
    .bind(gateway_response)
    .bind(&update.failure_reason)
    .bind(update.paid_at)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("PaymentTransaction", id.to_string()));
    }
    Ok(())
}

/// Compare-and-set: moves the row out of `pending` only if it is still there.
///
/// Returns true if this call made the transition.
pub async fn transition_if_pending(
    conn: &mut SqliteConnection,
    reference: &str,
    update: &StatusUpdate,
) -> DbResult<bool> {
    let gateway_response = update
        .gateway_response
        .as_ref()
        .map(|v| to_json_text("gateway_response", v))
        .transpose()?;

    let result = sqlx::query(
        r#"
        UPDATE payment_transactions SET
            status = ?2,
            gateway_transaction_id = COALESCE(?3, gateway_transaction_id),
            gateway_response = COALESCE(?4, gateway_response),
            failure_reason = ?5,
            paid_at = COALESCE(?6, paid_at),
            updated_at = ?7
        WHERE reference = ?1 AND status = 'pending'
        "#,
    )
    .bind(reference)
    .bind(update.status)
    .bind(&update.gateway_transaction_id)
    .bind(gateway_response)
    .bind(&update.failure_reason)
    .bind(update.paid_at)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    let won = result.rows_affected() > 0;
    debug!(reference, status = %update.status, won, "Conditional status transition");
    Ok(won)
}

// =============================================================================
// Unit Tests
// =============================================================================
