//! # Tenant Repository
//!
//! Tenant lookups. Tenants are provisioned elsewhere; this engine reads
//! them and the seed binary / tests insert them.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use bookpay_core::{Tenant, TenantTier};

#[derive(Debug, sqlx::FromRow)]
struct TenantRow {
    id: String,
    name: String,
    tier: TenantTier,
    subaccount_code: Option<String>,
    is_active: bool,
    contact_email: Option<String>,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Tenant {
            id: row.id,
            name: row.name,
            tier: row.tier,
            subaccount_code: row.subaccount_code,
            is_active: row.is_active,
            contact_email: row.contact_email,
        }
    }
}

/// Repository for tenant database operations.
#[derive(Debug, Clone)]
pub struct TenantRepository {
    pool: SqlitePool,
}

impl TenantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TenantRepository { pool }
    }

    /// Gets a tenant by ID, active or not.
    pub async fn get(&self, id: &str) -> DbResult<Option<Tenant>> {
        let mut conn = self.pool.acquire().await?;
        get(&mut conn, id).await
    }

    pub async fn insert(&self, tenant: &Tenant) -> DbResult<()> {
        debug!(id = %tenant.id, tier = tenant.tier.as_str(), "Inserting tenant");

        sqlx::query(
            r#"
            INSERT INTO tenants (id, name, tier, subaccount_code, is_active, contact_email, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&tenant.id)
        .bind(&tenant.name)
        .bind(tenant.tier)
        .bind(&tenant.subaccount_code)
        .bind(tenant.is_active)
        .bind(&tenant.contact_email)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Gets a tenant on an existing connection.
pub async fn get(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Tenant>> {
    let row: Option<TenantRow> = sqlx::query_as(
        r#"
        SELECT id, name, tier, subaccount_code, is_active, contact_email
        FROM tenants
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(Tenant::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tenant = Tenant {
            id: "t-1".into(),
            name: "Glow Salon".into(),
            tier: TenantTier::Dedicated,
            subaccount_code: Some("ACCT_1".into()),
            is_active: true,
            contact_email: None,
        };
        db.tenants().insert(&tenant).await.unwrap();

        let loaded = db.tenants().get("t-1").await.unwrap().unwrap();
        assert_eq!(loaded.name, "Glow Salon");
        assert_eq!(loaded.tier, TenantTier::Dedicated);
        assert_eq!(loaded.subaccount_code.as_deref(), Some("ACCT_1"));

        assert!(db.tenants().get("missing").await.unwrap().is_none());
    }
}
