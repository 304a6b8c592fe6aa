//! # Unit of Work
//!
//! One connection threaded through a critical section.
//!
//! ## Two Modes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Locked (verify path)                 Autocommit (webhook path)        │
//! │  ─────────────────────                ──────────────────────────       │
//! │  BEGIN                                (no BEGIN)                        │
//! │  lock_by_reference  ← write lock      transition_if_pending  ← CAS     │
//! │  re-check status                      mark_order_paid        ← CAS     │
//! │  update_status                        insert_booking         ← UNIQUE  │
//! │  reconciliation side effects                                           │
//! │  COMMIT  (or drop → ROLLBACK)                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repository functions take `&mut SqliteConnection`, so the same
//! reconciliation code runs unchanged in either mode.

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, Transaction};
use tracing::debug;

use crate::error::DbResult;

enum Session {
    Locked(Transaction<'static, Sqlite>),
    Autocommit(PoolConnection<Sqlite>),
}

/// A connection scoped to one critical section.
pub struct UnitOfWork {
    session: Session,
}

impl UnitOfWork {
    pub(crate) fn locked(tx: Transaction<'static, Sqlite>) -> Self {
        UnitOfWork {
            session: Session::Locked(tx),
        }
    }

    pub(crate) fn autocommit(conn: PoolConnection<Sqlite>) -> Self {
        UnitOfWork {
            session: Session::Autocommit(conn),
        }
    }

    /// The connection every repository call in this section goes through.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        match &mut self.session {
            Session::Locked(tx) => &mut **tx,
            Session::Autocommit(conn) => &mut **conn,
        }
    }

    /// True if writes are held back until [`UnitOfWork::commit`].
    pub fn is_transactional(&self) -> bool {
        matches!(self.session, Session::Locked(_))
    }

    /// Commits a locked section. No-op for autocommit.
    pub async fn commit(self) -> DbResult<()> {
        match self.session {
            Session::Locked(tx) => {
                tx.commit().await?;
                debug!("Unit of work committed");
            }
            Session::Autocommit(_) => {}
        }
        Ok(())
    }

    /// Rolls back a locked section. No-op for autocommit.
    pub async fn rollback(self) -> DbResult<()> {
        match self.session {
            Session::Locked(tx) => {
                tx.rollback().await?;
                debug!("Unit of work rolled back");
            }
            Session::Autocommit(_) => {}
        }
        Ok(())
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("transactional", &self.is_transactional())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut uow = db.begin().await.unwrap();
        assert!(uow.is_transactional());
        sqlx::query(
            "INSERT INTO tenants (id, name, tier, is_active, created_at) \
             VALUES ('t-rb', 'Rollback', 'shared', 1, '2026-01-01T00:00:00Z')",
        )
        .execute(uow.conn())
        .await
        .unwrap();
        uow.rollback().await.unwrap();

        assert!(db.tenants().get("t-rb").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_keeps_writes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut uow = db.begin().await.unwrap();
        sqlx::query(
            "INSERT INTO tenants (id, name, tier, is_active, created_at) \
             VALUES ('t-ok', 'Commit', 'shared', 1, '2026-01-01T00:00:00Z')",
        )
        .execute(uow.conn())
        .await
        .unwrap();
        uow.commit().await.unwrap();

        assert!(db.tenants().get("t-ok").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_autocommit_is_not_transactional() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let uow = db.autocommit().await.unwrap();
        assert!(!uow.is_transactional());
        uow.commit().await.unwrap();
    }
}
