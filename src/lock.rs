use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, Statement,
    TransactionTrait, Value,
};

use crate::config::AdvisoryLockStrategy;
use crate::error::NestedSetError;

/// A transaction that holds a transaction-scoped PostgreSQL advisory lock.
///
/// The lock is taken with `pg_advisory_xact_lock`, so PostgreSQL drops it at
/// commit or rollback, including rollbacks of transactions already aborted by
/// a failed statement. Other backends get a plain transaction and rely on
/// their own isolation to serialise conflicting range updates.
pub struct LockedTransaction {
    txn: DatabaseTransaction,
    lock_id: Option<i64>,
}

impl LockedTransaction {
    pub async fn acquire(
        strategy: &AdvisoryLockStrategy,
        db: &DatabaseConnection,
    ) -> Result<Self, NestedSetError> {
        let lock_id = strategy
            .key()
            .map(|key| key.id())
            .filter(|_| db.get_database_backend() == DbBackend::Postgres);

        let txn = db.begin().await?;

        if let Some(lock_id) = lock_id {
            let locked = txn
                .execute(Statement::from_sql_and_values(
                    DbBackend::Postgres,
                    "SELECT pg_advisory_xact_lock($1)",
                    vec![Value::from(lock_id)],
                ))
                .await;
            if let Err(err) = locked {
                let _ = txn.rollback().await;
                return Err(err.into());
            }
        }

        Ok(Self { txn, lock_id })
    }

    pub fn connection(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Advisory lock id held until the transaction ends, if any.
    pub fn lock_id(&self) -> Option<i64> {
        self.lock_id
    }

    pub async fn commit(self) -> Result<(), NestedSetError> {
        self.txn.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), NestedSetError> {
        self.txn.rollback().await?;
        Ok(())
    }
}
