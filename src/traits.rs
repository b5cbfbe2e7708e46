use async_trait::async_trait;
use sea_orm::DatabaseTransaction;

use crate::error::NestedSetError;

/// Callback run inside the deleting transaction with every node id about to
/// be removed (the node itself first, then its descendants in tree order).
///
/// Use it to clean up rows in other tables that reference tree nodes. Returning
/// an error rolls the whole deletion back.
#[async_trait]
pub trait DeletionHook: Send + Sync {
    async fn before_delete(
        &self,
        txn: &DatabaseTransaction,
        node_ids: &[i32],
    ) -> Result<(), NestedSetError>;
}
