use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Schema};

use crate::error::NestedSetError;
use crate::node;

/// Create the `tree_nodes` table and its `(root_id, left_bound)` index if missing.
pub async fn create_tree_table<C: ConnectionTrait>(conn: &C) -> Result<(), NestedSetError> {
    let backend = conn.get_database_backend();

    let mut table = Schema::new(backend).create_table_from_entity(node::Entity);
    table.if_not_exists();
    conn.execute(backend.build(&table)).await?;

    let index = Index::create()
        .if_not_exists()
        .name("idx_tree_nodes_root_left")
        .table(node::Entity)
        .col(node::Column::RootId)
        .col(node::Column::LeftBound)
        .to_owned();
    conn.execute(backend.build(&index)).await?;

    Ok(())
}
