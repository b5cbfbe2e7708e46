use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};

use crate::error::NestedSetError;
use crate::node::{self, NewNode, NodeBounds, NodeOwnership};
use crate::position::MoveCalculation;

/// Range-scoped reads and writes against the `tree_nodes` table.
///
/// Every boundary update is scoped to a single `root_id`; a mis-scoped
/// update would corrupt unrelated trees. Methods are generic over
/// [`ConnectionTrait`] so they run on a plain connection or inside a
/// transaction, and return affected row counts instead of judging them.
#[derive(Clone, Copy, Debug, Default)]
pub struct TreeStore;

impl TreeStore {
    pub fn new() -> Self {
        Self
    }

    /// Add `width` to `left_bound` of every node in `root_id` with `left_bound >= position`.
    pub async fn open_gap_left<C: ConnectionTrait>(
        &self,
        conn: &C,
        root_id: i32,
        position: i32,
        width: i32,
    ) -> Result<u64, NestedSetError> {
        let column = node::Column::LeftBound;
        self.shift(conn, root_id, column, column.gte(position), width)
            .await
    }

    /// Add `width` to `right_bound` of every node in `root_id` with `right_bound >= position`.
    pub async fn open_gap_right<C: ConnectionTrait>(
        &self,
        conn: &C,
        root_id: i32,
        position: i32,
        width: i32,
    ) -> Result<u64, NestedSetError> {
        let column = node::Column::RightBound;
        self.shift(conn, root_id, column, column.gte(position), width)
            .await
    }

    /// Subtract `width` from `left_bound` of every node in `root_id` with `left_bound > position`.
    pub async fn close_gap_left<C: ConnectionTrait>(
        &self,
        conn: &C,
        root_id: i32,
        position: i32,
        width: i32,
    ) -> Result<u64, NestedSetError> {
        let column = node::Column::LeftBound;
        self.shift(conn, root_id, column, column.gt(position), -width)
            .await
    }

    /// Subtract `width` from `right_bound` of every node in `root_id` with `right_bound > position`.
    pub async fn close_gap_right<C: ConnectionTrait>(
        &self,
        conn: &C,
        root_id: i32,
        position: i32,
        width: i32,
    ) -> Result<u64, NestedSetError> {
        let column = node::Column::RightBound;
        self.shift(conn, root_id, column, column.gt(position), -width)
            .await
    }

    async fn shift<C: ConnectionTrait>(
        &self,
        conn: &C,
        root_id: i32,
        column: node::Column,
        threshold: SimpleExpr,
        delta: i32,
    ) -> Result<u64, NestedSetError> {
        let result = node::Entity::update_many()
            .col_expr(column, Expr::col(column).add(delta))
            .filter(node::Column::RootId.eq(root_id))
            .filter(threshold)
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    /// Shift the subtree picked up at `calc.temp_anchor` by `calc.distance`,
    /// adjust its levels and move it into `destination_root`.
    ///
    /// Returns 0 when no row sits in the pickup range.
    pub async fn relocate_subtree<C: ConnectionTrait>(
        &self,
        conn: &C,
        moved: &NodeBounds,
        destination_root: i32,
        calc: &MoveCalculation,
        level_delta: i32,
    ) -> Result<u64, NestedSetError> {
        let result = node::Entity::update_many()
            .col_expr(
                node::Column::LeftBound,
                Expr::col(node::Column::LeftBound).add(calc.distance),
            )
            .col_expr(
                node::Column::RightBound,
                Expr::col(node::Column::RightBound).add(calc.distance),
            )
            .col_expr(
                node::Column::Level,
                Expr::col(node::Column::Level).add(level_delta),
            )
            .col_expr(node::Column::RootId, Expr::value(destination_root))
            .filter(node::Column::RootId.eq(moved.root_id))
            .filter(node::Column::LeftBound.gte(calc.temp_anchor))
            .filter(node::Column::LeftBound.lt(calc.temp_anchor + calc.width))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    /// Remove every node of `root_id` whose `left_bound` lies in `[left_bound, right_bound]`.
    pub async fn delete_range<C: ConnectionTrait>(
        &self,
        conn: &C,
        root_id: i32,
        left_bound: i32,
        right_bound: i32,
    ) -> Result<u64, NestedSetError> {
        let result = node::Entity::delete_many()
            .filter(node::Column::RootId.eq(root_id))
            .filter(node::Column::LeftBound.between(left_bound, right_bound))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn delete_node<C: ConnectionTrait>(
        &self,
        conn: &C,
        node_id: i32,
    ) -> Result<u64, NestedSetError> {
        let result = node::Entity::delete_by_id(node_id).exec(conn).await?;
        Ok(result.rows_affected)
    }

    /// Insert a node into an already opened slot and return its id.
    pub async fn insert_node<C: ConnectionTrait>(
        &self,
        conn: &C,
        new_node: NewNode,
    ) -> Result<i32, NestedSetError> {
        let result = node::Entity::insert(new_node.into_active_model())
            .exec(conn)
            .await?;
        Ok(result.last_insert_id)
    }

    /// Make a freshly inserted root point at itself and order it by its id.
    pub async fn tag_root<C: ConnectionTrait>(
        &self,
        conn: &C,
        node_id: i32,
    ) -> Result<u64, NestedSetError> {
        let result = node::Entity::update_many()
            .col_expr(node::Column::RootId, Expr::value(node_id))
            .col_expr(node::Column::OrderHint, Expr::value(node_id))
            .filter(node::Column::NodeId.eq(node_id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn reparent<C: ConnectionTrait>(
        &self,
        conn: &C,
        node_id: i32,
        parent_id: i32,
    ) -> Result<u64, NestedSetError> {
        let result = node::Entity::update_many()
            .col_expr(node::Column::ParentId, Expr::value(parent_id))
            .filter(node::Column::NodeId.eq(node_id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    /// Push every root at or after `slot` one position down, except `excluding`.
    pub async fn shift_root_order<C: ConnectionTrait>(
        &self,
        conn: &C,
        slot: i32,
        excluding: i32,
    ) -> Result<u64, NestedSetError> {
        let result = node::Entity::update_many()
            .col_expr(
                node::Column::OrderHint,
                Expr::col(node::Column::OrderHint).add(1),
            )
            .filter(node::Column::ParentId.eq(0))
            .filter(node::Column::OrderHint.gte(slot))
            .filter(node::Column::NodeId.ne(excluding))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn set_order_hint<C: ConnectionTrait>(
        &self,
        conn: &C,
        node_id: i32,
        order_hint: i32,
    ) -> Result<u64, NestedSetError> {
        let result = node::Entity::update_many()
            .col_expr(node::Column::OrderHint, Expr::value(order_hint))
            .filter(node::Column::NodeId.eq(node_id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn find_node<C: ConnectionTrait>(
        &self,
        conn: &C,
        node_id: i32,
    ) -> Result<Option<node::Model>, NestedSetError> {
        let model = node::Entity::find_by_id(node_id).one(conn).await?;
        Ok(model)
    }

    pub async fn find_bounds<C: ConnectionTrait>(
        &self,
        conn: &C,
        node_id: i32,
    ) -> Result<Option<NodeBounds>, NestedSetError> {
        let bounds = node::Entity::find_by_id(node_id)
            .select_only()
            .columns([
                node::Column::NodeId,
                node::Column::RootId,
                node::Column::ParentId,
                node::Column::LeftBound,
                node::Column::RightBound,
                node::Column::Level,
                node::Column::OrderHint,
            ])
            .into_model::<NodeBounds>()
            .one(conn)
            .await?;
        Ok(bounds)
    }

    pub async fn find_node_owner<C: ConnectionTrait>(
        &self,
        conn: &C,
        node_id: i32,
    ) -> Result<Option<NodeOwnership>, NestedSetError> {
        let owner = node::Entity::find_by_id(node_id)
            .select_only()
            .columns([
                node::Column::OwnerId,
                node::Column::NodeId,
                node::Column::Name,
                node::Column::CompanyId,
            ])
            .into_model::<NodeOwnership>()
            .one(conn)
            .await?;
        Ok(owner)
    }

    pub async fn find_root_nodes<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<Vec<node::Model>, NestedSetError> {
        let rows = node::Entity::find()
            .filter(node::Column::ParentId.eq(0))
            .order_by_asc(node::Column::OrderHint)
            .order_by_asc(node::Column::NodeId)
            .all(conn)
            .await?;
        Ok(rows)
    }

    /// Every node of one tree in preorder.
    pub async fn find_tree<C: ConnectionTrait>(
        &self,
        conn: &C,
        root_id: i32,
    ) -> Result<Vec<node::Model>, NestedSetError> {
        let rows = node::Entity::find()
            .filter(node::Column::RootId.eq(root_id))
            .order_by_asc(node::Column::LeftBound)
            .all(conn)
            .await?;
        Ok(rows)
    }

    pub async fn find_children<C: ConnectionTrait>(
        &self,
        conn: &C,
        node_id: i32,
    ) -> Result<Vec<node::Model>, NestedSetError> {
        let rows = node::Entity::find()
            .filter(node::Column::ParentId.eq(node_id))
            .order_by_asc(node::Column::LeftBound)
            .order_by_asc(node::Column::OrderHint)
            .all(conn)
            .await?;
        Ok(rows)
    }

    /// Ancestors of `node`, root first.
    pub async fn find_ancestors<C: ConnectionTrait>(
        &self,
        conn: &C,
        node: &NodeBounds,
    ) -> Result<Vec<node::Model>, NestedSetError> {
        let rows = node::Entity::find()
            .filter(node::Column::RootId.eq(node.root_id))
            .filter(node::Column::LeftBound.lt(node.left_bound))
            .filter(node::Column::RightBound.gt(node.right_bound))
            .order_by_asc(node::Column::LeftBound)
            .all(conn)
            .await?;
        Ok(rows)
    }

    /// Ids of every node strictly inside `node`'s range, in preorder.
    pub async fn find_descendant_ids<C: ConnectionTrait>(
        &self,
        conn: &C,
        node: &NodeBounds,
    ) -> Result<Vec<i32>, NestedSetError> {
        let ids = node::Entity::find()
            .select_only()
            .column(node::Column::NodeId)
            .filter(node::Column::RootId.eq(node.root_id))
            .filter(node::Column::LeftBound.gt(node.left_bound))
            .filter(node::Column::LeftBound.lt(node.right_bound))
            .order_by_asc(node::Column::LeftBound)
            .into_tuple::<i32>()
            .all(conn)
            .await?;
        Ok(ids)
    }
}
