use std::sync::{Arc, Mutex, PoisonError};

use sea_orm::{ConnectionTrait, DatabaseConnection, DatabaseTransaction};

use crate::config::NestedSetConfig;
use crate::error::NestedSetError;
use crate::invariants::{ensure_tree_invariants, tree_invariant_violations, TreeInvariantViolation};
use crate::lock::LockedTransaction;
use crate::node::{self, NewNode, NodeBounds, NodeOwner, NodeOwnership, NodeSummary, NODE_WIDTH};
use crate::position::{self, Region};
use crate::store::TreeStore;
use crate::traits::DeletionHook;

/// Identifies a call in logs and in the error accumulator.
#[derive(Clone, Copy, Debug)]
struct Operation {
    name: &'static str,
    node_id: i32,
    target_id: Option<i32>,
    region: Option<Region>,
}

impl Operation {
    fn new(name: &'static str, node_id: i32) -> Self {
        Self {
            name,
            node_id,
            target_id: None,
            region: None,
        }
    }

    fn towards(mut self, target_id: i32, region: Region) -> Self {
        self.target_id = Some(target_id);
        self.region = Some(region);
        self
    }
}

/// Transactional entry point for nested-set trees.
///
/// Each mutation runs in its own [`LockedTransaction`]: boundaries are read
/// fresh, validated, shifted through [`TreeStore`] and committed together.
/// Any failure rolls the transaction back, is logged, and its message is
/// appended to an accumulator readable with [`TreeService::error_messages`].
pub struct TreeService {
    config: NestedSetConfig,
    store: TreeStore,
    hooks: Vec<Arc<dyn DeletionHook>>,
    messages: Mutex<Vec<String>>,
}

impl Default for TreeService {
    fn default() -> Self {
        Self::new(NestedSetConfig::default())
    }
}

impl TreeService {
    pub fn new(config: NestedSetConfig) -> Self {
        Self {
            config,
            store: TreeStore::new(),
            hooks: Vec::new(),
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn with_deletion_hook(mut self, hook: Arc<dyn DeletionHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Messages of every failure recorded so far, oldest first.
    pub fn error_messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn take_error_messages(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub async fn find_all_root_nodes<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> Result<Vec<NodeSummary>, NestedSetError> {
        let result = self.store.find_root_nodes(conn).await;
        self.observe(Operation::new("find_all_root_nodes", 0), result)
            .map(|rows| rows.into_iter().map(NodeSummary::from).collect())
    }

    pub async fn find_tree_by_root_id<C: ConnectionTrait>(
        &self,
        conn: &C,
        root_id: i32,
    ) -> Result<Vec<node::Model>, NestedSetError> {
        let result = self.store.find_tree(conn, root_id).await;
        self.observe(Operation::new("find_tree_by_root_id", root_id), result)
    }

    pub async fn find_node<C: ConnectionTrait>(
        &self,
        conn: &C,
        node_id: i32,
    ) -> Result<node::Model, NestedSetError> {
        let result = self
            .store
            .find_node(conn, node_id)
            .await
            .and_then(|node| node.ok_or(NestedSetError::NodeNotFound(node_id)));
        self.observe(Operation::new("find_node", node_id), result)
    }

    pub async fn find_node_owner<C: ConnectionTrait>(
        &self,
        conn: &C,
        node_id: i32,
    ) -> Result<NodeOwnership, NestedSetError> {
        let result = self
            .store
            .find_node_owner(conn, node_id)
            .await
            .and_then(|owner| owner.ok_or(NestedSetError::NodeNotFound(node_id)));
        self.observe(Operation::new("find_node_owner", node_id), result)
    }

    pub async fn find_children<C: ConnectionTrait>(
        &self,
        conn: &C,
        node_id: i32,
    ) -> Result<Vec<node::Model>, NestedSetError> {
        let result = self.store.find_children(conn, node_id).await;
        self.observe(Operation::new("find_children", node_id), result)
    }

    pub async fn find_ancestors<C: ConnectionTrait>(
        &self,
        conn: &C,
        node_id: i32,
    ) -> Result<Vec<node::Model>, NestedSetError> {
        let result = match self.load(conn, node_id).await {
            Ok(node) => self.store.find_ancestors(conn, &node).await,
            Err(err) => Err(err),
        };
        self.observe(Operation::new("find_ancestors", node_id), result)
    }

    /// Ids below `node_id`, for callers that clean up data attached to a subtree.
    pub async fn find_descendant_ids<C: ConnectionTrait>(
        &self,
        conn: &C,
        node_id: i32,
    ) -> Result<Vec<i32>, NestedSetError> {
        let result = match self.load(conn, node_id).await {
            Ok(node) => self.store.find_descendant_ids(conn, &node).await,
            Err(err) => Err(err),
        };
        self.observe(Operation::new("find_descendant_ids", node_id), result)
    }

    /// Check a stored tree without modifying it.
    pub async fn verify_tree<C: ConnectionTrait>(
        &self,
        conn: &C,
        root_id: i32,
    ) -> Result<Vec<TreeInvariantViolation>, NestedSetError> {
        let result = self.store.find_tree(conn, root_id).await;
        self.observe(Operation::new("verify_tree", root_id), result)
            .map(|nodes| tree_invariant_violations(&nodes))
    }

    /// Create a new single-node tree and return its id.
    pub async fn add_root_node(
        &self,
        conn: &DatabaseConnection,
        owner: NodeOwner,
        name: &str,
    ) -> Result<i32, NestedSetError> {
        let operation = Operation::new("add_root_node", 0);
        let guard = self.begin(conn, operation).await?;
        let result = self.add_root_on(guard.connection(), owner, name).await;
        self.finish(guard, operation, result).await
    }

    /// Append a new last child under `parent_id` and return its id.
    pub async fn add_child_node(
        &self,
        conn: &DatabaseConnection,
        owner: NodeOwner,
        name: &str,
        parent_id: i32,
    ) -> Result<i32, NestedSetError> {
        self.add_node(conn, owner, name, parent_id, Region::AppendChild)
            .await
    }

    /// Insert a new node at `region` relative to `target_id` and return its id.
    pub async fn add_node(
        &self,
        conn: &DatabaseConnection,
        owner: NodeOwner,
        name: &str,
        target_id: i32,
        region: Region,
    ) -> Result<i32, NestedSetError> {
        let operation = Operation::new("add_node", 0).towards(target_id, region);
        let guard = self.begin(conn, operation).await?;
        let result = self
            .add_node_on(guard.connection(), owner, name, target_id, region)
            .await;
        self.finish(guard, operation, result).await
    }

    /// Delete a leaf and close its slot.
    pub async fn delete_single_node(
        &self,
        conn: &DatabaseConnection,
        node_id: i32,
    ) -> Result<bool, NestedSetError> {
        let operation = Operation::new("delete_single_node", node_id);
        let guard = self.begin(conn, operation).await?;
        let result = self.delete_single_on(guard.connection(), node_id).await;
        self.finish(guard, operation, result).await
    }

    /// Delete a node together with all of its descendants.
    pub async fn delete_subtree(
        &self,
        conn: &DatabaseConnection,
        node_id: i32,
    ) -> Result<bool, NestedSetError> {
        let operation = Operation::new("delete_subtree", node_id);
        let guard = self.begin(conn, operation).await?;
        let result = self.delete_subtree_on(guard.connection(), node_id).await;
        self.finish(guard, operation, result).await
    }

    /// Move `moved_id` and its subtree to `region` relative to `target_id`,
    /// possibly into another tree.
    ///
    /// Before/after a root reorders trees: a moved root keeps its tree, any
    /// other node is detached into a tree of its own first.
    pub async fn move_node(
        &self,
        conn: &DatabaseConnection,
        moved_id: i32,
        target_id: i32,
        region: Region,
    ) -> Result<bool, NestedSetError> {
        let operation = Operation::new("move_node", moved_id).towards(target_id, region);
        let guard = self.begin(conn, operation).await?;
        let result = self
            .move_node_on(guard.connection(), moved_id, target_id, region)
            .await;
        self.finish(guard, operation, result).await
    }

    async fn add_root_on(
        &self,
        txn: &DatabaseTransaction,
        owner: NodeOwner,
        name: &str,
    ) -> Result<i32, NestedSetError> {
        let node_id = self
            .store
            .insert_node(
                txn,
                NewNode {
                    owner,
                    name: name.to_owned(),
                    root_id: 0,
                    parent_id: 0,
                    left_bound: 1,
                    level: 1,
                    order_hint: 0,
                },
            )
            .await?;

        if self.store.tag_root(txn, node_id).await? == 0 {
            return Err(NestedSetError::inconsistent("tag_root", node_id));
        }

        self.verify(txn, &[node_id]).await?;
        Ok(node_id)
    }

    async fn add_node_on(
        &self,
        txn: &DatabaseTransaction,
        owner: NodeOwner,
        name: &str,
        target_id: i32,
        region: Region,
    ) -> Result<i32, NestedSetError> {
        let target = self.load(txn, target_id).await?;
        if target.is_root() && region != Region::AppendChild {
            return Err(NestedSetError::RootSibling(target_id));
        }

        let boundary = position::resolve_insertion_boundary(region, &target);
        self.open_gap(txn, &target, boundary, NODE_WIDTH).await?;

        let node_id = self
            .store
            .insert_node(
                txn,
                NewNode {
                    owner,
                    name: name.to_owned(),
                    root_id: target.root_id,
                    parent_id: position::resolve_new_parent_id(region, &target),
                    left_bound: boundary,
                    level: position::resolve_new_level(region, &target),
                    order_hint: 0,
                },
            )
            .await?;

        self.verify(txn, &[target.root_id]).await?;
        Ok(node_id)
    }

    async fn delete_single_on(
        &self,
        txn: &DatabaseTransaction,
        node_id: i32,
    ) -> Result<bool, NestedSetError> {
        let node = self.load(txn, node_id).await?;
        if !node.is_leaf() {
            return Err(NestedSetError::NotALeaf(node_id));
        }

        self.run_hooks(txn, &[node_id]).await?;

        if self.store.delete_node(txn, node_id).await? == 0 {
            return Err(NestedSetError::inconsistent("delete_node", node_id));
        }
        if !node.is_root() {
            self.close_gap(txn, &node, node.right_bound, NODE_WIDTH)
                .await?;
        }

        self.verify(txn, &[node.root_id]).await?;
        Ok(true)
    }

    async fn delete_subtree_on(
        &self,
        txn: &DatabaseTransaction,
        node_id: i32,
    ) -> Result<bool, NestedSetError> {
        let node = self.load(txn, node_id).await?;

        let mut doomed = vec![node_id];
        doomed.extend(self.store.find_descendant_ids(txn, &node).await?);
        self.run_hooks(txn, &doomed).await?;

        let removed = self
            .store
            .delete_range(txn, node.root_id, node.left_bound, node.right_bound)
            .await?;
        if removed == 0 {
            return Err(NestedSetError::inconsistent("delete_range", node_id));
        }
        if removed != doomed.len() as u64 {
            return Err(NestedSetError::invariant(format!(
                "subtree of node {node_id} removed {removed} rows, expected {}",
                doomed.len()
            )));
        }

        if !node.is_root() {
            self.close_gap(txn, &node, node.right_bound, position::closing_width(&node))
                .await?;
        }

        self.verify(txn, &[node.root_id]).await?;
        Ok(true)
    }

    async fn move_node_on(
        &self,
        txn: &DatabaseTransaction,
        moved_id: i32,
        target_id: i32,
        region: Region,
    ) -> Result<bool, NestedSetError> {
        let moved = self.load(txn, moved_id).await?;
        let target = self.load(txn, target_id).await?;

        if moved.encloses(&target) {
            return Err(NestedSetError::MoveIntoOwnSubtree {
                moved: moved_id,
                target: target_id,
            });
        }

        if target.is_root() && region != Region::AppendChild {
            if !moved.is_root() {
                self.detach_on(txn, &moved).await?;
            }
            self.place_root(txn, moved_id, &target, region).await?;
            self.verify(txn, &[moved.root_id, moved_id]).await?;
            return Ok(true);
        }

        let boundary = position::resolve_insertion_boundary(region, &target);
        let width = position::subtree_width(&moved);
        self.open_gap(txn, &target, boundary, width).await?;

        let calc = position::compute_move_distance(&moved, &target, boundary, width);
        let level_delta = position::compute_level_delta(region, moved.level, target.level);
        let relocated = self
            .store
            .relocate_subtree(txn, &moved, target.root_id, &calc, level_delta)
            .await?;
        if relocated == 0 {
            return Err(NestedSetError::inconsistent("relocate_subtree", moved_id));
        }

        let parent_id = position::resolve_new_parent_id(region, &target);
        if self.store.reparent(txn, moved_id, parent_id).await? == 0 {
            return Err(NestedSetError::inconsistent("reparent", moved_id));
        }

        if !moved.is_root() {
            self.close_gap(txn, &moved, calc.vacated_right(), width)
                .await?;
        }

        self.verify(txn, &[target.root_id, moved.root_id]).await?;
        Ok(true)
    }

    /// Rebase a non-root subtree into a new tree rooted at itself.
    async fn detach_on(
        &self,
        txn: &DatabaseTransaction,
        moved: &NodeBounds,
    ) -> Result<(), NestedSetError> {
        let vacant = NodeBounds::vacant_tree(moved.node_id);
        let width = position::subtree_width(moved);
        let calc = position::compute_move_distance(moved, &vacant, vacant.left_bound, width);
        let level_delta = position::compute_level_delta(Region::Before, moved.level, vacant.level);

        let relocated = self
            .store
            .relocate_subtree(txn, moved, vacant.root_id, &calc, level_delta)
            .await?;
        if relocated == 0 {
            return Err(NestedSetError::inconsistent("relocate_subtree", moved.node_id));
        }
        if self.store.reparent(txn, moved.node_id, 0).await? == 0 {
            return Err(NestedSetError::inconsistent("reparent", moved.node_id));
        }

        self.close_gap(txn, moved, calc.vacated_right(), width)
            .await
    }

    /// Give root `moved_id` the order slot before or after root `target`.
    async fn place_root(
        &self,
        txn: &DatabaseTransaction,
        moved_id: i32,
        target: &NodeBounds,
        region: Region,
    ) -> Result<(), NestedSetError> {
        let slot = if region == Region::Before {
            target.order_hint
        } else {
            target.order_hint + 1
        };

        self.store.shift_root_order(txn, slot, moved_id).await?;
        if self.store.set_order_hint(txn, moved_id, slot).await? == 0 {
            return Err(NestedSetError::inconsistent("set_order_hint", moved_id));
        }
        Ok(())
    }

    /// Open `width` units at `boundary` in `target`'s tree. Some ancestor's
    /// right bound always sits at or past the boundary, so the right pass
    /// must touch at least one row.
    async fn open_gap(
        &self,
        txn: &DatabaseTransaction,
        target: &NodeBounds,
        boundary: i32,
        width: i32,
    ) -> Result<(), NestedSetError> {
        self.store
            .open_gap_left(txn, target.root_id, boundary, width)
            .await?;
        let shifted = self
            .store
            .open_gap_right(txn, target.root_id, boundary, width)
            .await?;
        if shifted == 0 {
            return Err(NestedSetError::inconsistent("open_gap_right", target.node_id));
        }
        Ok(())
    }

    /// Close `width` units after `position` in `node`'s tree. Only valid for
    /// non-root nodes, whose ancestors must shrink.
    async fn close_gap(
        &self,
        txn: &DatabaseTransaction,
        node: &NodeBounds,
        position: i32,
        width: i32,
    ) -> Result<(), NestedSetError> {
        self.store
            .close_gap_left(txn, node.root_id, position, width)
            .await?;
        let shifted = self
            .store
            .close_gap_right(txn, node.root_id, position, width)
            .await?;
        if shifted == 0 {
            return Err(NestedSetError::inconsistent("close_gap_right", node.node_id));
        }
        Ok(())
    }

    async fn run_hooks(
        &self,
        txn: &DatabaseTransaction,
        node_ids: &[i32],
    ) -> Result<(), NestedSetError> {
        for hook in &self.hooks {
            hook.before_delete(txn, node_ids).await?;
        }
        Ok(())
    }

    async fn verify(&self, txn: &DatabaseTransaction, root_ids: &[i32]) -> Result<(), NestedSetError> {
        if !self.config.verify_invariants() {
            return Ok(());
        }

        let mut checked = Vec::with_capacity(root_ids.len());
        for root_id in root_ids {
            if checked.contains(root_id) {
                continue;
            }
            let nodes = self.store.find_tree(txn, *root_id).await?;
            ensure_tree_invariants(&nodes)?;
            checked.push(*root_id);
        }
        Ok(())
    }

    async fn load<C: ConnectionTrait>(
        &self,
        conn: &C,
        node_id: i32,
    ) -> Result<NodeBounds, NestedSetError> {
        self.store
            .find_bounds(conn, node_id)
            .await?
            .ok_or(NestedSetError::NodeNotFound(node_id))
    }

    async fn begin(
        &self,
        conn: &DatabaseConnection,
        operation: Operation,
    ) -> Result<LockedTransaction, NestedSetError> {
        let result = LockedTransaction::acquire(self.config.advisory_lock_strategy(), conn).await;
        self.observe(operation, result)
    }

    async fn finish<T>(
        &self,
        guard: LockedTransaction,
        operation: Operation,
        result: Result<T, NestedSetError>,
    ) -> Result<T, NestedSetError> {
        match result {
            Ok(value) => {
                let lock_id = guard.lock_id();
                let committed = guard.commit().await;
                let value = self.observe(operation, committed.map(|()| value))?;
                tracing::debug!(
                    operation = operation.name,
                    node_id = operation.node_id,
                    target_id = ?operation.target_id,
                    region = ?operation.region,
                    lock_id = ?lock_id,
                    "nested-set mutation committed"
                );
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = guard.rollback().await {
                    tracing::warn!(
                        operation = operation.name,
                        node_id = operation.node_id,
                        error = %rollback_err,
                        "nested-set rollback failed"
                    );
                }
                self.observe(operation, Err(err))
            }
        }
    }

    /// Log and accumulate a failure, passing the result through unchanged.
    fn observe<T>(
        &self,
        operation: Operation,
        result: Result<T, NestedSetError>,
    ) -> Result<T, NestedSetError> {
        if let Err(ref err) = result {
            tracing::warn!(
                operation = operation.name,
                node_id = operation.node_id,
                target_id = ?operation.target_id,
                region = ?operation.region,
                structural = err.is_structural(),
                error = %err,
                "nested-set operation failed"
            );
            self.messages
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(format!("{}: {err}", operation.name));
        }
        result
    }
}
