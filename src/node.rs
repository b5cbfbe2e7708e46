//! SeaORM entity for the `tree_nodes` table and the read models built on it.
//!
//! Each row carries its nested-set boundaries (`left_bound`, `right_bound`),
//! its depth (`level`, roots are 1) and the id of the tree it belongs to
//! (`root_id`). Roots have `parent_id == 0` and are ordered by `order_hint`.

use sea_orm::entity::prelude::*;
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};

pub const TABLE_NAME: &str = "tree_nodes";

/// Boundary units consumed by a single node.
pub const NODE_WIDTH: i32 = 2;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tree_nodes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub node_id: i32,
    pub root_id: i32,
    pub parent_id: i32,
    pub left_bound: i32,
    pub right_bound: i32,
    pub level: i32,
    pub order_hint: i32,
    pub owner_id: i32,
    pub company_id: Option<i32>,
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_root(&self) -> bool {
        self.parent_id == 0
    }

    pub fn is_leaf(&self) -> bool {
        self.descendant_count() == 0
    }

    /// Number of nodes below this one, derived from the boundaries alone.
    pub fn descendant_count(&self) -> i32 {
        (self.right_bound - self.left_bound - 1) / 2
    }
}

/// Structural state of a single node, read fresh inside every mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromQueryResult, Serialize, Deserialize)]
pub struct NodeBounds {
    pub node_id: i32,
    pub root_id: i32,
    pub parent_id: i32,
    pub left_bound: i32,
    pub right_bound: i32,
    pub level: i32,
    pub order_hint: i32,
}

impl NodeBounds {
    /// Placeholder for the (still empty) tree a detached subtree is rebased into.
    pub fn vacant_tree(root_id: i32) -> Self {
        Self {
            node_id: root_id,
            root_id,
            parent_id: 0,
            left_bound: 1,
            right_bound: 2,
            level: 1,
            order_hint: 0,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id == 0
    }

    pub fn is_leaf(&self) -> bool {
        self.right_bound - self.left_bound == 1
    }

    /// Whether `other` lies inside this node's range in the same tree (or is this node).
    pub fn encloses(&self, other: &NodeBounds) -> bool {
        self.root_id == other.root_id
            && self.left_bound <= other.left_bound
            && other.right_bound <= self.right_bound
    }
}

/// Owner attached to newly created nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOwner {
    pub owner_id: i32,
    pub company_id: Option<i32>,
}

impl NodeOwner {
    pub fn new(owner_id: i32) -> Self {
        Self {
            owner_id,
            company_id: None,
        }
    }

    pub fn with_company(mut self, company_id: i32) -> Self {
        self.company_id = Some(company_id);
        self
    }
}

/// Ownership record returned by `find_node_owner`.
#[derive(Clone, Debug, PartialEq, Eq, FromQueryResult, Serialize, Deserialize)]
pub struct NodeOwnership {
    pub owner_id: i32,
    pub node_id: i32,
    pub name: String,
    pub company_id: Option<i32>,
}

/// Root listing entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub node_id: i32,
    pub name: String,
    pub owner_id: i32,
    pub order_hint: i32,
    pub descendant_count: i32,
}

impl From<Model> for NodeSummary {
    fn from(value: Model) -> Self {
        Self {
            descendant_count: value.descendant_count(),
            node_id: value.node_id,
            name: value.name,
            owner_id: value.owner_id,
            order_hint: value.order_hint,
        }
    }
}

/// Row to insert at an already-opened slot.
#[derive(Clone, Debug)]
pub struct NewNode {
    pub owner: NodeOwner,
    pub name: String,
    pub root_id: i32,
    pub parent_id: i32,
    pub left_bound: i32,
    pub level: i32,
    pub order_hint: i32,
}

impl NewNode {
    pub(crate) fn into_active_model(self) -> ActiveModel {
        ActiveModel {
            root_id: sea_orm::ActiveValue::Set(self.root_id),
            parent_id: sea_orm::ActiveValue::Set(self.parent_id),
            left_bound: sea_orm::ActiveValue::Set(self.left_bound),
            right_bound: sea_orm::ActiveValue::Set(self.left_bound + NODE_WIDTH - 1),
            level: sea_orm::ActiveValue::Set(self.level),
            order_hint: sea_orm::ActiveValue::Set(self.order_hint),
            owner_id: sea_orm::ActiveValue::Set(self.owner.owner_id),
            company_id: sea_orm::ActiveValue::Set(self.owner.company_id),
            name: sea_orm::ActiveValue::Set(self.name),
            ..Default::default()
        }
    }
}
