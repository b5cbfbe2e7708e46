//! Nested-set (modified preorder tree traversal) hierarchies on SeaORM.
//!
//! Trees live in one flat `tree_nodes` table: every node stores a
//! `left_bound`/`right_bound` pair so that containment is interval nesting,
//! and several independent trees share the table through `root_id`.
//! Mutations are plain range updates executed inside a single transaction;
//! PostgreSQL and SQLite are supported, with advisory locking on PostgreSQL.

pub mod config;
pub mod error;
pub mod invariants;
pub mod lock;
pub mod node;
pub mod position;
pub mod schema;
pub mod service;
pub mod store;
pub mod traits;

pub mod prelude {
    //! Convenient re-exports for consumers.
    pub use crate::config::{AdvisoryLockStrategy, NestedSetConfig, NestedSetOptions};
    pub use crate::node::{NodeOwner, NodeSummary};
    pub use crate::position::Region;
    pub use crate::service::TreeService;
    pub use crate::traits::DeletionHook;
}

pub use config::{AdvisoryLockKey, AdvisoryLockStrategy, NestedSetConfig, NestedSetOptions};
pub use error::NestedSetError;
pub use invariants::TreeInvariantViolation;
pub use node::{NodeBounds, NodeOwner, NodeOwnership, NodeSummary};
pub use position::{MoveCalculation, Region};
pub use schema::create_tree_table;
pub use service::TreeService;
pub use store::TreeStore;
pub use traits::DeletionHook;
