use thiserror::Error;

/// Errors returned by the nested-set helper APIs.
#[derive(Debug, Error)]
pub enum NestedSetError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("node {0} not found")]
    NodeNotFound(i32),

    #[error("unknown region `{0}`; expected before, after or append_child")]
    UnknownRegion(String),

    #[error("node {moved} cannot be moved relative to itself or into its own subtree (target {target})")]
    MoveIntoOwnSubtree { moved: i32, target: i32 },

    #[error("node {0} has descendants and cannot be deleted on its own")]
    NotALeaf(i32),

    #[error("node {0} is a root; new nodes can only be placed inside it")]
    RootSibling(i32),

    #[error("{operation} affected no rows for node {node_id}")]
    StorageInconsistency {
        operation: &'static str,
        node_id: i32,
    },

    #[error("nested-set invariant violation: {0}")]
    Invariant(String),

    #[error("deletion hook failed: {0}")]
    Hook(String),
}

impl NestedSetError {
    pub fn invariant(detail: impl Into<String>) -> Self {
        Self::Invariant(detail.into())
    }

    pub fn hook(detail: impl Into<String>) -> Self {
        Self::Hook(detail.into())
    }

    pub(crate) fn inconsistent(operation: &'static str, node_id: i32) -> Self {
        Self::StorageInconsistency { operation, node_id }
    }

    /// Whether the error was raised by validation before any row was touched.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::UnknownRegion(_)
                | Self::MoveIntoOwnSubtree { .. }
                | Self::NotALeaf(_)
                | Self::RootSibling(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_errors_are_classified() {
        assert!(NestedSetError::NotALeaf(3).is_structural());
        assert!(NestedSetError::MoveIntoOwnSubtree { moved: 1, target: 2 }.is_structural());
        assert!(!NestedSetError::NodeNotFound(3).is_structural());
        assert!(!NestedSetError::inconsistent("open_gap_right", 3).is_structural());
    }

    #[test]
    fn storage_inconsistency_names_the_operation() {
        let err = NestedSetError::inconsistent("tag_root", 9);
        assert_eq!(err.to_string(), "tag_root affected no rows for node 9");
    }
}
