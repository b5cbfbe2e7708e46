use nested_set::node;
use nested_set::prelude::*;
use nested_set::NestedSetError;
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};

fn service() -> TreeService {
    TreeService::new(
        NestedSetOptions::default()
            .advisory_lock_strategy(AdvisoryLockStrategy::Disabled)
            .apply(NestedSetConfig::new("mock-tests")),
    )
}

fn row(node_id: i32, parent_id: i32, left: i32, right: i32, level: i32) -> node::Model {
    node::Model {
        node_id,
        root_id: 1,
        parent_id,
        left_bound: left,
        right_bound: right,
        level,
        order_hint: 0,
        owner_id: 7,
        company_id: None,
        name: format!("node-{node_id}"),
    }
}

fn affected(rows_affected: u64) -> MockExecResult {
    MockExecResult {
        last_insert_id: 0,
        rows_affected,
    }
}

fn connection(rows: Vec<Vec<node::Model>>, execs: Vec<MockExecResult>) -> DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(rows)
        .append_exec_results(execs)
        .into_connection()
}

#[tokio::test]
async fn zero_row_gap_aborts_insert() -> Result<(), Box<dyn std::error::Error>> {
    let db = connection(
        vec![vec![row(1, 0, 1, 2, 1)]],
        vec![affected(0), affected(0)],
    );
    let service = service();

    let err = service
        .add_child_node(&db, NodeOwner::new(7), "A", 1)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        NestedSetError::StorageInconsistency {
            operation: "open_gap_right",
            node_id: 1
        }
    ));
    assert!(!err.is_structural());
    assert_eq!(
        service.error_messages(),
        vec!["add_node: open_gap_right affected no rows for node 1".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn vanished_row_aborts_single_delete() -> Result<(), Box<dyn std::error::Error>> {
    let db = connection(vec![vec![row(2, 1, 2, 3, 2)]], vec![affected(0)]);
    let service = service();

    let err = service.delete_single_node(&db, 2).await.unwrap_err();

    assert!(matches!(
        err,
        NestedSetError::StorageInconsistency {
            operation: "delete_node",
            node_id: 2
        }
    ));
    Ok(())
}

#[tokio::test]
async fn empty_relocation_aborts_move() -> Result<(), Box<dyn std::error::Error>> {
    let db = connection(
        vec![vec![row(3, 1, 4, 5, 2)], vec![row(2, 1, 2, 3, 2)]],
        vec![affected(0), affected(3), affected(0)],
    );
    let service = service();

    let err = service
        .move_node(&db, 3, 2, Region::Before)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        NestedSetError::StorageInconsistency {
            operation: "relocate_subtree",
            node_id: 3
        }
    ));
    assert_eq!(service.take_error_messages().len(), 1);
    Ok(())
}

#[tokio::test]
async fn structural_checks_run_before_any_update() -> Result<(), Box<dyn std::error::Error>> {
    // No exec results are queued: any update would fail with a mock error.
    let db = connection(vec![vec![row(2, 1, 2, 5, 2)]], vec![]);
    let service = service();

    let err = service.delete_single_node(&db, 2).await.unwrap_err();

    assert!(matches!(err, NestedSetError::NotALeaf(2)));
    Ok(())
}
