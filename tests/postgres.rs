use std::time::Duration;

use nested_set::prelude::*;
use nested_set::{create_tree_table, NestedSetError};
use once_cell::sync::Lazy;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Both tests truncate the same table.
static TABLE_GUARD: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

#[tokio::test]
async fn nested_set_round_trip_on_postgres() -> TestResult {
    let Some(url) = database_url() else {
        eprintln!("skipping: NESTED_SET_TEST_DATABASE_URL / DATABASE_URL not set");
        return Ok(());
    };
    let _table = TABLE_GUARD.lock().await;
    let db = Database::connect(url.as_str()).await?;
    truncate_tables(&db).await?;

    let service = TreeService::new(
        NestedSetOptions::default()
            .verify_invariants(true)
            .apply(NestedSetConfig::new("postgres-tests")),
    );
    let owner = NodeOwner::new(1);

    let r1 = service.add_root_node(&db, owner, "root").await?;
    let child = service.add_child_node(&db, owner, "child", r1).await?;
    let leaf = service.add_child_node(&db, owner, "leaf", child).await?;
    let r2 = service.add_root_node(&db, owner, "other").await?;

    service.move_node(&db, child, r2, Region::AppendChild).await?;

    let moved = service.find_node(&db, leaf).await?;
    assert_eq!(moved.root_id, r2);
    assert_eq!(moved.level, 3);
    assert!(service.verify_tree(&db, r1).await?.is_empty());
    assert!(service.verify_tree(&db, r2).await?.is_empty());

    let descendants = service.find_descendant_ids(&db, r2).await?;
    assert_eq!(descendants, vec![child, leaf]);

    let err = service.delete_single_node(&db, child).await.unwrap_err();
    assert!(matches!(err, NestedSetError::NotALeaf(_)));
    assert!(service.delete_subtree(&db, child).await?);
    assert_eq!(service.find_tree_by_root_id(&db, r2).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn failed_mutation_releases_the_advisory_lock() -> TestResult {
    let Some(url) = database_url() else {
        eprintln!("skipping: NESTED_SET_TEST_DATABASE_URL / DATABASE_URL not set");
        return Ok(());
    };
    let _table = TABLE_GUARD.lock().await;
    let db = Database::connect(url.as_str()).await?;
    truncate_tables(&db).await?;
    install_boom_trigger(&db).await?;

    let config = NestedSetConfig::new("postgres-lock-tests");
    assert!(config.advisory_lock_strategy().key().is_some());
    let service = TreeService::new(config);
    let owner = NodeOwner::new(1);

    let root = service.add_root_node(&db, owner, "root").await?;
    let before = service.find_tree_by_root_id(&db, root).await?;

    // The insert aborts the transaction after the gap was opened.
    let err = service
        .add_child_node(&db, owner, "boom", root)
        .await
        .unwrap_err();
    assert!(matches!(err, NestedSetError::Database(_)));
    assert_eq!(service.find_tree_by_root_id(&db, root).await?, before);

    // A separate pool must still get the lock.
    let second = Database::connect(url.as_str()).await?;
    let other = tokio::time::timeout(
        Duration::from_secs(5),
        service.add_root_node(&second, owner, "other"),
    )
    .await
    .map_err(|_| "advisory lock still held after a failed mutation")??;
    assert!(service.find_node(&second, other).await?.is_root());

    db.execute(Statement::from_string(
        DbBackend::Postgres,
        "DROP TRIGGER IF EXISTS reject_boom ON tree_nodes;",
    ))
    .await?;

    Ok(())
}

fn database_url() -> Option<String> {
    std::env::var("NESTED_SET_TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .filter(|url| url.starts_with("postgres"))
}

async fn install_boom_trigger(db: &DatabaseConnection) -> Result<(), sea_orm::DbErr> {
    for sql in [
        "CREATE OR REPLACE FUNCTION reject_boom() RETURNS trigger AS $$ \
         BEGIN \
             IF NEW.name = 'boom' THEN RAISE EXCEPTION 'boom rejected'; END IF; \
             RETURN NEW; \
         END $$ LANGUAGE plpgsql;",
        "DROP TRIGGER IF EXISTS reject_boom ON tree_nodes;",
        "CREATE TRIGGER reject_boom BEFORE INSERT ON tree_nodes \
         FOR EACH ROW EXECUTE FUNCTION reject_boom();",
    ] {
        db.execute(Statement::from_string(DbBackend::Postgres, sql))
            .await?;
    }
    Ok(())
}

async fn truncate_tables(db: &DatabaseConnection) -> Result<(), NestedSetError> {
    create_tree_table(db).await?;

    db.execute(Statement::from_string(
        DbBackend::Postgres,
        "TRUNCATE TABLE tree_nodes RESTART IDENTITY;",
    ))
    .await?;

    Ok(())
}
