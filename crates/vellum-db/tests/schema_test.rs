//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    vellum_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info_str = format!("{:?}", info.expect("INFO FOR DB should return a value"));

    for table in [
        "tenant",
        "user",
        "document",
        "comment",
        "notification",
        "message",
        "activity_log",
    ] {
        assert!(info_str.contains(table), "missing {table} table");
    }
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    vellum_db::run_migrations(&db).await.unwrap();
    vellum_db::run_migrations(&db).await.unwrap();
}

#[tokio::test]
async fn in_memory_manager_connects_and_pings() {
    let manager = vellum_db::DbManager::connect(&vellum_db::DbConfig::in_memory())
        .await
        .unwrap();
    assert!(manager.ping().await);
}
