//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    let applied = warden_db::run_migrations(&db).await.unwrap();
    assert_eq!(applied, 1);

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    for table in [
        "tenant",
        "user",
        "profile",
        "role",
        "has_role",
        "policy_rule",
        "email_verification",
        "password_reset",
        "_migration",
    ] {
        assert!(info_str.contains(table), "missing {table} table");
    }
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    warden_db::run_migrations(&db).await.unwrap();
    let second = warden_db::run_migrations(&db).await.unwrap();
    assert_eq!(second, 0);

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 1, "expected exactly one migration record");
}

#[tokio::test]
async fn unique_index_prevents_duplicate_slugs() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    warden_db::run_migrations(&db).await.unwrap();

    db.query("CREATE tenant SET slug = 'acme', name = 'Acme', secret_hash = 'x'")
        .await
        .unwrap()
        .check()
        .unwrap();

    let result = db
        .query("CREATE tenant SET slug = 'acme', name = 'Acme Two', secret_hash = 'y'")
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "duplicate slug should be rejected");
}

#[tokio::test]
async fn rule_codes_are_constrained() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    warden_db::run_migrations(&db).await.unwrap();

    let result = db
        .query("CREATE policy_rule SET tenant_id = 't', code = 'SOMETHING_ELSE', value = {}")
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "unknown rule codes should be rejected");
}
