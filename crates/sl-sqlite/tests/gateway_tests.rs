use sl_gateway::{
    Gateway, GatewayError, IndexOrigin, QueryMode, QueuedGateway, SqlValue, TableKind,
};
use sl_sqlite::Database;
use std::sync::Arc;

async fn fixture() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.query(
        r#"
        CREATE TABLE people (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            name TEXT DEFAULT 'anon'
        );
        CREATE TABLE tags (label TEXT PRIMARY KEY, weight REAL) WITHOUT ROWID;
        CREATE VIEW people_names AS SELECT name FROM people;
        CREATE INDEX people_name_idx ON people(name) WHERE name IS NOT NULL;
        INSERT INTO people (email, name) VALUES ('a@example.com', 'Ann'), ('b@example.com', NULL);
        "#,
        &[],
        QueryMode::Script,
    )
    .await
    .unwrap();
    db
}

#[tokio::test]
async fn test_read_mode_rejects_writes() {
    let db = fixture().await;
    let err = db
        .query("DELETE FROM people", &[], QueryMode::Read)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::ReadOnly { .. }));

    let rows = db
        .query("SELECT COUNT(*) FROM people", &[], QueryMode::Read)
        .await
        .unwrap();
    assert_eq!(rows.scalar(), Some(&SqlValue::Integer(2)));
}

#[tokio::test]
async fn test_query_error_carries_sql_and_params() {
    let db = fixture().await;
    let err = db
        .query(
            "SELECT * FROM missing WHERE a = ?",
            &[SqlValue::from("x")],
            QueryMode::Read,
        )
        .await
        .unwrap_err();
    let text = err.to_string();
    assert!(text.contains("no such table: missing"));
    assert!(text.contains("SELECT * FROM missing WHERE a = ?"));
    assert!(text.contains("\"x\""));
}

#[tokio::test]
async fn test_values_round_trip_through_parameters() {
    let db = fixture().await;
    let params = [
        SqlValue::Integer(i64::MAX),
        SqlValue::Real(1.5),
        SqlValue::Text("héllo".into()),
        SqlValue::Blob(vec![0, 1, 2]),
        SqlValue::Null,
    ];
    let rows = db
        .query("SELECT ? AS i, ? AS r, ? AS t, ? AS b, ? AS n", &params, QueryMode::Read)
        .await
        .unwrap();
    assert_eq!(rows.columns, vec!["i", "r", "t", "b", "n"]);
    let record = &rows.records[0];
    for (column, expected) in rows.columns.iter().zip(params.iter()) {
        assert_eq!(record.get(column), Some(expected));
    }
}

#[tokio::test]
async fn test_script_mode_rejects_parameters() {
    let db = fixture().await;
    let err = db
        .query("DELETE FROM people", &[SqlValue::Integer(1)], QueryMode::Script)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Query { .. }));
}

#[tokio::test]
async fn test_introspection() {
    let db = fixture().await;

    let tables = db.table_list().await.unwrap();
    let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["people", "people_names", "tags"]);
    assert!(tables[0].has_rowid());
    assert_eq!(tables[1].kind, TableKind::View);
    assert!(tables[2].without_rowid);
    assert!(!tables[2].has_rowid());

    let columns = db.table_info("people").await.unwrap();
    assert_eq!(columns.len(), 3);
    assert!(columns[0].is_primary_key);
    assert_eq!(columns[1].declared_type, "TEXT");
    assert!(columns[1].not_null);
    assert_eq!(columns[2].default_value.as_deref(), Some("'anon'"));

    let indexes = db.index_list("people").await.unwrap();
    let unique = indexes
        .iter()
        .find(|index| index.origin == IndexOrigin::Unique)
        .unwrap();
    assert!(unique.unique);
    assert!(!unique.partial);
    let partial = indexes
        .iter()
        .find(|index| index.name == "people_name_idx")
        .unwrap();
    assert!(partial.partial);

    let info = db.index_info(&unique.name).await.unwrap();
    assert_eq!(info.len(), 1);
    assert_eq!(info[0].name.as_deref(), Some("email"));

    let ddl = db.table_schema("people").await.unwrap().unwrap();
    assert!(ddl.starts_with("CREATE TABLE people"));
    assert!(db.table_schema("people_names").await.unwrap().is_some());
    assert!(db.index_schema("people_name_idx").await.unwrap().is_some());
    assert_eq!(db.table_schema("nope").await.unwrap(), None);

    assert!(db.has_table_autoincrement_column("people").await.unwrap());
    assert!(!db.has_table_autoincrement_column("tags").await.unwrap());
}

#[tokio::test]
async fn test_find_functions_are_registered() {
    let db = fixture().await;
    let rows = db
        .query(
            r#"SELECT email FROM people WHERE find_widget_compare("name", ?)"#,
            &[SqlValue::from("null")],
            QueryMode::Read,
        )
        .await
        .unwrap();
    assert_eq!(rows.records.len(), 1);
    assert_eq!(
        rows.records[0].get("email"),
        Some(&SqlValue::from("b@example.com"))
    );
}

#[tokio::test]
async fn test_external_change_detection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");

    let editor = Database::open(&path).unwrap();
    let other = Database::open(&path).unwrap();

    editor
        .query("CREATE TABLE t (x)", &[], QueryMode::ReadWrite)
        .await
        .unwrap();
    // Our own writes never count as external.
    assert!(!editor.external_change_detected().await.unwrap());

    other
        .query("INSERT INTO t VALUES (1)", &[], QueryMode::ReadWrite)
        .await
        .unwrap();
    assert!(editor.external_change_detected().await.unwrap());
    assert!(!editor.external_change_detected().await.unwrap());
}

#[tokio::test]
async fn test_blob_import_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blob.bin");
    let db = Database::open_in_memory().unwrap();

    db.export(&path, &[1, 2, 3]).await.unwrap();
    assert_eq!(db.import(&path).await.unwrap(), vec![1, 2, 3]);

    let err = db.import(&dir.path().join("missing.bin")).await.unwrap_err();
    assert!(matches!(err, GatewayError::Io(_)));
}

#[tokio::test]
async fn test_queued_gateway_preserves_order_and_ids() {
    let db = fixture().await;
    let queued = Arc::new(QueuedGateway::spawn(Arc::new(db)));

    let mut handles = Vec::new();
    for i in 0..10i64 {
        let queued = Arc::clone(&queued);
        handles.push(tokio::spawn(async move {
            queued
                .query("SELECT ? AS v", &[SqlValue::Integer(i)], QueryMode::Read)
                .await
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        let rows = handle.await.unwrap().unwrap();
        assert_eq!(rows.scalar(), Some(&SqlValue::Integer(i as i64)));
    }
    assert_eq!(queued.last_request_id(), 10);

    let tables = queued.table_list().await.unwrap();
    assert_eq!(tables.len(), 3);

    queued.shutdown();
    let err = queued.table_list().await.unwrap_err();
    assert!(matches!(err, GatewayError::Closed));
}

#[tokio::test]
async fn test_slow_statement_leaves_the_runtime_free() {
    let db = Arc::new(fixture().await);

    let slow = {
        let db = Arc::clone(&db);
        tokio::spawn(async move {
            db.query(
                r#"
                WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 2000000)
                SELECT COUNT(*) FROM n
                "#,
                &[],
                QueryMode::Read,
            )
            .await
        })
    };

    // The statement runs off the runtime thread, so a timer still fires.
    let ticked = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        tokio::time::sleep(std::time::Duration::from_millis(1)),
    )
    .await;
    assert!(ticked.is_ok());

    let rows = slow.await.unwrap().unwrap();
    assert_eq!(rows.scalar(), Some(&SqlValue::Integer(2_000_000)));

    let people = db
        .query("SELECT COUNT(*) FROM people", &[], QueryMode::Read)
        .await
        .unwrap();
    assert_eq!(people.scalar(), Some(&SqlValue::Integer(2)));
}
