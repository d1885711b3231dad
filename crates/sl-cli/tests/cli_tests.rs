use crossterm::event::{KeyCode, KeyModifiers};
use sl_cli::browse::{run_query, FindArgs, ShowArgs};
use sl_cli::interactive::{execute, parse_command, parse_key, Command};
use sl_cli::session::{Session, SessionOptions};
use sl_cli::transfer::{import_rows, read_csv, ExportArgs, Format, ImportArgs};
use sl_cli::{render, Cli, Commands, Parser};
use sl_editor::{ConfirmChoice, DraftRequest, FieldEdit, Msg};
use sl_gateway::{Gateway, QueryMode, SqlValue};

#[test]
fn test_cli_parsing_tables() {
    let cli = Cli::try_parse_from(["sheetlite", "app.db", "tables"]).unwrap();
    assert_eq!(cli.database.to_str(), Some("app.db"));
    assert!(matches!(cli.command, Commands::Tables));
    assert!(!cli.options.read_only);
}

#[test]
fn test_cli_parsing_show() {
    let args = vec![
        "sheetlite",
        "app.db",
        "show",
        "people",
        "--top",
        "40",
        "--rows",
        "10",
        "--find",
        "^a",
        "--regex",
        "--json",
    ];

    let cli = Cli::try_parse_from(args).unwrap();
    let Commands::Show(show) = cli.command else {
        panic!("expected show");
    };
    assert_eq!(show.table.as_deref(), Some("people"));
    assert_eq!(show.top, 40);
    assert_eq!(show.rows, Some(10));
    assert_eq!(show.filter.find.as_deref(), Some("^a"));
    assert!(show.filter.regex);
    assert!(!show.filter.case_sensitive);
    assert!(show.json);
}

#[test]
fn test_cli_parsing_global_options_after_subcommand() {
    let args = vec![
        "sheetlite",
        "app.db",
        "exec",
        "SELECT 1",
        "--read-only",
        "--page-size",
        "50",
        "--log-level",
        "debug",
    ];

    let cli = Cli::try_parse_from(args).unwrap();
    assert!(matches!(cli.command, Commands::Exec(_)));
    assert!(cli.options.read_only);
    assert_eq!(cli.options.page_size, Some(50));
    assert_eq!(cli.log_level.as_deref(), Some("debug"));

    let config = cli.options.editor_config().unwrap();
    assert_eq!(config.default_visible_area_size, 50);
    assert!(config.auto_reload);
}

#[test]
fn test_cli_rejects_zero_rows() {
    assert!(Cli::try_parse_from(["sheetlite", "app.db", "show", "--rows", "0"]).is_err());
    assert!(Cli::try_parse_from(["sheetlite", "app.db", "--page-size", "0", "tables"]).is_err());
}

#[test]
fn test_cli_requires_database() {
    assert!(Cli::try_parse_from(["sheetlite"]).is_err());
}

#[test]
fn test_parse_commands() {
    assert_eq!(parse_command("").unwrap(), None);
    assert_eq!(parse_command("  # note").unwrap(), None);
    assert_eq!(parse_command("q").unwrap(), Some(Command::Quit));
    assert_eq!(
        parse_command("sql SELECT * FROM t").unwrap(),
        Some(Command::Sql("SELECT * FROM t".into()))
    );
    assert_eq!(
        parse_command("select my table").unwrap(),
        Some(Command::Editor(Msg::SelectTable("my table".into())))
    );
    assert_eq!(
        parse_command("edit 3 1").unwrap(),
        Some(Command::Editor(Msg::OpenDraft(DraftRequest::Update {
            row: 3,
            column: 1
        })))
    );
    assert_eq!(
        parse_command("set 0 hello world").unwrap(),
        Some(Command::Editor(Msg::FieldChanged {
            field: 0,
            edit: FieldEdit::Text("hello world".into())
        }))
    );
    assert_eq!(
        parse_command("confirm discard").unwrap(),
        Some(Command::Editor(Msg::Confirm(ConfirmChoice::Discard)))
    );
}

#[test]
fn test_parse_command_errors() {
    assert!(parse_command("edit 3").is_err());
    assert!(parse_command("top -x").is_err());
    assert!(parse_command("regex maybe").is_err());
    assert!(parse_command("confirm later").is_err());
    assert!(parse_command("select").is_err());
    assert!(parse_command("frobnicate").is_err());
}

#[test]
fn test_parse_keys() {
    let key = parse_key("shift+enter").unwrap();
    assert_eq!(key.code, KeyCode::Enter);
    assert!(key.modifiers.contains(KeyModifiers::SHIFT));

    let key = parse_key("ctrl+end").unwrap();
    assert_eq!(key.code, KeyCode::End);
    assert!(key.modifiers.contains(KeyModifiers::CONTROL));

    assert_eq!(parse_key("PgDn").unwrap().code, KeyCode::PageDown);
    assert_eq!(parse_key("x").unwrap().code, KeyCode::Char('x'));
    assert!(parse_key("hyper+z").is_err());
}

async fn seeded_session() -> (tempfile::TempDir, Session) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.db");
    let options = SessionOptions {
        no_preferences: true,
        ..Default::default()
    };
    let mut session = Session::open(&path, &options).await.unwrap();
    session
        .gateway()
        .query(
            "CREATE TABLE people (name TEXT, age INTEGER);
             WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 30)
             INSERT INTO people SELECT 'person ' || i, 20 + i FROM n;
             INSERT INTO people VALUES ('nobody', NULL);",
            &[],
            QueryMode::Script,
        )
        .await
        .unwrap();
    session.editor.full_reload().await.unwrap();
    (dir, session)
}

#[tokio::test]
async fn test_show_renders_requested_window() {
    let (_dir, mut session) = seeded_session().await;
    let show = ShowArgs {
        table: Some("people".into()),
        top: 5,
        rows: Some(3),
        ..Default::default()
    };

    let out = show.render(&mut session.editor).await.unwrap();
    assert!(out.contains("name"));
    assert!(out.contains("person 6"));
    assert!(out.contains("person 8"));
    assert!(!out.contains("person 9"));
    assert!(out.contains("people: rows 6-8 of 31"));

    session.close().await;
}

#[tokio::test]
async fn test_show_json_with_find() {
    let (_dir, mut session) = seeded_session().await;
    let show = ShowArgs {
        table: Some("people".into()),
        filter: FindArgs {
            find: Some("nobody".into()),
            ..Default::default()
        },
        json: true,
        ..Default::default()
    };

    let out = show.render(&mut session.editor).await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["table"], "people");
    assert_eq!(value["total"], 1);
    assert_eq!(value["rows"][0]["cells"]["name"], "nobody");
    assert!(value["rows"][0]["cells"]["age"].is_null());

    session.close().await;
}

#[tokio::test]
async fn test_show_unknown_table_fails() {
    let (_dir, mut session) = seeded_session().await;
    let show = ShowArgs {
        table: Some("missing".into()),
        ..Default::default()
    };
    assert!(show.render(&mut session.editor).await.is_err());
    session.close().await;
}

#[tokio::test]
async fn test_run_query_returns_rows_and_errors() {
    let (_dir, mut session) = seeded_session().await;

    let result = run_query(&mut session.editor, "SELECT count(*) AS n FROM people")
        .await
        .unwrap();
    let out = render::query_result(&result);
    assert!(out.contains("31"));
    assert!(out.ends_with("(1 rows)"));

    assert!(run_query(&mut session.editor, "SELECT * FROM nowhere")
        .await
        .is_err());

    session.close().await;
}

#[tokio::test]
async fn test_interactive_edit_flow() {
    let (_dir, mut session) = seeded_session().await;
    let editor = &mut session.editor;

    for line in ["select people", "edit 0 0", "set 0 renamed"] {
        let command = parse_command(line).unwrap().unwrap();
        let out = execute(editor, command).await;
        assert!(!out.starts_with("error"), "{line}: {out}");
    }

    let out = execute(editor, parse_command("top 10").unwrap().unwrap()).await;
    assert!(out.contains("unsaved changes"));

    let out = execute(editor, parse_command("confirm commit").unwrap().unwrap()).await;
    assert!(out.contains("people: rows 11-"));

    let result = run_query(editor, "SELECT name FROM people WHERE rowid = 1")
        .await
        .unwrap();
    assert!(render::query_result(&result).contains("renamed"));

    session.close().await;
}

#[tokio::test]
async fn test_tables_listing() {
    let (_dir, mut session) = seeded_session().await;
    run_query(&mut session.editor, "CREATE VIEW adults AS SELECT * FROM people WHERE age >= 40")
        .await
        .unwrap();

    let listing = render::tables(&session.editor.tables());
    assert!(listing.contains("people"));
    assert!(listing.contains("adults"));
    assert!(listing.contains("view"));

    session.close().await;
}

async fn run_line<G: Gateway + 'static>(editor: &mut sl_editor::Editor<G>, line: &str) -> String {
    let command = parse_command(line).unwrap().unwrap();
    execute(editor, command).await
}

#[tokio::test]
async fn test_quit_asks_before_dropping_an_edit() {
    let (_dir, mut session) = seeded_session().await;
    let editor = &mut session.editor;
    for line in ["select people", "edit 0 1", "set 0 999"] {
        run_line(editor, line).await;
    }

    let out = run_line(editor, "quit").await;
    assert!(out.contains("unsaved changes"));
    assert!(!editor.is_closed());

    run_line(editor, "confirm cancel").await;
    assert!(!editor.is_closed());
    assert!(editor.draft().unwrap().dirty_update().is_some());

    run_line(editor, "quit").await;
    run_line(editor, "confirm commit").await;
    assert!(editor.is_closed());

    let stored = session
        .gateway()
        .query("SELECT age FROM people WHERE rowid = 1", &[], QueryMode::Read)
        .await
        .unwrap();
    assert_eq!(stored.scalar(), Some(&sl_gateway::SqlValue::Integer(999)));
    session.close().await;
}

#[tokio::test]
async fn test_quit_without_edits_closes_at_once() {
    let (_dir, mut session) = seeded_session().await;
    assert_eq!(run_line(&mut session.editor, "quit").await, "bye");
    assert!(session.editor.is_closed());
    session.close().await;
}

#[test]
fn test_parse_schema_commands() {
    let Some(Command::CreateTable(table)) =
        parse_command("create-table pets strict id:INTEGER:pk name:TEXT:notnull").unwrap()
    else {
        panic!("expected create-table");
    };
    assert_eq!(table.table_name, "pets");
    assert!(table.strict);
    assert!(!table.without_rowid);
    assert_eq!(table.columns.len(), 2);
    assert!(table.columns[0].primary_key);
    assert!(table.columns[1].not_null);
    assert!(parse_command("create-table pets").is_err());
    assert!(parse_command("create-table pets id:INTEGER:sideways").is_err());

    let Some(Command::CreateIndex(index)) =
        parse_command("create-index unique by_name name age where age > 3").unwrap()
    else {
        panic!("expected create-index");
    };
    assert!(index.unique);
    assert_eq!(index.index_name, "by_name");
    assert_eq!(index.indexed_columns, "name, age");
    assert_eq!(index.where_clause, "age > 3");

    assert_eq!(parse_command("selector 1").unwrap(), Some(Command::Selector(1)));
    assert_eq!(
        parse_command("width name 30").unwrap(),
        Some(Command::Width("name".into(), 30))
    );
    assert_eq!(parse_command("query-mode").unwrap(), Some(Command::QueryMode));
}

#[tokio::test]
async fn test_interactive_schema_edits() {
    let (_dir, mut session) = seeded_session().await;
    let editor = &mut session.editor;

    run_line(editor, "create-table pets id:INTEGER:pk name:TEXT").await;
    let out = run_line(editor, "commit").await;
    assert!(out.contains("pets: rows 0-0 of 0"), "{out}");
    assert_eq!(editor.selected_table(), Some("pets"));

    run_line(editor, "add-column born INTEGER").await;
    run_line(editor, "commit").await;
    run_line(editor, "rename-column name title").await;
    run_line(editor, "commit").await;
    let columns: Vec<String> = editor
        .snapshot()
        .unwrap()
        .columns
        .iter()
        .map(|c| c.name.clone())
        .collect();
    assert_eq!(columns, vec!["id", "title", "born"]);

    run_line(editor, "create-index by_title title").await;
    run_line(editor, "commit").await;
    let indexes = session.gateway().index_list("pets").await.unwrap();
    assert!(indexes.iter().any(|i| i.name == "by_title"));
    session.close().await;
}

#[test]
fn test_cli_parsing_export_and_import() {
    let cli = Cli::try_parse_from([
        "sheetlite", "app.db", "export", "people", "--find", "ann", "--format", "json", "-o",
        "out.json",
    ])
    .unwrap();
    let Commands::Export(export) = cli.command else {
        panic!("expected export");
    };
    assert_eq!(export.table.as_deref(), Some("people"));
    assert_eq!(export.filter.find.as_deref(), Some("ann"));
    assert_eq!(export.format, Format::Json);
    assert_eq!(export.output.as_deref(), Some(std::path::Path::new("out.json")));

    assert!(
        Cli::try_parse_from(["sheetlite", "app.db", "export", "people", "--query", "SELECT 1"])
            .is_err()
    );

    let cli = Cli::try_parse_from([
        "sheetlite", "app.db", "import", "copy", "--format", "tsv", "--input", "in.tsv",
    ])
    .unwrap();
    let Commands::Import(import) = cli.command else {
        panic!("expected import");
    };
    assert_eq!(import.table, "copy");
    assert_eq!(import.format, Format::Tsv);
}

#[tokio::test]
async fn test_export_filtered_table_as_csv() {
    let (dir, mut session) = seeded_session().await;
    let path = dir.path().join("nobody.csv");
    let export = ExportArgs {
        table: Some("people".into()),
        filter: FindArgs {
            find: Some("nobody".into()),
            ..Default::default()
        },
        output: Some(path.clone()),
        ..Default::default()
    };
    export.run(&mut session).await.unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "name,age\nnobody,\n");
    session.close().await;
}

#[tokio::test]
async fn test_export_query_as_json() {
    let (dir, mut session) = seeded_session().await;
    let path = dir.path().join("row.json");
    let export = ExportArgs {
        query: Some(r#"SELECT 1 AS n, 'a"b' AS s, x'00ff' AS b, NULL AS z, 1.5 AS r"#.into()),
        format: Format::Json,
        output: Some(path.clone()),
        ..Default::default()
    };
    export.run(&mut session).await.unwrap();

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "[{\"n\":1,\"s\":\"a\\\"b\",\"b\":\"AP8=\",\"z\":null,\"r\":1.5}]\n"
    );

    let writes = ExportArgs {
        query: Some("DELETE FROM people".into()),
        output: Some(dir.path().join("never.csv")),
        ..Default::default()
    };
    assert!(writes.run(&mut session).await.is_err());
    let count = run_query(&mut session.editor, "SELECT count(*) FROM people")
        .await
        .unwrap();
    assert_eq!(count.scalar(), Some(&SqlValue::Integer(31)));
    session.close().await;
}

#[tokio::test]
async fn test_import_exported_tsv_and_json() {
    let (dir, mut session) = seeded_session().await;
    let tsv = dir.path().join("people.tsv");
    ExportArgs {
        table: Some("people".into()),
        format: Format::Tsv,
        output: Some(tsv.clone()),
        ..Default::default()
    }
    .run(&mut session)
    .await
    .unwrap();

    ImportArgs {
        table: "copy".into(),
        format: Format::Tsv,
        delimiter: None,
        input: Some(tsv),
    }
    .run(&mut session)
    .await
    .unwrap();
    assert!(session.editor.tables().iter().any(|t| t.name == "copy"));
    let copied = run_query(
        &mut session.editor,
        "SELECT count(*), sum(age = ''), max(typeof(age)) FROM copy",
    )
    .await
    .unwrap();
    let row = &copied.records[0];
    assert_eq!(row.get("count(*)"), Some(&SqlValue::Integer(31)));
    assert_eq!(row.get("sum(age = '')"), Some(&SqlValue::Integer(1)));
    assert_eq!(row.get("max(typeof(age))"), Some(&SqlValue::Text("text".into())));

    let json = dir.path().join("pets.json");
    std::fs::write(&json, r#"[{"name": "Rex", "legs": 4}, {"name": null, "tail": true}]"#).unwrap();
    ImportArgs {
        table: "pets".into(),
        format: Format::Json,
        delimiter: None,
        input: Some(json),
    }
    .run(&mut session)
    .await
    .unwrap();
    let pets = run_query(
        &mut session.editor,
        "SELECT name, legs, tail FROM pets ORDER BY rowid",
    )
    .await
    .unwrap();
    assert_eq!(pets.records.len(), 2);
    assert_eq!(pets.records[0].get("name"), Some(&SqlValue::Text("Rex".into())));
    assert_eq!(pets.records[0].get("legs"), Some(&SqlValue::Text("4".into())));
    assert_eq!(pets.records[0].get("tail"), Some(&SqlValue::Null));
    assert_eq!(pets.records[1].get("name"), Some(&SqlValue::Null));
    assert_eq!(pets.records[1].get("tail"), Some(&SqlValue::Text("true".into())));
    session.close().await;
}

#[tokio::test]
async fn test_failed_import_rolls_back() {
    let (_dir, mut session) = seeded_session().await;
    let gateway = session.gateway().clone();

    let (columns, rows) = read_csv(b"name,age\nann,3\n", b',').unwrap();
    assert!(import_rows(gateway.as_ref(), "people", &columns, &rows)
        .await
        .is_err());

    // The failed transaction is closed, so the next import commits.
    let count = import_rows(gateway.as_ref(), "fresh", &columns, &rows)
        .await
        .unwrap();
    assert_eq!(count, 1);
    session.editor.full_reload().await.unwrap();
    let people = run_query(&mut session.editor, "SELECT count(*) FROM people")
        .await
        .unwrap();
    assert_eq!(people.scalar(), Some(&SqlValue::Integer(31)));

    assert!(read_csv(b"a,b\n1\n", b',').is_err());
    assert!(read_csv(b"", b',').is_err());
    session.close().await;
}
