use sqlcraft::engine::{SqlxConnection, SqlxConnectionFactory};
use sqlcraft::layers::{PRINT_QUERY, SQL_CONNECTION_SLUG, SQL_HELPERS_SLUG};
use sqlcraft::prelude::*;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

const LS_JOBS: &str = r#"
name: ls-jobs
short: List jobs
flags:
  - name: status
    type: stringList
subqueries:
  recent: SELECT id FROM jobs WHERE id > 1
query: |
  SELECT id, status FROM jobs
  WHERE id IN ({{ subquery "recent" }})
  {{ if .status }}AND status IN ({{ .status | sqlStringIn }}){{ end }}
  ORDER BY id
"#;

struct TempDb {
    path: PathBuf,
}

impl TempDb {
    async fn create(tag: &str) -> Self {
        let path = std::env::temp_dir().join(format!("sqlcraft-{}-{}.db", tag, std::process::id()));
        let _ = std::fs::remove_file(&path);
        let mut conn = SqlxConnection::connect(&format!("sqlite:{}?mode=rwc", path.display()))
            .await
            .unwrap();
        let mut sink = VecSink::default();
        for sql in [
            "CREATE TABLE jobs (id INTEGER PRIMARY KEY, status TEXT NOT NULL, note TEXT)",
            "INSERT INTO jobs (id, status, note) VALUES (1, 'done', 'first'), (2, 'failed', NULL), (3, 'done', NULL)",
        ] {
            run_query(&mut conn, sql, &[], &mut sink).await.unwrap();
        }
        Box::new(conn).close().await.unwrap();
        Self { path }
    }

    fn layers(&self, cmd: &SqlCommand) -> ParsedLayers {
        let mut layers = cmd.default_layers();
        layers.set(SQL_CONNECTION_SLUG, "db-type", "sqlite");
        layers.set(SQL_CONNECTION_SLUG, "database", self.path.display().to_string());
        layers
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn ls_jobs() -> SqlCommand {
    sqlcraft::load_from_str(LS_JOBS)
        .unwrap()
        .remove(0)
        .with_connection_factory(Arc::new(SqlxConnectionFactory))
}

#[tokio::test]
async fn test_run_command_against_sqlite() {
    let db = TempDb::create("run").await;
    let cmd = ls_jobs();
    let mut layers = db.layers(&cmd);
    layers.set("default", "status", vec!["done"]);

    let mut sink = VecSink::default();
    let outcome = cmd.run(&layers, &mut sink, &mut Vec::new()).await.unwrap();
    assert_eq!(outcome, RunOutcome::Streamed { rows: 1 });
    assert_eq!(sink.rows[0].get("id"), Some(&json!(3)));
    assert_eq!(sink.rows[0].get("status"), Some(&json!("done")));
}

#[tokio::test]
async fn test_unset_filter_returns_all_recent() {
    let db = TempDb::create("all").await;
    let cmd = ls_jobs();
    let mut sink = VecSink::default();
    cmd.run(&db.layers(&cmd), &mut sink, &mut Vec::new()).await.unwrap();
    let ids: Vec<_> = sink.rows.iter().filter_map(|r| r.get("id").cloned()).collect();
    assert_eq!(ids, vec![json!(2), json!(3)]);
}

#[tokio::test]
async fn test_print_query_against_sqlite() {
    let db = TempDb::create("print").await;
    let cmd = ls_jobs();
    let mut layers = db.layers(&cmd);
    layers.set(SQL_HELPERS_SLUG, PRINT_QUERY, true);

    let mut sink = VecSink::default();
    let mut out = Vec::new();
    let outcome = cmd.run(&layers, &mut sink, &mut out).await.unwrap();
    let expected = "SELECT id, status FROM jobs\nWHERE id IN (SELECT id FROM jobs WHERE id > 1)\nORDER BY id";
    assert_eq!(
        outcome,
        RunOutcome::ExitWithoutOutput {
            query: expected.to_string()
        }
    );
    assert_eq!(String::from_utf8(out).unwrap(), format!("{}\n", expected));
    assert!(sink.rows.is_empty());
}

#[tokio::test]
async fn test_raw_query_with_bindings_and_nulls() {
    let db = TempDb::create("raw").await;
    let cmd = SqlCommand::new(
        CommandDescription::new("query").with_short("query"),
        "SELECT id, note FROM jobs WHERE status = ? ORDER BY id",
        Default::default(),
    )
    .unwrap()
    .with_connection_factory(Arc::new(SqlxConnectionFactory));

    let mut sink = VecSink::default();
    let outcome = cmd
        .run_raw(&db.layers(&cmd), &[Value::from("done")], &mut sink, &mut Vec::new())
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Streamed { rows: 2 });
    assert_eq!(sink.rows[0].get("note"), Some(&json!("first")));
    assert_eq!(sink.rows[1].get("note"), Some(&json!(null)));
}

#[tokio::test]
async fn test_database_error_is_execution_error() {
    let db = TempDb::create("error").await;
    let mut cmd = ls_jobs();
    cmd.query = "SELECT * FROM missing_table".to_string();
    let err = cmd
        .run(&db.layers(&cmd), &mut VecSink::default(), &mut Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SqlCraftError::Execution(_)), "{err}");
}
