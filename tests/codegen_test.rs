use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use sqlcraft::codegen::SqlCommandCodeGenerator;
use sqlcraft::layers::{PRINT_QUERY, SQL_HELPERS_SLUG};
use sqlcraft::prelude::*;
use std::sync::{Arc, Mutex};

include!("generated/ls_jobs.rs");
include!("generated/page_jobs.rs");

use jobs::{LsJobsCommand, LsJobsCommandParameters};
use pages::{PageJobsCommand, PageJobsCommandParameters};

const LS_JOBS: &str = include_str!("fixtures/ls-jobs.yaml");
const GENERATED: &str = include_str!("generated/ls_jobs.rs");
const PAGE_JOBS: &str = include_str!("fixtures/page-jobs.yaml");
const GENERATED_PAGE_JOBS: &str = include_str!("generated/page_jobs.rs");

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[derive(Default)]
struct Log {
    executed: Vec<String>,
    pings: usize,
}

struct RecordingConnection {
    log: Arc<Mutex<Log>>,
}

#[async_trait]
impl Connection for RecordingConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn ping(&mut self) -> SqlCraftResult<()> {
        self.log.lock().unwrap().pings += 1;
        Ok(())
    }

    async fn stream_query(
        &mut self,
        sql: &str,
        _bindings: &[Value],
        sink: &mut dyn RowSink,
    ) -> SqlCraftResult<usize> {
        self.log.lock().unwrap().executed.push(sql.to_string());
        sink.push([("id", json!(1))].into_iter().collect())?;
        Ok(1)
    }

    async fn close(self: Box<Self>) -> SqlCraftResult<()> {
        Ok(())
    }
}

fn generated_command() -> (LsJobsCommand, Arc<Mutex<Log>>) {
    let log = Arc::new(Mutex::new(Log::default()));
    let connection = RecordingConnection {
        log: Arc::clone(&log),
    };
    (LsJobsCommand::new(Box::new(connection)).unwrap(), log)
}

#[test]
fn test_generator_output_matches_checked_in_code() {
    let cmd = sqlcraft::load_from_str(LS_JOBS).unwrap().remove(0);
    let code = SqlCommandCodeGenerator::new("jobs").generate(&cmd).unwrap();
    assert_eq!(strip_whitespace(&code), strip_whitespace(GENERATED));
}

#[test]
fn test_generated_description_matches_document() {
    let loaded = sqlcraft::load_from_str(LS_JOBS).unwrap().remove(0);
    let (generated, _) = generated_command();
    assert_eq!(generated.description, loaded.description);
    assert_eq!(generated.query, loaded.query);
    assert_eq!(generated.sub_queries, loaded.sub_queries);
}

#[test]
fn test_generated_render_matches_interpreted_render() {
    let loaded = sqlcraft::load_from_str(LS_JOBS).unwrap().remove(0);
    let (generated, _) = generated_command();
    let params = LsJobsCommandParameters {
        status: vec!["done".into(), "failed".into()],
        limit: 5,
    };

    let from_generated = generated.render_query(Dialect::Postgres, &params).unwrap();
    let from_document =
        render_query(Dialect::Postgres, &loaded.query, &loaded.sub_queries, &params.to_values())
            .unwrap();
    assert_eq!(from_generated, from_document);
    assert_eq!(
        from_generated,
        "SELECT * FROM jobs\nWHERE id IN (SELECT id FROM jobs WHERE status = 'done')\nAND status IN ('done', 'failed')\nLIMIT 5"
    );
}

#[test]
fn test_parameter_conversions() {
    let params = LsJobsCommandParameters {
        status: vec!["done".into()],
        limit: 3,
    };
    let values = params.to_values();
    assert_eq!(values.get("limit"), Some(&Value::Integer(3)));
    assert_eq!(LsJobsCommandParameters::from_values(&values).unwrap(), params);
}

#[tokio::test]
async fn test_generated_run_uses_layer_defaults() {
    let (mut generated, log) = generated_command();
    let layers = ParsedLayers::from_defaults(&generated.description);
    let mut sink = VecSink::default();
    let mut out = Vec::new();

    let outcome = generated
        .run_into_sink(&layers, &mut sink, &mut out)
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Streamed { rows: 1 });
    assert_eq!(sink.rows.len(), 1);
    assert!(out.is_empty());

    let log = log.lock().unwrap();
    assert_eq!(log.pings, 1);
    assert_eq!(
        log.executed,
        vec!["SELECT * FROM jobs\nWHERE id IN (SELECT id FROM jobs WHERE status = 'done')\nLIMIT 10"]
    );
}

#[tokio::test]
async fn test_generated_print_query() {
    let (mut generated, log) = generated_command();
    let mut layers = ParsedLayers::from_defaults(&generated.description);
    layers.set(SQL_HELPERS_SLUG, PRINT_QUERY, true);
    let mut sink = VecSink::default();
    let mut out = Vec::new();

    let outcome = generated
        .run_into_sink(&layers, &mut sink, &mut out)
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::ExitWithoutOutput { .. }));
    assert!(String::from_utf8(out).unwrap().starts_with("SELECT * FROM jobs\n"));
    assert!(sink.rows.is_empty());
    assert!(log.lock().unwrap().executed.is_empty());
}

#[tokio::test]
async fn test_generated_run_without_connection() {
    let (mut generated, _) = generated_command();
    generated.connection = None;
    let params = LsJobsCommandParameters::default();
    let err = generated
        .run_query_into_sink(&params, &mut VecSink::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SqlCraftError::MissingConnection));
}

#[test]
fn test_generator_output_without_sub_queries() {
    let cmd = sqlcraft::load_from_str(PAGE_JOBS).unwrap().remove(0);
    let code = SqlCommandCodeGenerator::new("pages").generate(&cmd).unwrap();
    assert_eq!(strip_whitespace(&code), strip_whitespace(GENERATED_PAGE_JOBS));
}

#[test]
fn test_unset_parameters_render_the_same_on_both_paths() {
    let loaded = sqlcraft::load_from_str(PAGE_JOBS).unwrap().remove(0);
    let generated = PageJobsCommand::new(Box::new(RecordingConnection {
        log: Arc::new(Mutex::new(Log::default())),
    }))
    .unwrap();

    let layers = loaded.default_layers();
    let interpreted = loaded.render_query(Dialect::Postgres, &layers).unwrap();
    let params = PageJobsCommandParameters::from_values(&layers.merged()).unwrap();
    let compiled = generated.render_query(Dialect::Postgres, &params).unwrap();

    assert_eq!(params, PageJobsCommandParameters::default());
    assert_eq!(interpreted, compiled);
    assert_eq!(interpreted, "SELECT * FROM jobs LIMIT 0");
}

#[tokio::test]
async fn test_unset_parameters_execute_the_same_on_both_paths() {
    let loaded = sqlcraft::load_from_str(PAGE_JOBS).unwrap().remove(0);
    let log = Arc::new(Mutex::new(Log::default()));
    let mut generated = PageJobsCommand::new(Box::new(RecordingConnection {
        log: Arc::clone(&log),
    }))
    .unwrap();

    let mut layers = loaded.default_layers();
    layers.set("default", "owner", "o'neil");
    generated
        .run_into_sink(&layers, &mut VecSink::default(), &mut Vec::new())
        .await
        .unwrap();

    let interpreted = loaded.render_query(Dialect::Sqlite, &layers).unwrap();
    assert_eq!(log.lock().unwrap().executed, vec![interpreted]);
    assert_eq!(
        log.lock().unwrap().executed[0],
        "SELECT * FROM jobs WHERE owner = 'o''neil' LIMIT 0"
    );
}
