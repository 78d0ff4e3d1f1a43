use pretty_assertions::assert_eq;
use sqlcraft::prelude::*;
use std::collections::BTreeMap;

fn render(query: &str, params: &ParameterValues) -> SqlCraftResult<String> {
    render_query(Dialect::Postgres, query, &BTreeMap::new(), params)
}

#[test]
fn test_limit_scenario() {
    let cmd = sqlcraft::load_from_str(
        r#"
name: ls
short: list
query: "SELECT * FROM t WHERE 1=1{{ if .limit }} LIMIT {{ .limit }}{{ end }}"
"#,
    )
    .unwrap()
    .remove(0);

    let ten: ParameterValues = [("limit", 10)].into_iter().collect();
    let zero: ParameterValues = [("limit", 0)].into_iter().collect();
    let rendered = render_query(Dialect::Postgres, &cmd.query, &cmd.sub_queries, &ten).unwrap();
    assert_eq!(rendered, "SELECT * FROM t WHERE 1=1 LIMIT 10");
    let rendered = render_query(Dialect::Postgres, &cmd.query, &cmd.sub_queries, &zero).unwrap();
    assert_eq!(rendered, "SELECT * FROM t WHERE 1=1");
}

#[test]
fn test_document_with_everything() {
    let cmd = sqlcraft::load_from_str(
        r#"
name: report
short: Job report
flags:
  - name: status
    type: stringList
  - name: owners
    type: stringList
    default: [alice, "o'neil"]
  - name: since
    type: date
    default: 2024-03-01
  - name: order
    type: choice
    choices: [id, created_at]
    default: created_at
subqueries:
  recent: |
    SELECT id FROM jobs
    WHERE created_at >= {{ sqlDate .since }}
  owned: SELECT id FROM jobs WHERE owner IN ({{ sqlStringIn .owners }})
query: |
  SELECT *
  FROM jobs
  WHERE id IN ({{ subquery "recent" }})
    AND id IN ({{ subquery "owned" }})
  {{ if .status }}
    AND status IN ({{ .status | sqlStringIn }})
  {{ end }}

  ORDER BY {{ .order }}
"#,
    )
    .unwrap()
    .remove(0);

    let layers = cmd.default_layers();
    let sql = cmd.render_query(Dialect::Postgres, &layers).unwrap();
    assert_eq!(
        sql,
        "SELECT *\nFROM jobs\nWHERE id IN (SELECT id FROM jobs\nWHERE created_at >= '2024-03-01')\n  AND id IN (SELECT id FROM jobs WHERE owner IN ('alice', 'o''neil'))\nORDER BY created_at"
    );
    assert!(!sql.contains("\n\n"));
}

#[test]
fn test_in_list_forms_valid_sql() {
    let params: ParameterValues = [("names", vec!["a", "b"])].into_iter().collect();
    let sql = render("SELECT * FROM t WHERE name IN ({{ sqlStringIn .names }})", &params).unwrap();
    assert_eq!(sql, "SELECT * FROM t WHERE name IN ('a', 'b')");

    let ids: ParameterValues = [("ids", vec![1, 2, 3])].into_iter().collect();
    let sql = render("SELECT * FROM t WHERE id IN ({{ sqlIntIn .ids }})", &ids).unwrap();
    assert_eq!(sql, "SELECT * FROM t WHERE id IN (1, 2, 3)");
}

#[test]
fn test_range_and_variables() {
    let params: ParameterValues = [("cols", vec!["id", "name"])].into_iter().collect();
    let sql = render(
        "SELECT {{ range $i, $c := .cols }}{{ if $i }}, {{ end }}{{ $c }}{{ end }} FROM t",
        &params,
    )
    .unwrap();
    assert_eq!(sql, "SELECT id, name FROM t");
}

#[test]
fn test_render_is_deterministic() {
    let params: ParameterValues = [("x", vec!["b", "a"])].into_iter().collect();
    let query = "SELECT {{ sqlStringIn .x }}";
    assert_eq!(render(query, &params).unwrap(), render(query, &params).unwrap());
}

#[test]
fn test_cyclic_sub_queries_fail() {
    let mut subs = BTreeMap::new();
    subs.insert("a".to_string(), "SELECT * FROM ({{ subquery \"b\" }})".to_string());
    subs.insert("b".to_string(), "SELECT * FROM ({{ subquery \"a\" }})".to_string());
    let err = render_query(
        Dialect::Postgres,
        "{{ subquery \"a\" }}",
        &subs,
        &ParameterValues::new(),
    )
    .unwrap_err();
    assert!(matches!(err, SqlCraftError::Render(_)));
    assert!(err.to_string().starts_with("could not render query"));
}

#[test]
fn test_missing_parameter_is_an_error() {
    let err = render("SELECT {{ .nope }}", &ParameterValues::new()).unwrap_err();
    assert!(matches!(err, SqlCraftError::Render(_)));
}

#[test]
fn test_file_parameter_fields() {
    let params: ParameterValues = [("f", FileData::new("a.sql", "SELECT 1"))].into_iter().collect();
    let sql = render("-- {{ .f.path }}\n{{ .f.content }}", &params).unwrap();
    assert_eq!(sql, "-- a.sql\nSELECT 1");
}
