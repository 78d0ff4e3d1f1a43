// Code generated by sqlcraft from command `ls-jobs`. DO NOT EDIT.

pub mod jobs {
    #![allow(unused_imports, unused_mut, dead_code)]

    use std::collections::BTreeMap;
    use std::io::Write;

    use sqlcraft::chrono::{DateTime, Utc};
    use sqlcraft::prelude::*;

    pub const LS_JOBS_COMMAND_QUERY: &str = r#"SELECT * FROM jobs
WHERE id IN ({{ subquery "done" }})
{{ if .status }}AND status IN ({{ .status | sqlStringIn }}){{ end }}
LIMIT {{ .limit }}
"#;
    pub const LS_JOBS_COMMAND_SUB_QUERY_DONE: &str = "SELECT id FROM jobs WHERE status = 'done'";

    pub struct LsJobsCommand {
        pub description: CommandDescription,
        pub query: String,
        pub sub_queries: BTreeMap<String, String>,
        pub connection: Option<Box<dyn Connection>>,
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct LsJobsCommandParameters {
        pub status: Vec<String>,
        pub limit: i64,
    }

    impl LsJobsCommandParameters {
        pub fn from_values(values: &ParameterValues) -> SqlCraftResult<Self> {
            Ok(Self {
                status: values.extract("status")?,
                limit: values.extract("limit")?,
            })
        }

        pub fn to_values(&self) -> ParameterValues {
            let mut values = ParameterValues::new();
            values.insert("status", self.status.clone());
            values.insert("limit", self.limit.clone());
            values
        }
    }

    impl LsJobsCommand {
        pub fn render_query(&self, dialect: Dialect, params: &LsJobsCommandParameters) -> SqlCraftResult<String> {
            render_query(dialect, &self.query, &self.sub_queries, &params.to_values())
        }

        pub async fn run_query_into_sink(
            &mut self,
            params: &LsJobsCommandParameters,
            sink: &mut dyn RowSink,
        ) -> SqlCraftResult<usize> {
            let connection = self.connection.as_mut().ok_or(SqlCraftError::MissingConnection)?;
            let query = render_query(connection.dialect(), &self.query, &self.sub_queries, &params.to_values())?;
            run_query(connection.as_mut(), &query, &[], sink).await
        }
    }

    impl LsJobsCommand {
        pub async fn run_into_sink(
            &mut self,
            layers: &ParsedLayers,
            sink: &mut dyn RowSink,
            out: &mut (dyn Write + Send),
        ) -> SqlCraftResult<RunOutcome> {
            let connection = self.connection.as_mut().ok_or(SqlCraftError::MissingConnection)?;
            connection.ping().await?;
            let params = LsJobsCommandParameters::from_values(&layers.merged())?;
            let query = render_query(connection.dialect(), &self.query, &self.sub_queries, &params.to_values())?;
            let query = apply_helpers(layers, query);
            if layers.print_query() {
                return print_query(out, &query);
            }
            let rows = run_query(connection.as_mut(), &query, &[], sink).await?;
            Ok(RunOutcome::Streamed { rows })
        }
    }

    impl LsJobsCommand {
        pub fn new(connection: Box<dyn Connection>) -> SqlCraftResult<Self> {
            let flags = ParameterCollection::new(vec![
                ParameterDefinition::new("status", ParameterKind::StringList)
                    .with_help("Filter by status"),
                ParameterDefinition::new("limit", ParameterKind::Integer)
                    .with_help("")
                    .with_short_flag("l")
                    .with_default(Value::Integer(10)),
            ])?;
            let arguments = ParameterCollection::new(Vec::new())?;

            let description = CommandDescription::new("ls-jobs")
                .with_short("List jobs")
                .with_long("")
                .with_flags(flags)
                .with_arguments(arguments)
                .with_layers(ParameterLayer::standard()?);

            let mut sub_queries = BTreeMap::new();
            sub_queries.insert("done".to_string(), LS_JOBS_COMMAND_SUB_QUERY_DONE.to_string());

            Ok(Self {
                description,
                query: LS_JOBS_COMMAND_QUERY.to_string(),
                sub_queries,
                connection: Some(connection),
            })
        }
    }
}
