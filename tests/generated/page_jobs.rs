// Code generated by sqlcraft from command `page-jobs`. DO NOT EDIT.

pub mod pages {
    #![allow(unused_imports, unused_mut, dead_code)]

    use std::collections::BTreeMap;
    use std::io::Write;

    use sqlcraft::chrono::{DateTime, Utc};
    use sqlcraft::prelude::*;

    pub const PAGE_JOBS_COMMAND_QUERY: &str = "SELECT * FROM jobs{{ if .owner }} WHERE owner = {{ sqlString .owner }}{{ end }} LIMIT {{ .limit }}";

    pub struct PageJobsCommand {
        pub description: CommandDescription,
        pub query: String,
        pub sub_queries: BTreeMap<String, String>,
        pub connection: Option<Box<dyn Connection>>,
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct PageJobsCommandParameters {
        pub owner: String,
        pub limit: i64,
    }

    impl PageJobsCommandParameters {
        pub fn from_values(values: &ParameterValues) -> SqlCraftResult<Self> {
            Ok(Self {
                owner: values.extract("owner")?,
                limit: values.extract("limit")?,
            })
        }

        pub fn to_values(&self) -> ParameterValues {
            let mut values = ParameterValues::new();
            values.insert("owner", self.owner.clone());
            values.insert("limit", self.limit.clone());
            values
        }
    }

    impl PageJobsCommand {
        pub fn render_query(&self, dialect: Dialect, params: &PageJobsCommandParameters) -> SqlCraftResult<String> {
            render_query(dialect, &self.query, &self.sub_queries, &params.to_values())
        }

        pub async fn run_query_into_sink(
            &mut self,
            params: &PageJobsCommandParameters,
            sink: &mut dyn RowSink,
        ) -> SqlCraftResult<usize> {
            let connection = self.connection.as_mut().ok_or(SqlCraftError::MissingConnection)?;
            let query = render_query(connection.dialect(), &self.query, &self.sub_queries, &params.to_values())?;
            run_query(connection.as_mut(), &query, &[], sink).await
        }
    }

    impl PageJobsCommand {
        pub async fn run_into_sink(
            &mut self,
            layers: &ParsedLayers,
            sink: &mut dyn RowSink,
            out: &mut (dyn Write + Send),
        ) -> SqlCraftResult<RunOutcome> {
            let connection = self.connection.as_mut().ok_or(SqlCraftError::MissingConnection)?;
            connection.ping().await?;
            let params = PageJobsCommandParameters::from_values(&layers.merged())?;
            let query = render_query(connection.dialect(), &self.query, &self.sub_queries, &params.to_values())?;
            let query = apply_helpers(layers, query);
            if layers.print_query() {
                return print_query(out, &query);
            }
            let rows = run_query(connection.as_mut(), &query, &[], sink).await?;
            Ok(RunOutcome::Streamed { rows })
        }
    }

    impl PageJobsCommand {
        pub fn new(connection: Box<dyn Connection>) -> SqlCraftResult<Self> {
            let flags = ParameterCollection::new(vec![
                ParameterDefinition::new("owner", ParameterKind::String)
                    .with_help("Only jobs of this owner"),
                ParameterDefinition::new("limit", ParameterKind::Integer)
                    .with_help(""),
            ])?;
            let arguments = ParameterCollection::new(Vec::new())?;

            let description = CommandDescription::new("page-jobs")
                .with_short("Page through jobs")
                .with_long("")
                .with_flags(flags)
                .with_arguments(arguments)
                .with_layers(ParameterLayer::standard()?);

            let mut sub_queries = BTreeMap::new();

            Ok(Self {
                description,
                query: PAGE_JOBS_COMMAND_QUERY.to_string(),
                sub_queries,
                connection: Some(connection),
            })
        }
    }
}
