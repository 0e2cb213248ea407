//! The two analytical queries, their console output, and their Delta
//! result tables.

use crate::error::Result;
use crate::materialize::SOURCE_TABLES;
use crate::session::PipelineSession;
use arrow::util::pretty::pretty_format_batches;
use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use deltalake::DeltaOps;
use deltalake::operations::write::SchemaMode;
use deltalake::protocol::SaveMode;
use diagnostics::*;
use std::io::Write;
use std::sync::Arc;

/// Result tables are laid out by these columns
pub const RESULT_PARTITION_COLUMNS: [&str; 2] = ["year", "month"];

/// A fixed aggregation and the Delta table its result is saved to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalyticalQuery {
    pub name: &'static str,
    /// Printed before the result
    pub label: &'static str,
    pub sql: &'static str,
}

/// Per hotel and month, the spread between the highest and lowest average
/// daily temperature. Ten widest spreads.
pub const MAX_TMPR_DIFF_HOTELS: AnalyticalQuery = AnalyticalQuery {
    name: "max_tmpr_diff_hotels",
    label: "Task #1:",
    sql: r#"
        SELECT id,
               first_value(name) AS name,
               first_value(address) AS address,
               first_value(city) AS city,
               first_value(country) AS country,
               to_char(wthr_month_start, '%Y-%m') AS wthr_month,
               max(avg_tmpr_c) - min(avg_tmpr_c) AS tmpr_diff_c,
               CAST(date_part('year', wthr_month_start) AS INT) AS year,
               CAST(date_part('month', wthr_month_start) AS INT) AS month
        FROM (
            SELECT id, name, address, city, country, avg_tmpr_c,
                   CAST(date_trunc('month', CAST(wthr_date AS TIMESTAMP)) AS DATE) AS wthr_month_start
            FROM hotel_weather
        ) weather
        GROUP BY id, wthr_month_start
        ORDER BY tmpr_diff_c DESC, id, wthr_month
        LIMIT 10
    "#,
};

/// Per calendar month, the ten hotels with the most bookings covering it.
/// A booking covers every month from check-in to check-out. Bookings with
/// unparseable dates are skipped.
pub const BUSY_HOTELS: AnalyticalQuery = AnalyticalQuery {
    name: "busy_hotels",
    label: "Task #2:",
    sql: r#"
        WITH stays AS (
            SELECT hotel_id,
                   unnest(months_covered(TRY_CAST(srch_ci AS DATE), TRY_CAST(srch_co AS DATE))) AS srch_date
            FROM expedia
            WHERE TRY_CAST(srch_ci AS DATE) <= TRY_CAST(srch_co AS DATE)
        ),
        visits AS (
            SELECT hotel_id, srch_date, count(srch_date) AS srch_count
            FROM stays
            GROUP BY hotel_id, srch_date
        ),
        ranked AS (
            SELECT hotel_id, srch_date, srch_count,
                   row_number() OVER (PARTITION BY srch_date ORDER BY srch_count DESC, hotel_id) AS rn
            FROM visits
        ),
        hotels AS (
            SELECT CAST(id AS VARCHAR) AS hotel_key,
                   first_value(name) AS name,
                   first_value(address) AS address,
                   first_value(city) AS city,
                   first_value(country) AS country
            FROM hotel_weather
            GROUP BY CAST(id AS VARCHAR)
        )
        SELECT r.hotel_id, h.name, h.address, h.city, h.country,
               to_char(r.srch_date, '%Y-%m') AS srch_month,
               r.srch_count,
               CAST(date_part('year', r.srch_date) AS INT) AS year,
               CAST(date_part('month', r.srch_date) AS INT) AS month
        FROM ranked r
        JOIN hotels h ON CAST(r.hotel_id AS VARCHAR) = h.hotel_key
        WHERE r.rn <= 10
        ORDER BY srch_month, r.srch_count DESC, r.hotel_id
    "#,
};

pub const QUERIES: [AnalyticalQuery; 2] = [MAX_TMPR_DIFF_HOTELS, BUSY_HOTELS];

/// Collected result of one query
#[derive(Clone, Debug)]
pub struct QueryResult {
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
}

impl QueryResult {
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

#[derive(Clone, Debug)]
pub struct QueryOutcome {
    pub query: AnalyticalQuery,
    pub uri: String,
    pub rows: usize,
}

/// Expose the materialized source tables to SQL under their own names
pub async fn register_sources(session: &PipelineSession) -> Result<()> {
    let ctx = session.context();
    for source in SOURCE_TABLES {
        let table = session.delta_home().open_required(source.name).await?;
        _ = ctx.deregister_table(source.name)?;
        _ = ctx.register_table(source.name, Arc::new(table))?;
        let name = source.name;
        debug!("registered Delta table {name}");
    }
    Ok(())
}

pub async fn execute(session: &PipelineSession, query: &AnalyticalQuery) -> Result<QueryResult> {
    let df = session.sql(query.sql).await?;
    let schema = df.schema().inner().clone();
    let batches = df.collect().await?;
    Ok(QueryResult { schema, batches })
}

/// Replace the Delta table at `{delta_home}/{query.name}` with `result`.
/// Partitions absent from `result` do not survive.
pub async fn persist(
    session: &PipelineSession,
    query: &AnalyticalQuery,
    result: QueryResult,
) -> Result<String> {
    let home = session.delta_home();
    let uri = home.table_uri(query.name);

    let rows = result.num_rows();
    let QueryResult {
        schema,
        mut batches,
    } = result;
    if batches.is_empty() {
        batches.push(RecordBatch::new_empty(schema));
    }

    home.prepare(query.name)?;
    _ = DeltaOps::try_from_uri_with_storage_options(&uri, home.storage_options())
        .await?
        .write(batches)
        .with_save_mode(SaveMode::Overwrite)
        .with_schema_mode(SchemaMode::Overwrite)
        .with_partition_columns(RESULT_PARTITION_COLUMNS)
        .await?;

    info!("overwrote {uri} with {rows} rows");
    Ok(uri)
}

/// Run every query: label, full table on `out`, then persist
pub async fn run_queries<W: Write>(
    session: &PipelineSession,
    out: &mut W,
) -> Result<Vec<QueryOutcome>> {
    let mut outcomes = Vec::with_capacity(QUERIES.len());
    for query in QUERIES {
        writeln!(out, "{}", query.label)?;

        let name = query.name;
        info!("running query {name}");
        let result = execute(session, &query).await?;

        writeln!(out, "{}", render(&result)?)?;
        out.flush()?;

        let rows = result.num_rows();
        let uri = persist(session, &query, result).await?;
        outcomes.push(QueryOutcome { query, uri, rows });
    }
    Ok(outcomes)
}

/// Untruncated text table. Column headers are shown even with no rows.
pub fn render(result: &QueryResult) -> Result<String> {
    if result.batches.is_empty() {
        let empty = RecordBatch::new_empty(result.schema.clone());
        return Ok(pretty_format_batches(&[empty])?.to_string());
    }
    Ok(pretty_format_batches(&result.batches)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Float64Array, StringArray};
    use arrow_schema::{DataType, Field, Schema};

    #[test]
    fn test_query_names_and_labels() {
        let names: Vec<_> = QUERIES.iter().map(|q| q.name).collect();
        assert_eq!(names, vec!["max_tmpr_diff_hotels", "busy_hotels"]);

        let labels: Vec<_> = QUERIES.iter().map(|q| q.label).collect();
        assert_eq!(labels, vec!["Task #1:", "Task #2:"]);
    }

    #[test]
    fn test_render_does_not_truncate() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("address", DataType::Utf8, false),
            Field::new("tmpr_diff_c", DataType::Float64, false),
        ]));
        let long = "1600 Amphitheatre Parkway, Mountain View, California, United States of America";
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec![long])),
                Arc::new(Float64Array::from(vec![9.0])),
            ],
        )?;

        let text = render(&QueryResult {
            schema,
            batches: vec![batch],
        })?;
        assert!(text.contains(long));
        assert!(text.contains("tmpr_diff_c"));
        Ok(())
    }

    #[test]
    fn test_render_empty_result_keeps_headers() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let schema = Arc::new(Schema::new(vec![Field::new(
            "srch_month",
            DataType::Utf8,
            true,
        )]));
        let text = render(&QueryResult {
            schema,
            batches: vec![],
        })?;
        assert!(text.contains("srch_month"));
        Ok(())
    }
}
