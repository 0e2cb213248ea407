//! Copy raw Parquet folders into Delta tables, once per destination.

use crate::error::Result;
use crate::session::PipelineSession;
use arrow_array::RecordBatch;
use arrow_schema::DataType;
use datafusion::datasource::listing::ListingTableUrl;
use datafusion::prelude::ParquetReadOptions;
use deltalake::DeltaOps;
use deltalake::protocol::SaveMode;
use diagnostics::*;

/// A raw source folder and the Delta table it becomes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceTable {
    pub name: &'static str,
    pub folder: &'static str,
}

pub const HOTEL_WEATHER: SourceTable = SourceTable {
    name: "hotel_weather",
    folder: "hotel-weather",
};

pub const EXPEDIA: SourceTable = SourceTable {
    name: "expedia",
    folder: "expedia",
};

pub const SOURCE_TABLES: [SourceTable; 2] = [HOTEL_WEATHER, EXPEDIA];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Materialized {
    Created { rows: usize },
    /// Left untouched
    AlreadyExists,
}

#[derive(Clone, Debug)]
pub struct MaterializeOutcome {
    pub table: SourceTable,
    pub uri: String,
    pub status: Materialized,
}

/// Materialize every source table, in order
pub async fn materialize_sources(session: &PipelineSession) -> Result<Vec<MaterializeOutcome>> {
    let mut outcomes = Vec::with_capacity(SOURCE_TABLES.len());
    for table in SOURCE_TABLES {
        let status = materialize_table(session, &table).await?;
        outcomes.push(MaterializeOutcome {
            table,
            uri: session.delta_home().table_uri(table.name),
            status,
        });
    }
    Ok(outcomes)
}

/// Create the Delta table for `table` from its raw folder unless one exists
pub async fn materialize_table(
    session: &PipelineSession,
    table: &SourceTable,
) -> Result<Materialized> {
    let home = session.delta_home();
    let uri = home.table_uri(table.name);

    if home.open(table.name).await?.is_some() {
        info!("Delta table {uri} exists, leaving it unchanged");
        return Ok(Materialized::AlreadyExists);
    }

    let source = session.source().folder_url(table.folder);
    info!("materializing {source} into {uri}");

    let partitions = discover_partitions(session, &source).await?;
    if !partitions.is_empty() {
        let keys: Vec<&str> = partitions.iter().map(|(key, _)| key.as_str()).collect();
        let keys = keys.join(", ");
        debug!("{source} is partitioned by {keys}");
    }

    let options = ParquetReadOptions::default().table_partition_cols(partitions);
    let df = session
        .context()
        .read_parquet(source.as_str(), options)
        .await?;
    let schema = df.schema().inner().clone();
    let mut batches: Vec<RecordBatch> = df.collect().await?;
    let rows = batches.iter().map(RecordBatch::num_rows).sum();
    if batches.is_empty() {
        // Keep the inferred schema for an empty source.
        batches.push(RecordBatch::new_empty(schema));
    }

    home.prepare(table.name)?;
    _ = DeltaOps::try_from_uri_with_storage_options(&uri, home.storage_options())
        .await?
        .write(batches)
        .with_save_mode(SaveMode::ErrorIfExists)
        .await?;

    info!("created {uri} with {rows} rows");
    Ok(Materialized::Created { rows })
}

/// Hive-style `key=value` directory levels below `folder`, outermost first.
/// Integer-valued keys are typed `Int32`, the rest `Utf8`.
pub async fn discover_partitions(
    session: &PipelineSession,
    folder: &str,
) -> Result<Vec<(String, DataType)>> {
    let url = ListingTableUrl::parse(folder)?;
    let store = session.context().runtime_env().object_store(&url)?;

    let mut columns: Vec<(String, DataType)> = Vec::new();
    let mut prefix = url.prefix().clone();
    loop {
        let mut listing = store.list_with_delimiter(Some(&prefix)).await?;
        listing.common_prefixes.sort();

        let next = listing.common_prefixes.into_iter().find_map(|dir| {
            let (key, value) = dir.filename()?.split_once('=')?;
            let (key, value) = (key.to_string(), value.to_string());
            Some((dir, key, value))
        });
        let Some((dir, key, value)) = next else {
            break;
        };
        if columns.iter().any(|(known, _)| *known == key) {
            break;
        }

        let data_type = if value.parse::<i32>().is_ok() {
            DataType::Int32
        } else {
            DataType::Utf8
        };
        columns.push((key, data_type));
        prefix = dir;
    }
    Ok(columns)
}
