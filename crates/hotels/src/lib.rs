//! Hotels - Delta Lake tables and monthly hotel statistics
//!
//! Reads raw hotel weather and Expedia booking Parquet files from Azure
//! storage, materializes them as Delta tables, and runs two fixed
//! aggregations whose results are saved back as Delta tables partitioned by
//! year and month.

pub mod error;
pub mod materialize;
pub mod months;
pub mod pipeline;
pub mod queries;
pub mod session;
pub mod storage;

pub use error::{PipelineError, Result};
pub use materialize::{
    EXPEDIA, HOTEL_WEATHER, MaterializeOutcome, Materialized, SOURCE_TABLES, SourceTable,
    discover_partitions, materialize_sources, materialize_table,
};
pub use pipeline::{PipelineConfig, PipelineReport, run_pipeline};
pub use queries::{
    AnalyticalQuery, BUSY_HOTELS, MAX_TMPR_DIFF_HOTELS, QUERIES, QueryOutcome, QueryResult,
    RESULT_PARTITION_COLUMNS, execute, persist, register_sources, run_queries,
};
pub use session::PipelineSession;
pub use storage::{AzureContainer, DeltaHome, SourceRoot};
