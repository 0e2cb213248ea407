use crate::error::Result;
use crate::materialize::{MaterializeOutcome, materialize_sources};
use crate::queries::{QueryOutcome, register_sources, run_queries};
use crate::session::PipelineSession;
use crate::storage::SourceRoot;
use diagnostics::*;
use std::io::Write;

/// Everything one run needs
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub source: SourceRoot,
    /// Destination root for all Delta tables, local path or URL
    pub delta_home: String,
}

#[derive(Clone, Debug)]
pub struct PipelineReport {
    pub sources: Vec<MaterializeOutcome>,
    pub results: Vec<QueryOutcome>,
}

/// Initialize, materialize, then run both queries. Query output goes to
/// `out`. The session lives exactly as long as this call.
pub async fn run_pipeline<W: Write>(
    config: &PipelineConfig,
    out: &mut W,
) -> Result<PipelineReport> {
    let session = PipelineSession::new(config)?;

    info!("materializing source tables");
    let sources = materialize_sources(&session).await?;

    register_sources(&session).await?;

    info!("running queries");
    let results = run_queries(&session, out).await?;

    let count = results.len();
    info!("pipeline finished, {count} result tables written");
    Ok(PipelineReport { sources, results })
}
