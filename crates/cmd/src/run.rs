use anyhow::{Context, Result};
use diagnostics::*;
use hotels::{Materialized, PipelineConfig, run_pipeline};
use std::io::Write;

/// Run the whole pipeline, writing query results to `out`
pub async fn run_command<W: Write>(config: &PipelineConfig, out: &mut W) -> Result<()> {
    let delta_home = config.delta_home.as_str();
    info!("starting hotels pipeline, delta home {delta_home}");

    let report = run_pipeline(config, out)
        .await
        .with_context(|| format!("hotels pipeline failed for delta home {delta_home}"))?;

    for source in &report.sources {
        let uri = source.uri.as_str();
        match source.status {
            Materialized::Created { rows } => info!("source {uri}: created, {rows} rows"),
            Materialized::AlreadyExists => info!("source {uri}: already present"),
        }
    }
    for result in &report.results {
        let uri = result.uri.as_str();
        let rows = result.rows;
        info!("result {uri}: {rows} rows");
    }
    Ok(())
}
