//! Engine session: a DataFusion context wired to the source storage, plus
//! the Delta home every table is written under.

use crate::error::Result;
use crate::months;
use crate::pipeline::PipelineConfig;
use crate::storage::{DeltaHome, SourceRoot, register_azure_handlers};
use datafusion::dataframe::DataFrame;
use datafusion::execution::context::{SessionConfig, SessionContext};
use diagnostics::*;

/// Session handle passed explicitly through the pipeline stages
pub struct PipelineSession {
    ctx: SessionContext,
    source: SourceRoot,
    delta_home: DeltaHome,
}

impl PipelineSession {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let session_config = SessionConfig::new()
            // Delta cannot store Utf8View/BinaryView columns
            .set_bool("datafusion.execution.parquet.schema_force_view_types", false)
            // Source folders are Hive-style trees
            .set_bool("datafusion.execution.listing_table_ignore_subdirectory", false);
        let ctx = SessionContext::new_with_config(session_config);

        let credentials = config.source.credentials();
        if let Some(container) = credentials {
            let url = container.url()?;
            let account = container.account_name.as_str();
            info!("registering Azure storage for account {account}");
            ctx.register_object_store(&url, container.object_store()?);
        }

        let delta_home = DeltaHome::new(config.delta_home.clone(), credentials);
        if delta_home.is_remote() {
            register_azure_handlers();
        }

        months::register(&ctx);

        let root = delta_home.root();
        debug!("session ready, delta home {root}");

        Ok(Self {
            ctx,
            source: config.source.clone(),
            delta_home,
        })
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn source(&self) -> &SourceRoot {
        &self.source
    }

    pub fn delta_home(&self) -> &DeltaHome {
        &self.delta_home
    }

    pub async fn sql(&self, sql: &str) -> Result<DataFrame> {
        debug!("SQL: {sql}");
        Ok(self.ctx.sql(sql).await?)
    }
}
