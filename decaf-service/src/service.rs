//! Data-Driven Decaf request pipeline.

use std::sync::Arc;

use common::config::AppConfig;
use common::errors::AppResult;
use common::models::{AggregateResult, BackendKind, ConnectionInfo};

use crate::aggregator::aggregate;
use crate::backend::Backends;
use crate::bond::BondClient;

/// Runs one aggregation + verification round.
pub struct DecafService {
    config: Arc<AppConfig>,
    backends: Backends,
    bond: BondClient,
}

impl DecafService {
    pub fn new(config: Arc<AppConfig>, backends: Backends, bond: BondClient) -> Self {
        Self {
            config,
            backends,
            bond,
        }
    }

    /// Selects the configured backend, aggregates the seeded table and
    /// submits the result to Bond.
    ///
    /// The database pool lives only for the duration of this call. It is
    /// closed once the rows are read, whether or not the query succeeded.
    pub async fn run(&self) -> AppResult<AggregateResult> {
        let kind: BackendKind = self.config.db_type.as_deref().unwrap_or_default().parse()?;
        tracing::debug!(db = %kind, "backend resolved");

        let info = ConnectionInfo::resolve(&self.config.db, &self.config.project_id)?;
        kind.check(&info)?;
        let source = self.backends.select(kind).connect(&info).await?;

        let fetched = source.fetch_rows().await;
        source.close().await;
        let rows = fetched?;

        let mut result = aggregate(&rows, self.config.sentinel_row_index)?;
        result.project = self.config.project_id.clone();
        result.db = kind.as_str().to_string();
        tracing::info!(
            rows = rows.len(),
            total = result.total,
            magic_coffee = %result.magic_coffee,
            db = %result.db,
            "aggregation finished"
        );

        let response = self.bond.verify(&result).await?;
        tracing::info!(response = %response, "verified with bond");

        Ok(result)
    }
}
