pub mod classifier;
pub mod registry;
pub mod tiered;

pub use classifier::{classify, FailureKind, Verdict};
pub use registry::{Operation, Profile, StatementRegistry};
pub use tiered::{CancelReason, CoordinatorError, RequestContext, Served, TieredCoordinator};

use std::sync::Arc;
use tracing::info;

use crate::config::StoreConfig;
use crate::error::{Result, StationError};
use crate::models::TableSchema;
use crate::storage::StorageEngine;

/// Create the station schema on `engine`, then prepare the registry.
pub async fn bootstrap(
    engine: Arc<dyn StorageEngine>,
    config: &StoreConfig,
) -> Result<TieredCoordinator> {
    config.check()?;

    let schema = TableSchema::stations(config.replication_factor);
    engine
        .create_schema(&schema)
        .await
        .map_err(StationError::RegistryPreparation)?;
    info!(
        "Created {} with replication factor {}",
        schema.qualified_table(),
        schema.replication_factor
    );

    connect(engine, config).await
}

/// Prepare the registry against a schema that already exists.
pub async fn connect(
    engine: Arc<dyn StorageEngine>,
    config: &StoreConfig,
) -> Result<TieredCoordinator> {
    let registry = StatementRegistry::prepare(engine.as_ref(), config.tier_levels()?).await?;
    Ok(TieredCoordinator::new(engine, Arc::new(registry)))
}
