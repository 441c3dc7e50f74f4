//! Boundary to the replicated storage engine.
//!
//! Replication, gossip and placement live behind [`StorageEngine`]. The
//! coordinator only sees prepared statements, consistency levels and the
//! engine's raw error signals.

pub mod consistency;
pub mod memory;
pub mod statement;

pub use consistency::{ConsistencyLevel, ConsistencyTier};
pub use memory::{Attempt, NodeState, ReplicatedMemoryEngine};
pub use statement::{PreparedStatement, Row, Statement, Value};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::TableSchema;

/// Low-level error signals raised by the storage engine driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Cannot achieve consistency level {level}: {alive} of {required} required replicas alive")]
    Unavailable {
        level: ConsistencyLevel,
        required: u8,
        alive: u8,
    },

    #[error("No host available for partition '{partition}'")]
    NoHostAvailable { partition: String },

    #[error("Read timed out at {level}: {received} of {required} replicas responded")]
    ReadTimeout {
        level: ConsistencyLevel,
        received: u8,
        required: u8,
    },

    #[error("Write timed out at {level}: {received} of {required} replicas acknowledged")]
    WriteTimeout {
        level: ConsistencyLevel,
        received: u8,
        required: u8,
    },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Client handle to a replicated, partitioned store.
///
/// Implementations must multiplex concurrent calls themselves; callers
/// share one handle across every in-flight request.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Create keyspace, compound type and table for `schema`.
    async fn create_schema(&self, schema: &TableSchema) -> Result<(), EngineError>;

    /// Validate a template against the live schema.
    async fn prepare(&self, statement: Statement) -> Result<PreparedStatement, EngineError>;

    /// Run a prepared statement, waiting for `level` replica acknowledgements.
    async fn execute(
        &self,
        prepared: &PreparedStatement,
        level: ConsistencyLevel,
        params: &[Value],
    ) -> Result<Vec<Row>, EngineError>;

    /// The live table definition as a `CREATE TABLE` statement.
    async fn describe_table(&self) -> Result<String, EngineError>;

    fn name(&self) -> &'static str;
}
