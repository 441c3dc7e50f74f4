pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod models;
pub mod processors;
pub mod readers;
pub mod service;
pub mod storage;
pub mod utils;

pub use config::StoreConfig;
pub use coordinator::{RequestContext, StatementRegistry, TieredCoordinator};
pub use error::{Result, StationError};
pub use service::StationService;
pub use storage::{ReplicatedMemoryEngine, StorageEngine};
