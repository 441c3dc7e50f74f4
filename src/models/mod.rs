pub mod schema;
pub mod station;
pub mod temperature;

pub use schema::{Column, ColumnRole, ColumnType, TableSchema};
pub use station::StationMetadata;
pub use temperature::{TemperatureReading, TemperatureRecord};
