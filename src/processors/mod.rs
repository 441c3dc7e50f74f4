pub mod ingestor;
pub mod integrity_checker;

pub use ingestor::{IngestReport, Ingestor};
pub use integrity_checker::{
    IntegrityChecker, IntegrityReport, ReadingViolation, StationStatistics, ViolationType,
};
