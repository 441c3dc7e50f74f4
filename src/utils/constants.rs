/// Keyspace and table layout
pub const KEYSPACE: &str = "weather";
pub const TABLE: &str = "stations";
pub const COMPOUND_TYPE: &str = "station_record";

/// Terminal error tags reported in replies
pub const TAG_UNAVAILABLE: &str = "unavailable";
pub const TAG_TIMEOUT: &str = "timeout";
pub const TAG_CANCELLED: &str = "cancelled";

/// Replication and tier defaults
pub const DEFAULT_NODE_COUNT: u8 = 3;
pub const DEFAULT_REPLICATION_FACTOR: u8 = 2;
pub const DEFAULT_STRONG_READ_REPLICAS: u8 = 2;
pub const DEFAULT_AVAILABLE_READ_REPLICAS: u8 = 1;
pub const DEFAULT_WRITE_REPLICAS: u8 = 1;

/// Timing defaults (milliseconds)
pub const DEFAULT_REPLICA_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_REQUEST_DEADLINE_MS: u64 = 10_000;

/// Temperature constraints, tenths of a degree Celsius
pub const MIN_VALID_TENTHS: i32 = -900;
pub const MAX_VALID_TENTHS: i32 = 700;

/// GHCN fixed-width station file layout (1-based, inclusive columns)
pub const GHCN_STATION_ID_LEN: usize = 11;
pub const GHCN_ID_COLUMNS: (usize, usize) = (1, 11);
pub const GHCN_STATE_COLUMNS: (usize, usize) = (39, 40);
pub const GHCN_NAME_COLUMNS: (usize, usize) = (42, 71);
pub const US_STATE_CODE_LEN: usize = 2;

/// File names
pub const STATIONS_FILE: &str = "ghcnd-stations.txt";
pub const CONFIG_FILE: &str = "station-store.toml";
pub const ENV_PREFIX: &str = "STATION_STORE";

/// Processing defaults
pub const DEFAULT_BUFFER_SIZE: usize = 8192 * 16; // 128KB
pub const DEFAULT_INGEST_CONCURRENCY: usize = 64;
