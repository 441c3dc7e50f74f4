use serde::{Deserialize, Serialize};
use std::fmt;

/// Replica acknowledgement level requested from the storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsistencyLevel {
    One,
    Two,
    Three,
    Quorum,
    All,
}

impl ConsistencyLevel {
    /// Level that waits for exactly `replicas` acknowledgements.
    pub fn from_replicas(replicas: u8) -> Option<Self> {
        match replicas {
            1 => Some(ConsistencyLevel::One),
            2 => Some(ConsistencyLevel::Two),
            3 => Some(ConsistencyLevel::Three),
            _ => None,
        }
    }

    pub fn required_replicas(&self, replication_factor: u8) -> u8 {
        match self {
            ConsistencyLevel::One => 1,
            ConsistencyLevel::Two => 2,
            ConsistencyLevel::Three => 3,
            ConsistencyLevel::Quorum => replication_factor / 2 + 1,
            ConsistencyLevel::All => replication_factor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyLevel::One => "ONE",
            ConsistencyLevel::Two => "TWO",
            ConsistencyLevel::Three => "THREE",
            ConsistencyLevel::Quorum => "QUORUM",
            ConsistencyLevel::All => "ALL",
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named guarantee a statement profile is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsistencyTier {
    /// Read quorum chosen so that reads overlap the write quorum.
    Strong,
    /// Any single replica is enough.
    Available,
}

impl ConsistencyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyTier::Strong => "strong",
            ConsistencyTier::Available => "available",
        }
    }
}

impl fmt::Display for ConsistencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
