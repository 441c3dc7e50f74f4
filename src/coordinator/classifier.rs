use serde::{Deserialize, Serialize};
use std::fmt;

use crate::storage::EngineError;

/// Failure taxonomy the coordinator reasons about.
///
/// An empty result is not a failure: statements that match nothing succeed
/// with no rows (or a null aggregate) and never reach the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Not enough live replicas for the requested level.
    Unavailable,
    /// Replicas were reachable but did not answer in time.
    Timeout,
    /// Malformed statement, schema mismatch or authentication failure.
    Fatal,
}

/// What the coordinator does after a failed profile attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Try the next, weaker profile.
    Degrade,
    /// Stop and report the failure.
    Terminal,
}

impl FailureKind {
    pub fn is_degradable(&self) -> bool {
        match self {
            FailureKind::Unavailable | FailureKind::Timeout => true,
            FailureKind::Fatal => false,
        }
    }

    /// Degrading needs both a degradable failure and a weaker profile to try.
    pub fn verdict(&self, has_next_profile: bool) -> Verdict {
        if self.is_degradable() && has_next_profile {
            Verdict::Degrade
        } else {
            Verdict::Terminal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Unavailable => "unavailable",
            FailureKind::Timeout => "timeout",
            FailureKind::Fatal => "fatal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn classify(error: &EngineError) -> FailureKind {
    match error {
        EngineError::Unavailable { .. } | EngineError::NoHostAvailable { .. } => {
            FailureKind::Unavailable
        }
        EngineError::ReadTimeout { .. } | EngineError::WriteTimeout { .. } => FailureKind::Timeout,
        EngineError::InvalidQuery(_)
        | EngineError::SchemaMismatch(_)
        | EngineError::Unauthorized(_)
        | EngineError::Protocol(_) => FailureKind::Fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ConsistencyLevel;

    fn samples() -> Vec<(EngineError, FailureKind)> {
        vec![
            (
                EngineError::Unavailable {
                    level: ConsistencyLevel::Two,
                    required: 2,
                    alive: 1,
                },
                FailureKind::Unavailable,
            ),
            (
                EngineError::NoHostAvailable {
                    partition: "S1".to_string(),
                },
                FailureKind::Unavailable,
            ),
            (
                EngineError::ReadTimeout {
                    level: ConsistencyLevel::Two,
                    received: 1,
                    required: 2,
                },
                FailureKind::Timeout,
            ),
            (
                EngineError::WriteTimeout {
                    level: ConsistencyLevel::One,
                    received: 0,
                    required: 1,
                },
                FailureKind::Timeout,
            ),
            (EngineError::InvalidQuery("bad".into()), FailureKind::Fatal),
            (EngineError::SchemaMismatch("bad".into()), FailureKind::Fatal),
            (EngineError::Unauthorized("bad".into()), FailureKind::Fatal),
            (EngineError::Protocol("bad".into()), FailureKind::Fatal),
        ]
    }

    #[test]
    fn test_classification_table() {
        for (error, expected) in samples() {
            assert_eq!(classify(&error), expected, "{}", error);
        }
    }

    #[test]
    fn test_verdict_table() {
        assert_eq!(FailureKind::Unavailable.verdict(true), Verdict::Degrade);
        assert_eq!(FailureKind::Timeout.verdict(true), Verdict::Degrade);
        assert_eq!(FailureKind::Fatal.verdict(true), Verdict::Terminal);

        // Last profile: nothing weaker to degrade to.
        assert_eq!(FailureKind::Unavailable.verdict(false), Verdict::Terminal);
        assert_eq!(FailureKind::Timeout.verdict(false), Verdict::Terminal);
        assert_eq!(FailureKind::Fatal.verdict(false), Verdict::Terminal);
    }
}
