use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::constants::{GHCN_STATION_ID_LEN, US_STATE_CODE_LEN};

/// Static metadata for one station partition.
///
/// `name` is the partition's static attribute: one value shared by every
/// temperature row stored under `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct StationMetadata {
    #[validate(length(min = 1))]
    pub id: String,

    #[validate(length(min = 1))]
    pub name: String,

    pub state: Option<String>,
}

impl StationMetadata {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            state: None,
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn is_ghcn_id(&self) -> bool {
        self.id.len() == GHCN_STATION_ID_LEN && self.id.is_ascii()
    }

    pub fn in_state(&self, state: &str) -> bool {
        state.len() == US_STATE_CODE_LEN
            && self
                .state
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(state))
    }
}
