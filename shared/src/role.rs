//! Session roles and the errors raised at the authority boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ParticipantId;

/// Which side of the session this process plays. Resolved once and injected
/// into every component that can mutate shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// The single process allowed to mutate session state.
    Authority,
    /// Holds read-only replicas; mutations must be sent to the authority.
    Observer,
}

impl Role {
    pub fn is_authority(&self) -> bool {
        matches!(self, Role::Authority)
    }

    /// Gate for every mutator. Observers get `NotAuthority` and nothing is applied.
    pub fn require_authority(&self, operation: &'static str) -> Result<(), SessionError> {
        match self {
            Role::Authority => Ok(()),
            Role::Observer => Err(SessionError::NotAuthority { operation }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Entity table is full. Treated as a configuration fault.
    #[error("entity capacity of {capacity} exceeded")]
    CapacityExceeded { capacity: usize },
    #[error("{operation} requires session authority")]
    NotAuthority { operation: &'static str },
    #[error("participant {0} is not connected")]
    UnknownParticipant(ParticipantId),
}
