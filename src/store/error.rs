use ulid::Ulid;

use crate::model::AppointmentStatus;

#[derive(Debug)]
pub enum StoreError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Exclusion constraint: the new appointment overlaps this live one.
    Overlap(Ulid),
    InvalidTransition {
        id: Ulid,
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
    Invalid(&'static str),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "not found: {id}"),
            StoreError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            StoreError::Overlap(id) => write!(f, "overlaps appointment: {id}"),
            StoreError::InvalidTransition { id, from, to } => write!(
                f,
                "appointment {id} cannot move from {} to {}",
                from.as_str(),
                to.as_str()
            ),
            StoreError::Invalid(msg) => write!(f, "invalid: {msg}"),
            StoreError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            StoreError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}
