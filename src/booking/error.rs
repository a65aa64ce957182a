use std::time::Duration;

use ulid::Ulid;

use crate::model::Ms;
use crate::store::StoreError;

#[derive(Debug)]
pub enum BookingError {
    /// The repository failed. Retrying may succeed.
    Resolution(StoreError),
    /// The requested start is not a currently free slot.
    SlotConflict { employee_id: Ulid, start: Ms },
    /// The read-time check passed but the store's exclusion constraint
    /// rejected the write: another booking won the race.
    ConcurrentConflict {
        employee_id: Ulid,
        start: Ms,
        existing: Ulid,
    },
    Timeout(Duration),
    Invalid(&'static str),
    NotFound(Ulid),
}

impl BookingError {
    /// Both conflict kinds look the same to a caller: the booking was rejected.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            BookingError::SlotConflict { .. } | BookingError::ConcurrentConflict { .. }
        )
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, BookingError::Resolution(_) | BookingError::Timeout(_))
    }
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::Resolution(e) => write!(f, "availability could not be resolved: {e}"),
            BookingError::SlotConflict { employee_id, start } => write!(
                f,
                "slot at {start} for employee {employee_id} is taken or outside working hours"
            ),
            BookingError::ConcurrentConflict {
                employee_id,
                start,
                existing,
            } => write!(
                f,
                "slot at {start} for employee {employee_id} was taken concurrently by {existing}"
            ),
            BookingError::Timeout(d) => write!(f, "deadline of {}ms exceeded", d.as_millis()),
            BookingError::Invalid(msg) => write!(f, "invalid request: {msg}"),
            BookingError::NotFound(id) => write!(f, "not found: {id}"),
        }
    }
}

impl std::error::Error for BookingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BookingError::Resolution(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => BookingError::NotFound(id),
            StoreError::Invalid(msg) | StoreError::LimitExceeded(msg) => BookingError::Invalid(msg),
            StoreError::AlreadyExists(_) => BookingError::Invalid("appointment id already in use"),
            StoreError::InvalidTransition { .. } => {
                BookingError::Invalid("appointment cannot move to that status")
            }
            other => BookingError::Resolution(other),
        }
    }
}
