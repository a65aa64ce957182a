use crate::limits::MAX_QUERY_WINDOW_MS;
use crate::model::*;

use super::StoreError;

pub(crate) fn validate_span(span: &Span) -> Result<(), StoreError> {
    if span.start >= span.end {
        return Err(StoreError::Invalid("start must be before end"));
    }
    if span.duration_ms() > MAX_QUERY_WINDOW_MS {
        return Err(StoreError::LimitExceeded("span too wide"));
    }
    Ok(())
}

/// The store-level exclusion constraint: no two live appointments of one
/// employee may overlap. Caller must hold the employee's write lock.
pub(crate) fn check_no_overlap(es: &EmployeeState, span: &Span) -> Result<(), StoreError> {
    match es.live_overlapping(span).next() {
        Some(existing) => Err(StoreError::Overlap(existing.id)),
        None => Ok(()),
    }
}
