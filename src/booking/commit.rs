use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::limits::MAX_COMMENT_LEN;
use crate::model::*;
use crate::observability::BOOKINGS_TOTAL;
use crate::repository::BookingRepository;
use crate::store::StoreError;

use super::{BookingError, BookingRequest, BookingService};

/// Outcome of checking a request against one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Admitted,
    /// No free slot starts at the requested instant.
    NoFreeSlot,
    /// The start slot is free but the requested span runs into a live
    /// appointment further on.
    Overlaps(Ulid),
}

/// A request is admitted when a free slot starts exactly at its start and no
/// live appointment overlaps the full requested span.
pub(crate) fn admit(slots: &[Slot], live: &[Appointment], requested: &Span) -> Admission {
    if !slots
        .iter()
        .any(|s| s.is_free && s.span.start == requested.start)
    {
        return Admission::NoFreeSlot;
    }
    match live
        .iter()
        .find(|a| a.status.occupies_time() && a.span.overlaps(requested))
    {
        Some(a) => Admission::Overlaps(a.id),
        None => Admission::Admitted,
    }
}

fn count_outcome(outcome: &'static str) {
    metrics::counter!(BOOKINGS_TOTAL, "outcome" => outcome).increment(1);
}

impl<R: BookingRepository + ?Sized> BookingService<R> {
    /// Admit a booking against live availability and persist it as confirmed.
    ///
    /// The deadline covers reading availability and admission. Once the
    /// appointment is handed to the repository the call waits for the
    /// outcome, so `Timeout` always means nothing was stored. The store's
    /// exclusion constraint decides races between read and insert, which
    /// surface as `ConcurrentConflict`.
    pub async fn create_booking(&self, request: BookingRequest) -> Result<Appointment, BookingError> {
        let requested = request.span()?;
        if request.comment.len() > MAX_COMMENT_LEN {
            return Err(BookingError::Invalid("comment too long"));
        }
        let employee_id = request.employee_id;
        let result = self.admit_and_store(&request, requested).await;

        match &result {
            Ok(appointment) => {
                count_outcome("confirmed");
                info!(
                    "booking {} confirmed for employee {employee_id} at {}",
                    appointment.id, requested.start
                );
            }
            Err(BookingError::SlotConflict { .. }) => {
                count_outcome("slot_conflict");
                debug!("no free slot for employee {employee_id} at {}", requested.start);
            }
            Err(BookingError::ConcurrentConflict { existing, .. }) => {
                count_outcome("concurrent_conflict");
                warn!(
                    "booking for employee {employee_id} at {} lost race to appointment {existing}",
                    requested.start
                );
            }
            Err(BookingError::Timeout(_)) => count_outcome("timeout"),
            Err(_) => count_outcome("error"),
        }
        result
    }

    async fn admit_and_store(
        &self,
        request: &BookingRequest,
        requested: Span,
    ) -> Result<Appointment, BookingError> {
        let employee_id = request.employee_id;
        let slot_duration = self.slot_duration_for(request.service_id);

        let availability = self
            .bounded(self.day_availability(employee_id, request.day(), slot_duration, Some(requested)))
            .await?;
        if admit(&availability.slots, &availability.appointments, &requested) != Admission::Admitted {
            return Err(BookingError::SlotConflict {
                employee_id,
                start: requested.start,
            });
        }

        let appointment = Appointment {
            id: Ulid::new(),
            employee_id,
            service_id: request.service_id,
            client_id: request.client_id,
            span: requested,
            status: AppointmentStatus::Confirmed,
            comment: request.comment.clone(),
        };
        match self.repo.create_appointment(appointment.clone()).await {
            Ok(_) => Ok(appointment),
            Err(StoreError::Overlap(existing)) => Err(BookingError::ConcurrentConflict {
                employee_id,
                start: requested.start,
                existing,
            }),
            Err(e) => Err(BookingError::from(e)),
        }
    }

    /// Cancel an appointment, releasing its time range. A single write, so
    /// it is awaited to its outcome rather than cut off by the deadline.
    pub async fn cancel_booking(&self, id: Ulid) -> Result<Appointment, BookingError> {
        let result = self
            .repo
            .set_appointment_status(id, AppointmentStatus::Cancelled)
            .await
            .map_err(BookingError::from);
        if result.is_ok() {
            count_outcome("cancelled");
        }
        result
    }
}
