use async_trait::async_trait;
use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;
use crate::store::{Store, StoreError};

/// Persistence seam for the booking pipeline.
///
/// `Store` is the durable implementation; tests swap in doubles to exercise
/// slow or failing backends.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Shifts for one employee dated within `[from, to]`.
    async fn get_shift_overrides(
        &self,
        employee_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Shift>, StoreError>;

    async fn get_branch_shifts(
        &self,
        branch_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Shift>, StoreError>;

    async fn get_weekly_schedule(&self, employee_id: Ulid) -> Result<Vec<ScheduleEntry>, StoreError>;

    /// Non-cancelled appointments intersecting `span`.
    async fn get_appointments(
        &self,
        employee_id: Ulid,
        span: Span,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Must reject with `StoreError::Overlap` when a live appointment of the
    /// same employee overlaps the new one.
    async fn create_appointment(&self, appointment: Appointment) -> Result<Ulid, StoreError>;

    async fn set_appointment_status(
        &self,
        id: Ulid,
        status: AppointmentStatus,
    ) -> Result<Appointment, StoreError>;

    async fn replace_weekly_schedule(
        &self,
        employee_id: Ulid,
        entries: Vec<ScheduleEntry>,
    ) -> Result<(), StoreError>;

    async fn upsert_shifts(&self, shifts: Vec<Shift>) -> Result<Vec<Shift>, StoreError>;
}

#[async_trait]
impl BookingRepository for Store {
    async fn get_shift_overrides(
        &self,
        employee_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Shift>, StoreError> {
        Store::get_shift_overrides(self, employee_id, from, to).await
    }

    async fn get_branch_shifts(
        &self,
        branch_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Shift>, StoreError> {
        Store::get_branch_shifts(self, branch_id, from, to).await
    }

    async fn get_weekly_schedule(&self, employee_id: Ulid) -> Result<Vec<ScheduleEntry>, StoreError> {
        Store::get_weekly_schedule(self, employee_id).await
    }

    async fn get_appointments(
        &self,
        employee_id: Ulid,
        span: Span,
    ) -> Result<Vec<Appointment>, StoreError> {
        Store::get_appointments(self, employee_id, span).await
    }

    async fn create_appointment(&self, appointment: Appointment) -> Result<Ulid, StoreError> {
        Store::create_appointment(self, appointment).await
    }

    async fn set_appointment_status(
        &self,
        id: Ulid,
        status: AppointmentStatus,
    ) -> Result<Appointment, StoreError> {
        Store::set_appointment_status(self, id, status).await
    }

    async fn replace_weekly_schedule(
        &self,
        employee_id: Ulid,
        entries: Vec<ScheduleEntry>,
    ) -> Result<(), StoreError> {
        Store::replace_weekly_schedule(self, employee_id, entries).await
    }

    async fn upsert_shifts(&self, shifts: Vec<Shift>) -> Result<Vec<Shift>, StoreError> {
        Store::upsert_shifts(self, shifts).await
    }
}
