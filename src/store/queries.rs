use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::MAX_QUERY_WINDOW_MS;
use crate::model::*;

use super::{SharedEmployeeState, Store, StoreError};

impl Store {
    /// Shifts of one employee dated within `[from, to]`, ordered by date.
    pub async fn get_shift_overrides(
        &self,
        employee_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Shift>, StoreError> {
        if from > to {
            return Ok(Vec::new());
        }
        let Some(state) = self.employee_state(&employee_id) else {
            return Ok(Vec::new());
        };
        let es = state.read().await;
        Ok(es.shifts.range(from..=to).map(|(_, s)| s.clone()).collect())
    }

    /// Shifts of every employee in a branch dated within `[from, to]`,
    /// ordered by date, then employee.
    pub async fn get_branch_shifts(
        &self,
        branch_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Shift>, StoreError> {
        if from > to {
            return Ok(Vec::new());
        }
        let states: Vec<SharedEmployeeState> =
            self.employees.iter().map(|e| e.value().clone()).collect();
        let mut shifts = Vec::new();
        for state in states {
            let es = state.read().await;
            shifts.extend(
                es.shifts
                    .range(from..=to)
                    .map(|(_, s)| s)
                    .filter(|s| s.branch_id == branch_id)
                    .cloned(),
            );
        }
        shifts.sort_by_key(|s| (s.date, s.employee_id));
        Ok(shifts)
    }

    /// Weekly template ordered by day of week (Sunday first).
    pub async fn get_weekly_schedule(&self, employee_id: Ulid) -> Result<Vec<ScheduleEntry>, StoreError> {
        let Some(state) = self.employee_state(&employee_id) else {
            return Ok(Vec::new());
        };
        let es = state.read().await;
        Ok(es.schedule.clone())
    }

    /// Non-cancelled appointments intersecting `span`, ordered by start.
    pub async fn get_appointments(
        &self,
        employee_id: Ulid,
        span: Span,
    ) -> Result<Vec<Appointment>, StoreError> {
        if span.duration_ms() > MAX_QUERY_WINDOW_MS {
            return Err(StoreError::LimitExceeded("query window too wide"));
        }
        let Some(state) = self.employee_state(&employee_id) else {
            return Ok(Vec::new());
        };
        let es = state.read().await;
        Ok(es.live_overlapping(&span).cloned().collect())
    }

    pub async fn get_appointment(&self, id: Ulid) -> Result<Appointment, StoreError> {
        let employee_id = self
            .employee_for_appointment(&id)
            .ok_or(StoreError::NotFound(id))?;
        let state = self
            .employee_state(&employee_id)
            .ok_or(StoreError::NotFound(employee_id))?;
        let es = state.read().await;
        es.appointments
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    pub fn employee_count(&self) -> usize {
        self.employees.len()
    }
}
