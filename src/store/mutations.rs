use std::collections::{BTreeMap, HashSet};

use tokio::sync::oneshot;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::exclusion::{check_no_overlap, validate_span};
use super::{Store, StoreError, WalCommand};

impl Store {
    /// Replace an employee's weekly template wholesale.
    pub async fn replace_weekly_schedule(
        &self,
        employee_id: Ulid,
        mut entries: Vec<ScheduleEntry>,
    ) -> Result<(), StoreError> {
        if entries.len() > MAX_SCHEDULE_ENTRIES {
            return Err(StoreError::LimitExceeded("too many schedule entries"));
        }
        let mut days = HashSet::new();
        for entry in entries.iter_mut() {
            if entry.day_of_week > 6 {
                return Err(StoreError::Invalid("day_of_week must be in 0..=6"));
            }
            if !days.insert(entry.day_of_week) {
                return Err(StoreError::Invalid("duplicate day_of_week in schedule"));
            }
            entry.employee_id = employee_id;
        }
        entries.sort_by_key(|e| e.day_of_week);

        let gate = self.enter_gate().await;
        let guards = self.lock_employees(&[employee_id]).await;
        let event = Event::ScheduleReplaced { employee_id, entries };
        self.commit(gate, guards, event).await?;
        debug!("schedule replaced for employee {employee_id}");
        Ok(())
    }

    /// Insert or update shifts keyed by (employee, date). An update keeps the
    /// stored shift's id. Within one batch the last shift for a key wins.
    /// Returns the shifts as stored.
    pub async fn upsert_shifts(&self, shifts: Vec<Shift>) -> Result<Vec<Shift>, StoreError> {
        if shifts.is_empty() {
            return Ok(Vec::new());
        }
        if shifts.len() > MAX_SHIFTS_PER_BATCH {
            return Err(StoreError::LimitExceeded("batch too large"));
        }

        let mut by_key: BTreeMap<(Ulid, chrono::NaiveDate), Shift> = BTreeMap::new();
        for shift in shifts {
            by_key.insert((shift.employee_id, shift.date), shift);
        }
        let employee_ids: Vec<Ulid> = by_key.keys().map(|(e, _)| *e).collect();

        let gate = self.enter_gate().await;
        let guards = self.lock_employees(&employee_ids).await;

        let mut resolved = Vec::with_capacity(by_key.len());
        for ((employee_id, date), mut shift) in by_key {
            if let Some(existing) = guards
                .iter()
                .find(|g| g.id == employee_id)
                .and_then(|g| g.shifts.get(&date))
            {
                shift.id = existing.id;
            }
            resolved.push(shift);
        }

        let event = Event::ShiftsSaved { shifts: resolved.clone() };
        self.commit(gate, guards, event).await?;
        debug!("{} shifts saved", resolved.len());
        Ok(resolved)
    }

    /// Persist a new appointment, enforcing the exclusion constraint under
    /// the employee's write lock.
    pub async fn create_appointment(&self, appointment: Appointment) -> Result<Ulid, StoreError> {
        validate_span(&appointment.span)?;
        if appointment.comment.len() > MAX_COMMENT_LEN {
            return Err(StoreError::LimitExceeded("comment too long"));
        }
        if self.employee_for_appointment(&appointment.id).is_some() {
            return Err(StoreError::AlreadyExists(appointment.id));
        }

        let gate = self.enter_gate().await;
        let guards = self.lock_employees(&[appointment.employee_id]).await;
        {
            let es = &guards[0];
            if es.appointments.len() >= MAX_APPOINTMENTS_PER_EMPLOYEE {
                return Err(StoreError::LimitExceeded("too many appointments for employee"));
            }
            if appointment.status.occupies_time() {
                check_no_overlap(es, &appointment.span)?;
            }
        }

        let id = appointment.id;
        let employee_id = appointment.employee_id;
        self.commit(gate, guards, Event::AppointmentCreated { appointment })
            .await?;
        debug!("appointment {id} stored for employee {employee_id}");
        Ok(id)
    }

    pub async fn set_appointment_status(
        &self,
        id: Ulid,
        status: AppointmentStatus,
    ) -> Result<Appointment, StoreError> {
        let employee_id = self
            .employee_for_appointment(&id)
            .ok_or(StoreError::NotFound(id))?;

        let gate = self.enter_gate().await;
        let guards = self.lock_employees(&[employee_id]).await;
        let mut updated = guards[0]
            .appointments
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))?;
        if !updated.status.can_become(status) {
            return Err(StoreError::InvalidTransition {
                id,
                from: updated.status,
                to: status,
            });
        }

        let event = Event::AppointmentStatusChanged { id, employee_id, status };
        self.commit(gate, guards, event).await?;
        updated.status = status;
        info!("appointment {id} is now {}", status.as_str());
        Ok(updated)
    }

    /// Rewrite the WAL with only the events needed to rebuild current state.
    /// Status history collapses into each appointment's current status.
    pub async fn compact_wal(&self) -> Result<(), StoreError> {
        let _exclusive = self.gate.write().await;

        let mut employee_ids: Vec<Ulid> = self.employees.iter().map(|e| *e.key()).collect();
        employee_ids.sort();

        let mut events = Vec::new();
        for employee_id in employee_ids {
            let Some(state) = self.employee_state(&employee_id) else {
                continue;
            };
            let es = state.read().await;
            if !es.schedule.is_empty() {
                events.push(Event::ScheduleReplaced {
                    employee_id,
                    entries: es.schedule.clone(),
                });
            }
            if !es.shifts.is_empty() {
                events.push(Event::ShiftsSaved {
                    shifts: es.shifts.values().cloned().collect(),
                });
            }
            for appointment in &es.appointments {
                events.push(Event::AppointmentCreated {
                    appointment: appointment.clone(),
                });
            }
        }

        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| StoreError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::WalError(e.to_string()))?;
        info!("WAL compacted to {count} events");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Compact once the WAL has grown by `threshold` appends. Returns whether it ran.
    pub async fn compact_if_needed(&self, threshold: u64) -> Result<bool, StoreError> {
        if self.wal_appends_since_compact().await < threshold {
            return Ok(false);
        }
        self.compact_wal().await?;
        Ok(true)
    }
}
