mod error;
mod exclusion;
mod mutations;
mod queries;

pub use error::StoreError;

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock, mpsc, oneshot};
use tracing::{debug, info};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

pub type SharedEmployeeState = Arc<RwLock<EmployeeState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Owns the WAL and batches appends for group commit: block for the first
/// append, drain whatever else is already queued, then one fsync for all.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                    .record(batch.len() as f64);
                let flush_start = std::time::Instant::now();
                let result = flush_batch(&mut wal, &batch);
                metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                    .record(flush_start.elapsed().as_secs_f64());
                respond_batch(batch, &result);

                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
    debug!("WAL writer stopped");
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after a failed append so stray buffered bytes don't leak into the next batch.
    let flush_result = wal.flush_sync();
    match append_err {
        Some(e) => Err(e),
        None => flush_result,
    }
}

fn respond_batch(batch: Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

async fn wal_append(wal_tx: &mpsc::Sender<WalCommand>, event: &Event) -> Result<(), StoreError> {
    let (tx, rx) = oneshot::channel();
    wal_tx
        .send(WalCommand::Append {
            event: event.clone(),
            response: tx,
        })
        .await
        .map_err(|_| StoreError::WalError("WAL writer shut down".into()))?;
    rx.await
        .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))?
        .map_err(|e| StoreError::WalError(e.to_string()))
}

/// Apply an event to one employee's state. Caller holds the write lock;
/// parts of the event that belong to other employees are skipped.
fn apply_event(es: &mut EmployeeState, event: &Event, index: &DashMap<Ulid, Ulid>) {
    match event {
        Event::ScheduleReplaced { entries, .. } => {
            es.schedule = entries.clone();
            es.schedule.sort_by_key(|e| e.day_of_week);
        }
        Event::ShiftsSaved { shifts } => {
            for shift in shifts.iter().filter(|s| s.employee_id == es.id) {
                es.shifts.insert(shift.date, shift.clone());
            }
        }
        Event::AppointmentCreated { appointment } => {
            index.insert(appointment.id, appointment.employee_id);
            es.insert_appointment(appointment.clone());
        }
        Event::AppointmentStatusChanged { id, status, .. } => {
            if let Some(appointment) = es.appointment_mut(*id) {
                appointment.status = *status;
            }
        }
    }
}

/// Durable schedule, shift and appointment store.
///
/// Each employee's data sits behind its own `RwLock`; every mutation takes the
/// write locks of the employees it touches, validates, appends to the WAL and
/// applies, so checks and writes are atomic per employee.
pub struct Store {
    employees: DashMap<Ulid, SharedEmployeeState>,
    /// Appointment id → employee id.
    appointment_index: Arc<DashMap<Ulid, Ulid>>,
    /// Held shared by every mutation, exclusively by compaction.
    gate: Arc<RwLock<()>>,
    wal_tx: mpsc::Sender<WalCommand>,
}

impl Store {
    /// Replay the WAL at `wal_path` and start the group-commit writer.
    /// Must be called inside a tokio runtime.
    pub fn open(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let appointment_index = Arc::new(DashMap::new());
        let mut states: HashMap<Ulid, EmployeeState> = HashMap::new();
        for event in &events {
            for employee_id in event.employee_ids() {
                let es = states
                    .entry(employee_id)
                    .or_insert_with(|| EmployeeState::new(employee_id));
                apply_event(es, event, &appointment_index);
            }
        }

        let employees = DashMap::new();
        for (id, es) in states {
            employees.insert(id, Arc::new(RwLock::new(es)));
        }
        info!(
            "store opened: {} events replayed, {} employees, {} appointments",
            events.len(),
            employees.len(),
            appointment_index.len()
        );

        Ok(Self {
            employees,
            appointment_index,
            gate: Arc::new(RwLock::new(())),
            wal_tx,
        })
    }

    pub fn employee_state(&self, id: &Ulid) -> Option<SharedEmployeeState> {
        self.employees.get(id).map(|e| e.value().clone())
    }

    /// Employees are not registered explicitly; their state appears on first write.
    pub(super) fn employee_state_or_default(&self, id: Ulid) -> SharedEmployeeState {
        self.employees
            .entry(id)
            .or_insert_with(|| Arc::new(RwLock::new(EmployeeState::new(id))))
            .value()
            .clone()
    }

    pub(super) fn employee_for_appointment(&self, id: &Ulid) -> Option<Ulid> {
        self.appointment_index.get(id).map(|e| *e.value())
    }

    pub(super) async fn enter_gate(&self) -> OwnedRwLockReadGuard<()> {
        self.gate.clone().read_owned().await
    }

    /// Write locks for `ids` taken in sorted order to rule out deadlocks.
    pub(super) async fn lock_employees(
        &self,
        ids: &[Ulid],
    ) -> Vec<OwnedRwLockWriteGuard<EmployeeState>> {
        let mut sorted = ids.to_vec();
        sorted.sort();
        sorted.dedup();
        let mut guards = Vec::with_capacity(sorted.len());
        for id in sorted {
            guards.push(self.employee_state_or_default(id).write_owned().await);
        }
        guards
    }

    /// WAL-append then apply to every guard.
    ///
    /// Runs in its own task that owns the locks: if the caller's future is
    /// dropped mid-commit, the event still lands in both the WAL and memory,
    /// never in only one of them.
    pub(super) async fn commit(
        &self,
        gate: OwnedRwLockReadGuard<()>,
        mut guards: Vec<OwnedRwLockWriteGuard<EmployeeState>>,
        event: Event,
    ) -> Result<(), StoreError> {
        let wal_tx = self.wal_tx.clone();
        let index = self.appointment_index.clone();
        let task = tokio::spawn(async move {
            let _gate = gate;
            wal_append(&wal_tx, &event).await?;
            for guard in guards.iter_mut() {
                apply_event(guard, &event, &index);
            }
            Ok(())
        });
        task.await
            .map_err(|e| StoreError::WalError(format!("commit task failed: {e}")))?
    }
}
