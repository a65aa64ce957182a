//! Availability and conflict-free booking.
//!
//! One pipeline answers both "which slots are free" and "may this booking
//! be confirmed": resolve the working window (`hours`), cut it into slots
//! (`slots`), flag the ones overlapping live appointments (`marker`).
//! `commit` runs the pipeline against live state and hands admitted bookings
//! to the repository, whose exclusion constraint settles races.

mod commit;
mod error;
pub mod hours;
pub mod marker;
pub mod slots;

pub use error::BookingError;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Datelike, FixedOffset, Months, NaiveDate};
use tracing::debug;
use ulid::Ulid;

use crate::config::Config;
use crate::limits::MAX_QUERY_WINDOW_MS;
use crate::model::*;
use crate::repository::BookingRepository;

use hours::resolve_working_window;
use marker::mark_availability;
use slots::generate_slots;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub employee_id: Ulid,
    pub service_id: Ulid,
    pub client_id: Ulid,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub comment: String,
}

impl BookingRequest {
    pub fn span(&self) -> Result<Span, BookingError> {
        let (start, end) = (self.start.timestamp_millis(), self.end.timestamp_millis());
        if start >= end {
            return Err(BookingError::Invalid("start must be before end"));
        }
        if end - start > MAX_QUERY_WINDOW_MS {
            return Err(BookingError::Invalid("booking span too wide"));
        }
        Ok(Span::new(start, end))
    }

    /// The calendar day the booking starts on, in the caller's offset.
    pub fn day(&self) -> CalendarDay {
        CalendarDay::of_instant(&self.start)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftScope {
    Employee(Ulid),
    Branch(Ulid),
}

/// One run of resolve → generate → mark.
#[derive(Debug, Clone)]
pub(crate) struct DayAvailability {
    pub window: WorkingWindow,
    pub slots: Vec<Slot>,
    /// Live appointments that were read to mark the slots.
    pub appointments: Vec<Appointment>,
}

pub struct BookingService<R: ?Sized> {
    repo: Arc<R>,
    slot_duration: Ms,
    timeout: Duration,
}

impl<R: ?Sized> Clone for BookingService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            slot_duration: self.slot_duration,
            timeout: self.timeout,
        }
    }
}

impl<R: BookingRepository + ?Sized> BookingService<R> {
    pub fn new(repo: Arc<R>, config: &Config) -> Self {
        Self {
            repo,
            slot_duration: config.slot_duration_ms(),
            timeout: config.request_timeout,
        }
    }

    /// Same service, different deadline for each call made through it.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Slot length used for `service_id`. Every service currently books in
    /// the configured length.
    pub fn slot_duration_for(&self, _service_id: Ulid) -> Ms {
        self.slot_duration
    }

    /// Applies the deadline. Only reads go through here; a write that has
    /// reached the repository is always awaited to its outcome.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, BookingError>>,
    ) -> Result<T, BookingError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| BookingError::Timeout(self.timeout))?
    }

    /// The shared pipeline. `also_cover` widens the appointment read beyond
    /// the working window, for requests that run past it.
    pub(crate) async fn day_availability(
        &self,
        employee_id: Ulid,
        day: CalendarDay,
        slot_duration: Ms,
        also_cover: Option<Span>,
    ) -> Result<DayAvailability, BookingError> {
        let window = resolve_working_window(self.repo.as_ref(), employee_id, day).await?;
        let Some(window_span) = window.span() else {
            return Ok(DayAvailability {
                window,
                slots: Vec::new(),
                appointments: Vec::new(),
            });
        };

        let read_span = also_cover.map_or(window_span, |s| window_span.union(&s));
        let appointments = self
            .repo
            .get_appointments(employee_id, read_span)
            .await?;
        let slots = mark_availability(generate_slots(&window_span, slot_duration), &appointments);
        Ok(DayAvailability {
            window,
            slots,
            appointments,
        })
    }

    /// Every slot of the employee's working window on `day`, flagged free or
    /// busy. Empty on days off and days without hours. Past slots are kept.
    pub async fn get_available_slots(
        &self,
        employee_id: Ulid,
        service_id: Ulid,
        day: CalendarDay,
    ) -> Result<Vec<Slot>, BookingError> {
        let started = Instant::now();
        let result = self
            .bounded(self.day_availability(employee_id, day, self.slot_duration_for(service_id), None))
            .await;
        metrics::counter!(crate::observability::SLOT_QUERIES_TOTAL).increment(1);
        metrics::histogram!(crate::observability::SLOT_QUERY_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        let availability = result?;
        debug!(
            "employee {employee_id} on {} ({}-{}, day off: {}): {} slots, {} free",
            day.date,
            availability.window.start_time,
            availability.window.end_time,
            availability.window.is_day_off,
            availability.slots.len(),
            availability.slots.iter().filter(|s| s.is_free).count()
        );
        Ok(availability.slots)
    }

    pub async fn get_schedule(&self, employee_id: Ulid) -> Result<Vec<ScheduleEntry>, BookingError> {
        self.bounded(async {
            self.repo
                .get_weekly_schedule(employee_id)
                .await
                .map_err(BookingError::from)
        })
        .await
    }

    /// Writes are not bounded by the deadline: once handed to the repository
    /// the call reports the real outcome.
    pub async fn set_schedule(
        &self,
        employee_id: Ulid,
        entries: Vec<ScheduleEntry>,
    ) -> Result<(), BookingError> {
        Ok(self.repo.replace_weekly_schedule(employee_id, entries).await?)
    }

    /// Shifts for the calendar month containing `month`.
    pub async fn get_shifts(
        &self,
        scope: ShiftScope,
        month: NaiveDate,
    ) -> Result<Vec<Shift>, BookingError> {
        let (first, last) = month_bounds(month).ok_or(BookingError::Invalid("month out of range"))?;
        self.bounded(async {
            match scope {
                ShiftScope::Employee(id) => self.repo.get_shift_overrides(id, first, last).await,
                ShiftScope::Branch(id) => self.repo.get_branch_shifts(id, first, last).await,
            }
            .map_err(BookingError::from)
        })
        .await
    }

    pub async fn save_shifts(&self, shifts: Vec<Shift>) -> Result<Vec<Shift>, BookingError> {
        Ok(self.repo.upsert_shifts(shifts).await?)
    }
}

/// First and last day of the month containing `day`.
fn month_bounds(day: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let first = day.with_day(1)?;
    let last = first.checked_add_months(Months::new(1))?.pred_opt()?;
    Some((first, last))
}
