use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. The only instant type.
pub type Ms = i64;

pub const MINUTE_MS: Ms = 60_000;
pub const DAY_MS: Ms = 24 * 60 * MINUTE_MS;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Strict overlap: touching endpoints do not count.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Smallest span covering both.
    pub fn union(&self, other: &Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// A calendar day as seen from the caller's fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub offset: FixedOffset,
}

impl CalendarDay {
    pub fn new(date: NaiveDate, offset: FixedOffset) -> Self {
        Self { date, offset }
    }

    pub fn utc(date: NaiveDate) -> Self {
        Self::new(date, Utc.fix())
    }

    /// The day an instant falls on, keeping the instant's own offset.
    pub fn of_instant(at: &DateTime<FixedOffset>) -> Self {
        Self::new(at.date_naive(), *at.offset())
    }

    /// 0 = Sunday … 6 = Saturday.
    pub fn weekday_index(&self) -> u8 {
        self.date.weekday().num_days_from_sunday() as u8
    }

    /// The instant at which the wall clock shows `time` on this day.
    pub fn at(&self, time: NaiveTime) -> Ms {
        let local = self.date.and_time(time).and_utc().timestamp_millis();
        local - self.offset.local_minus_utc() as Ms * 1_000
    }

    /// `[00:00, next day 00:00)` on this day.
    pub fn span(&self) -> Span {
        let start = self.at(NaiveTime::MIN);
        Span::new(start, start + DAY_MS)
    }

    pub fn to_datetime(&self, ms: Ms) -> Option<DateTime<FixedOffset>> {
        self.offset.timestamp_millis_opt(ms).single()
    }
}

// ── Schedule data ────────────────────────────────────────────────

/// Weekly template entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub employee_id: Ulid,
    /// 0 = Sunday … 6 = Saturday.
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_day_off: bool,
}

/// Date-specific override of the weekly template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    pub id: Ulid,
    pub employee_id: Ulid,
    pub branch_id: Ulid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_day_off: bool,
}

/// Effective working hours for one employee on one day. Computed per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingWindow {
    pub day: CalendarDay,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_day_off: bool,
}

impl WorkingWindow {
    /// No hours defined for the day; treated like a day off.
    pub fn closed(day: CalendarDay) -> Self {
        Self {
            day,
            start_time: NaiveTime::MIN,
            end_time: NaiveTime::MIN,
            is_day_off: true,
        }
    }

    /// The bookable span, or `None` when nothing can be booked that day.
    pub fn span(&self) -> Option<Span> {
        if self.is_day_off {
            return None;
        }
        let start = self.day.at(self.start_time);
        let end = self.day.at(self.end_time);
        (start < end).then(|| Span::new(start, end))
    }
}

// ── Appointments ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl AppointmentStatus {
    /// Whether the appointment blocks its time range.
    pub fn occupies_time(self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }

    pub fn can_become(self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Ulid,
    pub employee_id: Ulid,
    pub service_id: Ulid,
    pub client_id: Ulid,
    pub span: Span,
    pub status: AppointmentStatus,
    pub comment: String,
}

/// Candidate booking interval with its free/busy flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub span: Span,
    pub is_free: bool,
}

// ── Per-employee state ───────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EmployeeState {
    pub id: Ulid,
    /// Sorted by `day_of_week`, at most one entry per day.
    pub schedule: Vec<ScheduleEntry>,
    pub shifts: BTreeMap<NaiveDate, Shift>,
    /// All appointments including cancelled ones, sorted by `span.start`.
    pub appointments: Vec<Appointment>,
}

impl EmployeeState {
    pub fn new(id: Ulid) -> Self {
        Self {
            id,
            schedule: Vec::new(),
            shifts: BTreeMap::new(),
            appointments: Vec::new(),
        }
    }

    /// Insert appointment maintaining sort order by span.start.
    pub fn insert_appointment(&mut self, appointment: Appointment) {
        let pos = self
            .appointments
            .partition_point(|a| a.span.start <= appointment.span.start);
        self.appointments.insert(pos, appointment);
    }

    pub fn appointment_mut(&mut self, id: Ulid) -> Option<&mut Appointment> {
        self.appointments.iter_mut().find(|a| a.id == id)
    }

    /// Appointments of any status whose span overlaps the query window.
    /// Uses binary search to skip appointments starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Appointment> {
        let right_bound = self
            .appointments
            .partition_point(|a| a.span.start < query.end);
        self.appointments[..right_bound]
            .iter()
            .filter(move |a| a.span.end > query.start)
    }

    /// Like `overlapping`, but only appointments that occupy time.
    pub fn live_overlapping(&self, query: &Span) -> impl Iterator<Item = &Appointment> {
        self.overlapping(query).filter(|a| a.status.occupies_time())
    }
}

/// WAL record format. Each variant is one atomic mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ScheduleReplaced {
        employee_id: Ulid,
        entries: Vec<ScheduleEntry>,
    },
    ShiftsSaved {
        shifts: Vec<Shift>,
    },
    AppointmentCreated {
        appointment: Appointment,
    },
    AppointmentStatusChanged {
        id: Ulid,
        employee_id: Ulid,
        status: AppointmentStatus,
    },
}

impl Event {
    /// Employees touched by this event, sorted and deduplicated.
    pub fn employee_ids(&self) -> Vec<Ulid> {
        let mut ids = match self {
            Event::ScheduleReplaced { employee_id, .. }
            | Event::AppointmentStatusChanged { employee_id, .. } => vec![*employee_id],
            Event::AppointmentCreated { appointment } => vec![appointment.employee_id],
            Event::ShiftsSaved { shifts } => shifts.iter().map(|s| s.employee_id).collect(),
        };
        ids.sort();
        ids.dedup();
        ids
    }
}
