use ulid::Ulid;

use crate::model::*;
use crate::repository::BookingRepository;
use crate::store::StoreError;

/// Where a day's working hours come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoursSource {
    /// A shift dated on the day. Replaces the template entirely.
    Override(Shift),
    /// The weekly entry for the day's weekday.
    Template(ScheduleEntry),
    Undefined,
}

impl HoursSource {
    /// The precedence rule: any override wins; otherwise the template entry
    /// for `weekday`, if there is one.
    pub fn choose(overrides: &[Shift], template: &[ScheduleEntry], weekday: u8) -> Self {
        match overrides.first() {
            Some(shift) => HoursSource::Override(shift.clone()),
            None => template
                .iter()
                .find(|e| e.day_of_week == weekday)
                .cloned()
                .map_or(HoursSource::Undefined, HoursSource::Template),
        }
    }

    pub fn window(&self, day: CalendarDay) -> WorkingWindow {
        let (start_time, end_time, is_day_off) = match self {
            HoursSource::Override(s) => (s.start_time, s.end_time, s.is_day_off),
            HoursSource::Template(e) => (e.start_time, e.end_time, e.is_day_off),
            HoursSource::Undefined => return WorkingWindow::closed(day),
        };
        WorkingWindow {
            day,
            start_time,
            end_time,
            is_day_off,
        }
    }
}

/// Look up the hours source for `employee_id` on `day`. The weekly template
/// is only read when no override exists.
pub async fn resolve_hours<R: BookingRepository + ?Sized>(
    repo: &R,
    employee_id: Ulid,
    day: CalendarDay,
) -> Result<HoursSource, StoreError> {
    let overrides = repo
        .get_shift_overrides(employee_id, day.date, day.date)
        .await?;
    if !overrides.is_empty() {
        return Ok(HoursSource::choose(&overrides, &[], day.weekday_index()));
    }
    let template = repo.get_weekly_schedule(employee_id).await?;
    Ok(HoursSource::choose(&[], &template, day.weekday_index()))
}

pub async fn resolve_working_window<R: BookingRepository + ?Sized>(
    repo: &R,
    employee_id: Ulid,
    day: CalendarDay,
) -> Result<WorkingWindow, StoreError> {
    Ok(resolve_hours(repo, employee_id, day).await?.window(day))
}
