use crate::model::Ms;

pub const MAX_COMMENT_LEN: usize = 2_000;
pub const MAX_SHIFTS_PER_BATCH: usize = 1_000;
/// One entry per weekday.
pub const MAX_SCHEDULE_ENTRIES: usize = 7;
pub const MAX_APPOINTMENTS_PER_EMPLOYEE: usize = 100_000;

/// Widest span a single appointment or appointment query may cover (31 days).
pub const MAX_QUERY_WINDOW_MS: Ms = 31 * 24 * 3_600_000;

pub const MIN_SLOT_MINUTES: i64 = 5;
pub const MAX_SLOT_MINUTES: i64 = 24 * 60;
