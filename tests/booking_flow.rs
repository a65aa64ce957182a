use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime};
use futures::future::join_all;
use ulid::Ulid;

use timehub_booking::model::{AppointmentStatus, CalendarDay, ScheduleEntry};
use timehub_booking::{BookingError, BookingRequest, BookingService, Config, Store};

// ── Test infrastructure ──────────────────────────────────────

fn test_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("timehub_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn open(dir: &PathBuf) -> BookingService<Store> {
    let config = Config {
        data_dir: dir.clone(),
        ..Config::default()
    };
    let store = Arc::new(Store::open(config.wal_path()).unwrap());
    BookingService::new(store, &config)
}

/// 2026-10-19 is a Monday.
fn monday() -> CalendarDay {
    CalendarDay::utc(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())
}

async fn hire(service: &BookingService<Store>) -> Ulid {
    let employee_id = Ulid::new();
    service
        .set_schedule(
            employee_id,
            vec![ScheduleEntry {
                employee_id,
                day_of_week: 1,
                start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
                is_day_off: false,
            }],
        )
        .await
        .unwrap();
    employee_id
}

fn request(employee_id: Ulid, start: &str, end: &str) -> BookingRequest {
    BookingRequest {
        employee_id,
        service_id: Ulid::new(),
        client_id: Ulid::new(),
        start: DateTime::parse_from_rfc3339(start).unwrap(),
        end: DateTime::parse_from_rfc3339(end).unwrap(),
        comment: String::new(),
    }
}

// ── Concurrency ──────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_for_one_slot_confirm_exactly_one() {
    let service = open(&test_dir());
    let employee_id = hire(&service).await;

    let n = 24;
    let attempts = (0..n).map(|_| {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .create_booking(request(employee_id, "2026-10-19T10:00:00Z", "2026-10-19T10:30:00Z"))
                .await
        })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let confirmed = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.is_conflict()))
        .count();
    assert_eq!(confirmed, 1);
    assert_eq!(conflicts, n - 1);

    let slots = service
        .get_available_slots(employee_id, Ulid::nil(), monday())
        .await
        .unwrap();
    assert_eq!(slots.iter().filter(|s| !s.is_free).count(), 1);
    assert!(!slots[2].is_free);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_overlapping_spans_never_both_confirm() {
    let service = open(&test_dir());
    let employee_id = hire(&service).await;

    let long = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .create_booking(request(employee_id, "2026-10-19T10:00:00Z", "2026-10-19T11:00:00Z"))
                .await
        })
    };
    let short = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .create_booking(request(employee_id, "2026-10-19T10:30:00Z", "2026-10-19T11:00:00Z"))
                .await
        })
    };
    let (long, short) = (long.await.unwrap(), short.await.unwrap());
    assert!(long.is_ok() != short.is_ok(), "exactly one must win: {long:?} / {short:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_employees_book_same_time_independently() {
    let service = open(&test_dir());
    let mut employees = Vec::new();
    for _ in 0..8 {
        employees.push(hire(&service).await);
    }

    let attempts = employees.iter().map(|&employee_id| {
        let service = service.clone();
        async move {
            service
                .create_booking(request(employee_id, "2026-10-19T14:00:00Z", "2026-10-19T14:30:00Z"))
                .await
        }
    });
    let results = join_all(attempts).await;
    assert!(results.iter().all(|r| r.is_ok()));
}

// ── Durability ───────────────────────────────────────────────

#[tokio::test]
async fn bookings_survive_reopen() {
    let dir = test_dir();
    let (employee_id, booked) = {
        let service = open(&dir);
        let employee_id = hire(&service).await;
        let booked = service
            .create_booking(request(employee_id, "2026-10-19T09:00:00Z", "2026-10-19T09:30:00Z"))
            .await
            .unwrap();
        let cancelled = service
            .create_booking(request(employee_id, "2026-10-19T12:00:00Z", "2026-10-19T12:30:00Z"))
            .await
            .unwrap();
        service.cancel_booking(cancelled.id).await.unwrap();
        (employee_id, booked)
    };

    let service = open(&dir);
    let slots = service
        .get_available_slots(employee_id, Ulid::nil(), monday())
        .await
        .unwrap();
    assert_eq!(slots.len(), 18);
    assert!(!slots[0].is_free);
    assert!(slots[6].is_free);

    let err = service
        .create_booking(request(employee_id, "2026-10-19T09:00:00Z", "2026-10-19T09:30:00Z"))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::SlotConflict { .. }));

    let stored = service.repository().get_appointment(booked.id).await.unwrap();
    assert_eq!(stored.status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn compaction_keeps_availability() {
    let dir = test_dir();
    let employee_id = {
        let service = open(&dir);
        let employee_id = hire(&service).await;
        for start in ["10:00", "11:00", "15:30"] {
            let end = NaiveTime::parse_from_str(start, "%H:%M").unwrap()
                + chrono::Duration::minutes(30);
            service
                .create_booking(request(
                    employee_id,
                    &format!("2026-10-19T{start}:00Z"),
                    &format!("2026-10-19T{}:00Z", end.format("%H:%M")),
                ))
                .await
                .unwrap();
        }
        let before = service
            .get_available_slots(employee_id, Ulid::nil(), monday())
            .await
            .unwrap();
        service.repository().compact_wal().await.unwrap();
        assert_eq!(service.repository().wal_appends_since_compact().await, 0);
        let after = service
            .get_available_slots(employee_id, Ulid::nil(), monday())
            .await
            .unwrap();
        assert_eq!(before, after);
        employee_id
    };

    let service = open(&dir);
    let slots = service
        .get_available_slots(employee_id, Ulid::nil(), monday())
        .await
        .unwrap();
    let busy: Vec<usize> = (0..slots.len()).filter(|&i| !slots[i].is_free).collect();
    assert_eq!(busy, vec![2, 4, 13]);
}
