use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveTime, TimeZone, Utc};
use ulid::Ulid;

use timehub_booking::model::{CalendarDay, ScheduleEntry};
use timehub_booking::{BookingRequest, BookingService, Config, Store};

const SLOTS_PER_DAY: usize = 18;

fn bench_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("timehub_bench");
    std::fs::create_dir_all(&dir).expect("create bench dir");
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

fn first_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2027, 1, 4).expect("valid date")
}

/// The `n`th half-hour slot counting from 09:00 on `first_day`, every day 09:00–18:00.
fn slot_request(employee_id: Ulid, n: usize) -> BookingRequest {
    let date = first_day() + ChronoDuration::days((n / SLOTS_PER_DAY) as i64);
    let start = Utc
        .from_utc_datetime(&date.and_time(NaiveTime::from_hms_opt(9, 0, 0).expect("valid time")))
        + ChronoDuration::minutes(30 * (n % SLOTS_PER_DAY) as i64);
    BookingRequest {
        employee_id,
        service_id: Ulid::new(),
        client_id: Ulid::new(),
        start: start.fixed_offset(),
        end: (start + ChronoDuration::minutes(30)).fixed_offset(),
        comment: String::new(),
    }
}

async fn new_employee(service: &BookingService<Store>) -> Ulid {
    let employee_id = Ulid::new();
    let week = (0..7)
        .map(|day_of_week| ScheduleEntry {
            employee_id,
            day_of_week,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
            end_time: NaiveTime::from_hms_opt(18, 0, 0).expect("valid time"),
            is_day_off: false,
        })
        .collect();
    service
        .set_schedule(employee_id, week)
        .await
        .expect("set schedule");
    employee_id
}

async fn phase1_sequential(service: &BookingService<Store>) {
    let employee_id = new_employee(service).await;
    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let t = Instant::now();
        service
            .create_booking(slot_request(employee_id, i))
            .await
            .expect("sequential booking");
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("booking latency", &mut latencies);
}

/// Many clients race for the same slots; each slot must be won exactly once.
async fn phase2_contention(service: &BookingService<Store>) {
    let employee_id = new_employee(service).await;
    let n_tasks = 16;
    let n_slots = 300;
    let confirmed = Arc::new(AtomicUsize::new(0));
    let conflicts = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..n_tasks {
        let service = service.clone();
        let confirmed = confirmed.clone();
        let conflicts = conflicts.clone();
        handles.push(tokio::spawn(async move {
            for slot in 0..n_slots {
                match service.create_booking(slot_request(employee_id, slot)).await {
                    Ok(_) => confirmed.fetch_add(1, Ordering::Relaxed),
                    Err(e) if e.is_conflict() => conflicts.fetch_add(1, Ordering::Relaxed),
                    Err(e) => panic!("unexpected booking error: {e}"),
                };
            }
        }));
    }
    for h in handles {
        h.await.expect("contention task");
    }

    let elapsed = start.elapsed();
    let won = confirmed.load(Ordering::Relaxed);
    let lost = conflicts.load(Ordering::Relaxed);
    println!(
        "  {n_tasks} tasks x {n_slots} slots: {won} confirmed, {lost} conflicts in {:.2}s",
        elapsed.as_secs_f64()
    );
    assert_eq!(won, n_slots, "every slot must be booked exactly once");
}

async fn phase3_read_under_load(service: &BookingService<Store>) {
    let reader_employee = new_employee(service).await;
    for i in 0..SLOTS_PER_DAY / 2 {
        service
            .create_booking(slot_request(reader_employee, i * 2))
            .await
            .expect("prefill booking");
    }

    let stop = Arc::new(AtomicBool::new(false));
    let mut writer_handles = Vec::new();
    for _ in 0..5 {
        let service = service.clone();
        let stop = stop.clone();
        writer_handles.push(tokio::spawn(async move {
            let employee_id = new_employee(&service).await;
            let mut i = 0;
            while !stop.load(Ordering::Relaxed) {
                let _ = service.create_booking(slot_request(employee_id, i)).await;
                i += 1;
            }
        }));
    }

    let n_readers = 10;
    let reads_per_reader = 500;
    let day = CalendarDay::utc(first_day());
    let mut reader_handles = Vec::new();
    for _ in 0..n_readers {
        let service = service.clone();
        reader_handles.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(reads_per_reader);
            for _ in 0..reads_per_reader {
                let t = Instant::now();
                let slots = service
                    .get_available_slots(reader_employee, Ulid::nil(), day)
                    .await
                    .expect("availability query");
                assert_eq!(slots.len(), SLOTS_PER_DAY);
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for h in reader_handles {
        all_latencies.extend(h.await.expect("reader task"));
    }
    stop.store(true, Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }

    print_latency("availability query", &mut all_latencies);
}

async fn phase4_compaction(store: &Store) {
    let before = store.wal_appends_since_compact().await;
    let start = Instant::now();
    store.compact_wal().await.expect("compaction");
    println!(
        "  compacted after {before} appends in {:.2}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );
}

#[tokio::main]
async fn main() {
    let config = Config {
        request_timeout: Duration::from_secs(30),
        ..Config::default()
    };
    let store = Arc::new(Store::open(bench_wal_path("stress.wal")).expect("open store"));
    let service = BookingService::new(store.clone(), &config);

    println!("=== timehub booking stress benchmark ===");

    println!("\n[phase 1] sequential booking throughput");
    phase1_sequential(&service).await;

    println!("\n[phase 2] contended bookings");
    phase2_contention(&service).await;

    println!("\n[phase 3] availability latency under write load");
    phase3_read_under_load(&service).await;

    println!("\n[phase 4] WAL compaction");
    phase4_compaction(&store).await;

    println!("\n=== benchmark complete ===");
}
