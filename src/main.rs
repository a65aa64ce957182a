use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use ulid::Ulid;

use timehub_booking::model::{CalendarDay, Slot};
use timehub_booking::{BookingRequest, BookingService, Config, Store};

#[derive(Debug, Parser)]
#[command(name = "timehub-booking")]
#[command(about = "Inspect availability and manage bookings in a timehub data directory")]
#[command(after_help = "Configuration comes from TIMEHUB_* environment variables.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List an employee's slots for one day
    Slots {
        employee: Ulid,
        date: NaiveDate,
        /// UTC offset the day is read in, e.g. +03:00
        #[arg(long, allow_hyphen_values = true)]
        offset: Option<FixedOffset>,
    },
    /// Book an interval for a client
    Book {
        employee: Ulid,
        service: Ulid,
        client: Ulid,
        /// RFC 3339 start instant
        #[arg(value_parser = parse_instant)]
        start: DateTime<FixedOffset>,
        /// RFC 3339 end instant
        #[arg(value_parser = parse_instant)]
        end: DateTime<FixedOffset>,
        #[arg(long, default_value = "")]
        comment: String,
    },
    /// Cancel an appointment
    Cancel { appointment: Ulid },
    /// Rewrite the WAL down to current state
    Compact,
}

fn parse_instant(s: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s)
}

/// A slot as printed, in the wall clock of the queried day.
#[derive(Debug, Serialize)]
struct SlotView {
    start: Option<DateTime<FixedOffset>>,
    end: Option<DateTime<FixedOffset>>,
    is_free: bool,
}

impl SlotView {
    fn new(day: &CalendarDay, slot: &Slot) -> Self {
        Self {
            start: day.to_datetime(slot.span.start),
            end: day.to_datetime(slot.span.end),
            is_free: slot.is_free,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    timehub_booking::observability::init_tracing();
    let config = Config::from_env();
    timehub_booking::observability::init_metrics(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let store = Arc::new(Store::open(config.wal_path())?);
    info!("store at {}", config.wal_path().display());
    let service = BookingService::new(store.clone(), &config);

    match cli.command {
        Command::Slots {
            employee,
            date,
            offset,
        } => {
            let day = CalendarDay::new(date, offset.unwrap_or_else(|| Utc.fix()));
            let slots = service.get_available_slots(employee, Ulid::nil(), day).await?;
            let views: Vec<SlotView> = slots.iter().map(|s| SlotView::new(&day, s)).collect();
            println!("{}", serde_json::to_string_pretty(&views)?);
        }
        Command::Book {
            employee,
            service: service_id,
            client,
            start,
            end,
            comment,
        } => {
            let request = BookingRequest {
                employee_id: employee,
                service_id,
                client_id: client,
                start,
                end,
                comment,
            };
            let appointment = service.create_booking(request).await?;
            println!("{}", serde_json::to_string_pretty(&appointment)?);
            store.compact_if_needed(config.compact_threshold).await?;
        }
        Command::Cancel { appointment } => {
            let appointment = service.cancel_booking(appointment).await?;
            println!("{}", serde_json::to_string_pretty(&appointment)?);
            store.compact_if_needed(config.compact_threshold).await?;
        }
        Command::Compact => {
            store.compact_wal().await?;
        }
    }
    Ok(())
}
