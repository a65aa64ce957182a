pub mod booking;
pub mod config;
pub mod limits;
pub mod model;
pub mod observability;
pub mod repository;
pub mod store;
pub mod wal;

pub use booking::{BookingError, BookingRequest, BookingService, ShiftScope};
pub use config::Config;
pub use repository::BookingRepository;
pub use store::{Store, StoreError};
