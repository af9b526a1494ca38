pub mod csv_io;
pub mod db;
pub mod error;
pub mod goals;
pub mod input;
pub mod models;
pub mod query;
pub mod report;
pub mod service;

pub use error::{HealthError, Result};
pub use models::{HealthRecord, HealthRecordUpdate, Patch, UpsertOutcome, WriteStatus};
pub use query::DateQuery;
pub use service::HealthService;
