pub mod client;
pub mod error;
pub mod model;

pub use client::{AirtableApi, AirtableClient, DEFAULT_API_URL};
pub use error::AirtableError;
pub use model::{ListQuery, Record, RecordPage, Sort, SortDirection};
