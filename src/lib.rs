pub mod config;
pub mod connection;
pub mod descriptor;
pub mod extension;
pub mod flow;
pub mod logger;
pub mod node;
pub mod nodes;
pub mod payload;
pub mod resolver;
pub mod schema;
pub mod secret;
pub mod store;

pub use airtable_client::{AirtableApi, AirtableClient, AirtableError, Record, RecordPage};
