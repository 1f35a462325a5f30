#![forbid(unsafe_code)]

//! The activity trail: decoded contract logs rendered as bounded, newest-first
//! entries, plus the search, export and tagging built on top of them.

use fairsoil_gateway::GatewayError;

mod builder;
mod csv;
mod cursor;
mod filter;
mod loader;
mod store;
mod tags;
mod timestamps;

pub use builder::{TrailEvent, build_trail_item};
pub use csv::{CSV_HEADER, csv_file_name, export_csv};
pub use cursor::LogCursor;
pub use filter::{AuditCategory, AuditFilter, TrailQuery, audit_category, filter_trail};
pub use loader::{DEFAULT_MAX_LOG_SPAN, HistoricalTrail, TrailLoader};
pub use store::{BackfillTicket, DEFAULT_TRAIL_CAPACITY, InMemoryIdSet, TrailIdSet, TrailStore};
pub use tags::{InMemoryTagStore, JsonFileTagStore, TAG_KEY_PREFIX, TagKey, TagStore};
pub use timestamps::BlockTimestampCache;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrailError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("failed to access tag store {path}: {message}")]
    TagIo { path: String, message: String },
    #[error("tag store {path} is not valid JSON: {message}")]
    TagFormat { path: String, message: String },
}
