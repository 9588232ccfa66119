//! Common types and utilities shared across the catalog harvester crates.

pub mod bbox;
pub mod error;
pub mod time;

pub use bbox::BoundingBox;
pub use error::{ErrorKind, HarvestError, HarvestResult};
pub use time::{
    date_key, expand_time_positions, format_zulu, generate_times, parse_iso8601, IsoDuration,
    TimeInterval, TimeParseError, TimeStep,
};
