//! Utility functions for identifiers and timestamps.

mod timestamps;
mod uuid_utils;

pub use timestamps::{format_iso8601, now_utc, Timestamp};
pub use uuid_utils::generate_uuid_v7;
