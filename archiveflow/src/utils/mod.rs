//! Utility functions for timestamp handling.

pub mod timestamps;

pub use timestamps::{
    file_timestamp, fixed_clock, now_utc, system_clock, Clock, Timestamp, FILE_TIMESTAMP_FORMAT,
};
