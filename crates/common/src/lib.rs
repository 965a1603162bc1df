//! Shared time and error-context utilities used across the murmur crates.

pub mod error;
pub mod time;

pub use {
    error::FromMessage,
    time::{Clock, ManualClock, SystemClock, epoch_secs},
};
