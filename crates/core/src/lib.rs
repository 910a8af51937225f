#![forbid(unsafe_code)]

pub mod merge;
pub mod model;
pub mod scoring;
pub mod time;
pub mod unlock;

pub use merge::{Snapshot, merge};
pub use time::Clock;
