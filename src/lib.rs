//! Player prop confidence scoring.
//!
//! [`scoring::ConfidenceEngine`] answers "how likely is this player to clear
//! this line tonight" as a 0–100 decimal. [`cache`] memoizes hit rates under
//! deterministic keys and warms them once a day ahead of the slate.

pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod monitor;
pub mod scoring;
