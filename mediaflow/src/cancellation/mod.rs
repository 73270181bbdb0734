//! Cooperative cancellation.
//!
//! Cancellation is observed only at poll boundaries and before a stage
//! starts; in-flight external jobs are never killed.

mod token;

pub use token::CancellationToken;
