//! Outbound notification of terminal executions.

mod notifier;

pub use notifier::{ExecutionNotification, LoggingNotifier, NoOpNotifier, Notifier};
