//! Operation metrics for EntityStore backends
#![allow(clippy::cast_precision_loss)]

use metrics::{counter, histogram};
use std::time::Instant;

/// Outcome label for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Error,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::Error => "error",
        }
    }

    pub fn of<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            Outcome::Ok
        } else {
            Outcome::Error
        }
    }
}

/// Record a finished store operation
pub fn record_operation(store: &str, operation: &'static str, outcome: Outcome, started: Instant) {
    counter!(
        "entitystore_operations_total",
        "store" => store.to_string(),
        "operation" => operation,
        "outcome" => outcome.as_str()
    )
    .increment(1);
    histogram!(
        "entitystore_operation_duration_us",
        "store" => store.to_string(),
        "operation" => operation
    )
    .record(started.elapsed().as_micros() as f64);
}

/// Record rows appended to a collection by a list load
pub fn record_rows_materialized(store: &str, rows: usize) {
    counter!("entitystore_rows_materialized_total", "store" => store.to_string())
        .increment(rows as u64);
}
