//! Invocation records and the report returned from a run

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use uuid::Uuid;

use super::ValidationResult;
use crate::message::{Severity, ValidationMessage};
use crate::validator::ValidatorId;

/// One validator invocation within a run.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationRecord {
    pub validation_name: String,
    pub validator_name: String,
    pub validator_id: ValidatorId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration: Duration,
    pub item_count: usize,
    pub message_count: usize,
    pub cancelled: bool,
    pub thread_name: Option<String>,
}

/// Everything a run produced: one result per distinct item plus the
/// invocation records in completion order.
#[derive(Debug, Clone)]
pub struct ValidationReport<T> {
    run_id: Uuid,
    validation_name: String,
    results: HashMap<T, ValidationResult<T>>,
    records: Vec<ValidationRecord>,
}

impl<T: Eq + Hash> ValidationReport<T> {
    pub(crate) fn new(
        run_id: Uuid,
        validation_name: String,
        results: HashMap<T, ValidationResult<T>>,
        records: Vec<ValidationRecord>,
    ) -> Self {
        Self {
            run_id,
            validation_name,
            results,
            records,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn validation_name(&self) -> &str {
        &self.validation_name
    }

    pub fn result(&self, item: &T) -> Option<&ValidationResult<T>> {
        self.results.get(item)
    }

    pub fn results(&self) -> &HashMap<T, ValidationResult<T>> {
        &self.results
    }

    pub fn into_results(self) -> HashMap<T, ValidationResult<T>> {
        self.results
    }

    pub fn records(&self) -> &[ValidationRecord] {
        &self.records
    }

    pub fn messages(&self) -> impl Iterator<Item = &ValidationMessage> {
        self.results.values().flat_map(|r| r.messages().iter())
    }

    pub fn message_count(&self) -> usize {
        self.results.values().map(ValidationResult::len).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.results.values().all(ValidationResult::is_empty)
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.results
            .values()
            .filter_map(ValidationResult::max_severity)
            .max()
    }

    /// Items with at least one message at or above `severity`.
    pub fn failing_items(&self, severity: Severity) -> impl Iterator<Item = &T> {
        self.results
            .iter()
            .filter(move |(_, r)| r.max_severity().is_some_and(|s| s >= severity))
            .map(|(item, _)| item)
    }
}
