//! Per-item state for the duration of one run

use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::context::ValidatorContext;
use crate::error::Result;
use crate::message::{Report, Severity, ValidationMessage};
use crate::result::ValidationResult;
use crate::skip;
use crate::validator::Item;

/// One item of a run together with its skip controls and the messages
/// reported against it so far.
pub struct DataWrapper<T: Item> {
    data: T,
    run_id: Uuid,
    skip_all: AtomicBool,
    ignored: RwLock<BTreeSet<String>>,
    result: Mutex<ValidationResult<T>>,
}

impl<T: Item> DataWrapper<T> {
    pub(crate) fn new(data: T, run_id: Uuid) -> Self {
        Self {
            result: Mutex::new(ValidationResult::new(data.clone())),
            data,
            run_id,
            skip_all: AtomicBool::new(false),
            ignored: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Skip every validator that has not run yet for this item.
    pub fn skip_all_remaining(&self) {
        self.set_skip_all_remaining(true);
    }

    pub fn set_skip_all_remaining(&self, skip: bool) {
        self.skip_all.store(skip, Ordering::SeqCst);
    }

    pub fn is_skip_all_remaining(&self) -> bool {
        self.skip_all.load(Ordering::SeqCst)
    }

    /// Skip a validator for this item. Accepts a name or a `/regex/` pattern.
    pub fn ignore(&self, validator: impl Into<String>) -> Result<()> {
        let validator = validator.into();
        skip::validate_pattern(&validator)?;
        self.ignored.write().insert(validator);
        Ok(())
    }

    pub fn unignore(&self, validator: &str) -> bool {
        self.ignored.write().remove(validator)
    }

    pub fn clear_ignored(&self) {
        self.ignored.write().clear();
    }

    pub fn ignored(&self) -> BTreeSet<String> {
        self.ignored.read().clone()
    }

    pub fn ignores(&self, validator_name: &str) -> bool {
        skip::matches_any(self.ignored.read().iter(), validator_name)
    }

    /// Snapshot of the messages reported so far.
    pub fn result(&self) -> ValidationResult<T> {
        self.result.lock().clone()
    }

    pub fn message_count(&self) -> usize {
        self.result.lock().len()
    }

    pub(crate) fn record(&self, message: ValidationMessage) -> bool {
        self.result.lock().push(message)
    }

    pub fn future_validators(&self, ctx: &ValidatorContext<T>) -> Result<BTreeSet<String>> {
        ctx.future_validators(self)
    }

    #[track_caller]
    pub fn report(&self, ctx: &ValidatorContext<T>, severity: Severity, message: impl Into<String>) -> Result<()> {
        ctx.report_with(self, Report::new(severity, message))
    }

    #[track_caller]
    pub fn debug(&self, ctx: &ValidatorContext<T>, message: impl Into<String>) -> Result<()> {
        ctx.report_with(self, Report::new(Severity::Debug, message))
    }

    #[track_caller]
    pub fn info(&self, ctx: &ValidatorContext<T>, message: impl Into<String>) -> Result<()> {
        ctx.report_with(self, Report::new(Severity::Info, message))
    }

    #[track_caller]
    pub fn warning(&self, ctx: &ValidatorContext<T>, message: impl Into<String>) -> Result<()> {
        ctx.report_with(self, Report::new(Severity::Warning, message))
    }

    #[track_caller]
    pub fn error(&self, ctx: &ValidatorContext<T>, message: impl Into<String>) -> Result<()> {
        ctx.report_with(self, Report::new(Severity::Error, message))
    }

    #[track_caller]
    pub fn fatal(&self, ctx: &ValidatorContext<T>, message: impl Into<String>) -> Result<()> {
        ctx.report_with(self, Report::new(Severity::Fatal, message))
    }
}

impl<T: Item + std::fmt::Debug> std::fmt::Debug for DataWrapper<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataWrapper")
            .field("data", &self.data)
            .field("skip_all_remaining", &self.is_skip_all_remaining())
            .field("ignored", &*self.ignored.read())
            .field("messages", &self.message_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_controls() {
        let wrapper = DataWrapper::new("order-1", Uuid::new_v4());
        assert!(!wrapper.is_skip_all_remaining());
        wrapper.skip_all_remaining();
        assert!(wrapper.is_skip_all_remaining());
        wrapper.set_skip_all_remaining(false);
        assert!(!wrapper.is_skip_all_remaining());
    }

    #[test]
    fn test_ignore_names_and_patterns() {
        let wrapper = DataWrapper::new(5u8, Uuid::new_v4());
        wrapper.ignore("pricing").unwrap();
        wrapper.ignore("/audit_.*/").unwrap();
        assert!(wrapper.ignores("pricing"));
        assert!(wrapper.ignores("audit_log"));
        assert!(!wrapper.ignores("stock"));

        assert!(wrapper.ignore("").is_err());
        assert!(wrapper.ignore("/[/").is_err());

        assert!(wrapper.unignore("pricing"));
        assert!(!wrapper.ignores("pricing"));
        wrapper.clear_ignored();
        assert!(wrapper.ignored().is_empty());
    }

    #[test]
    fn test_fresh_result_is_empty() {
        let wrapper = DataWrapper::new("x".to_string(), Uuid::new_v4());
        assert_eq!(wrapper.message_count(), 0);
        let result = wrapper.result();
        assert_eq!(result.item(), "x");
        assert!(result.is_empty());
    }
}
