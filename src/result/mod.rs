//! Per-item results and their query helpers

pub mod record;

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use crate::message::{Severity, ValidationMessage};

pub use record::{ValidationRecord, ValidationReport};

/// Every message collected for one item during a run.
///
/// Messages are kept in arrival order; a message equal to one already present
/// is not stored twice.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult<T> {
    item: T,
    messages: Vec<ValidationMessage>,
    /// Message hash to positions in `messages` with that hash.
    #[serde(skip)]
    seen: HashMap<u64, Vec<usize>>,
}

impl<T> ValidationResult<T> {
    pub fn new(item: T) -> Self {
        Self {
            item,
            messages: Vec::new(),
            seen: HashMap::new(),
        }
    }

    pub fn item(&self) -> &T {
        &self.item
    }

    pub fn messages(&self) -> &[ValidationMessage] {
        &self.messages
    }

    /// Returns false when an equal message was already present.
    pub fn push(&mut self, message: ValidationMessage) -> bool {
        let mut hasher = DefaultHasher::new();
        message.hash(&mut hasher);
        let slots = self.seen.entry(hasher.finish()).or_default();
        if slots.iter().any(|&index| self.messages[index] == message) {
            return false;
        }
        slots.push(self.messages.len());
        self.messages.push(message);
        true
    }

    /// Union another result's messages into this one.
    pub fn merge(&mut self, other: ValidationResult<T>) {
        for message in other.messages {
            self.push(message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.messages.iter().map(ValidationMessage::severity).max()
    }

    pub fn contains_message(&self, text: &str) -> bool {
        self.messages.iter().any(|m| m.message() == text)
    }

    pub fn contains_message_segment(&self, segment: &str) -> bool {
        self.messages.iter().any(|m| m.message().contains(segment))
    }

    /// Whether any message text fully matches `pattern`.
    pub fn contains_message_regex(&self, pattern: &Regex) -> bool {
        self.messages.iter().any(|m| full_match(pattern, m.message()))
    }

    pub fn contains_code(&self, code: &str) -> bool {
        self.messages.iter().any(|m| m.code() == Some(code))
    }

    pub fn contains_severity(&self, severity: Severity) -> bool {
        self.messages.iter().any(|m| m.severity() == severity)
    }

    pub fn contains_validator_name(&self, name: &str) -> bool {
        self.messages.iter().any(|m| m.validator_name() == name)
    }

    pub fn contains_validator_name_regex(&self, pattern: &Regex) -> bool {
        self.messages
            .iter()
            .any(|m| full_match(pattern, m.validator_name()))
    }

    pub fn contains_validator_id(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.validator_id().as_str() == id)
    }

    pub fn find_message(&self, text: &str) -> Option<&ValidationMessage> {
        self.messages.iter().find(|m| m.message() == text)
    }

    pub fn find_messages<'a>(
        &'a self,
        predicate: impl Fn(&ValidationMessage) -> bool + 'a,
    ) -> impl Iterator<Item = &'a ValidationMessage> + 'a {
        self.messages.iter().filter(move |m| predicate(m))
    }

    pub fn first_message(&self) -> Option<&ValidationMessage> {
        self.messages.first()
    }

    /// Start a conditional action on this result.
    pub fn when(&self, predicate: impl FnOnce(&Self) -> bool) -> ResultCondition<'_, T> {
        let holds = predicate(self);
        ResultCondition {
            result: self,
            holds,
        }
    }
}

fn full_match(pattern: &Regex, text: &str) -> bool {
    pattern
        .find(text)
        .is_some_and(|m| m.start() == 0 && m.end() == text.len())
}

/// The outcome of [`ValidationResult::when`].
pub struct ResultCondition<'a, T> {
    result: &'a ValidationResult<T>,
    holds: bool,
}

impl<'a, T> ResultCondition<'a, T> {
    pub fn holds(&self) -> bool {
        self.holds
    }

    pub fn then(self, action: impl FnOnce(&'a ValidationResult<T>)) -> Self {
        if self.holds {
            action(self.result);
        }
        self
    }

    pub fn then_return<R>(self, op: impl FnOnce(&'a ValidationResult<T>) -> R) -> Option<R> {
        self.holds.then(|| op(self.result))
    }

    pub fn then_return_or<R>(self, op: impl FnOnce(&'a ValidationResult<T>) -> R, default: R) -> R {
        if self.holds { op(self.result) } else { default }
    }

    pub fn then_fail<E>(self, make_error: impl FnOnce(&'a ValidationResult<T>) -> E) -> Result<(), E> {
        if self.holds {
            Err(make_error(self.result))
        } else {
            Ok(())
        }
    }
}
