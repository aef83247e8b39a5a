//! Messages reported by validators

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use uuid::Uuid;

use crate::validator::ValidatorId;

/// How serious a reported message is.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    #[default]
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        };
        f.write_str(label)
    }
}

/// Source position of the `report` call that produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ReportLocation {
    pub file: &'static str,
    pub line: u32,
}

impl From<&'static Location<'static>> for ReportLocation {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
        }
    }
}

impl fmt::Display for ReportLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A message as it is handed to a validator context before provenance is attached.
///
/// `Report::new` and the severity constructors capture the caller's source
/// location, so build the report at the place you want it attributed to.
#[derive(Debug, Clone)]
pub struct Report {
    pub(crate) severity: Severity,
    pub(crate) message: String,
    pub(crate) code: Option<String>,
    pub(crate) field: Option<String>,
    pub(crate) cause: Option<String>,
    pub(crate) extra: Option<serde_json::Value>,
    pub(crate) location: ReportLocation,
}

impl Report {
    #[track_caller]
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            code: None,
            field: None,
            cause: None,
            extra: None,
            location: Location::caller().into(),
        }
    }

    #[track_caller]
    pub fn debug(message: impl Into<String>) -> Self {
        Self::new(Severity::Debug, message)
    }

    #[track_caller]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    #[track_caller]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    #[track_caller]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    #[track_caller]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, message)
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Attach the error that led to this message. Only its rendered chain is kept.
    pub fn cause(mut self, cause: &(dyn std::error::Error + 'static)) -> Self {
        let mut rendered = cause.to_string();
        let mut source = cause.source();
        while let Some(inner) = source {
            rendered.push_str(": ");
            rendered.push_str(&inner.to_string());
            source = inner.source();
        }
        self.cause = Some(rendered);
        self
    }

    pub fn extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }
}

/// Provenance attached by the engine when a report is accepted.
#[derive(Debug, Clone)]
pub(crate) struct Provenance {
    pub run_id: Uuid,
    pub validation_name: String,
    pub validator_name: String,
    pub validator_id: ValidatorId,
}

/// An immutable message in a validation result.
///
/// Two messages are equal when severity, text, validation, validator name,
/// validator id and report location agree. Timestamps and threads are
/// ignored so repeated reports from the same place collapse.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationMessage {
    severity: Severity,
    message: String,
    code: Option<String>,
    field: Option<String>,
    cause: Option<String>,
    extra: Option<serde_json::Value>,
    run_id: Uuid,
    validation_name: String,
    validator_name: String,
    validator_id: ValidatorId,
    location: ReportLocation,
    thread_name: Option<String>,
    reported_at: DateTime<Utc>,
}

impl ValidationMessage {
    pub(crate) fn from_report(report: Report, provenance: Provenance) -> Self {
        Self {
            severity: report.severity,
            message: report.message,
            code: report.code,
            field: report.field,
            cause: report.cause,
            extra: report.extra,
            run_id: provenance.run_id,
            validation_name: provenance.validation_name,
            validator_name: provenance.validator_name,
            validator_id: provenance.validator_id,
            location: report.location,
            thread_name: std::thread::current().name().map(str::to_string),
            reported_at: Utc::now(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }

    pub fn extra(&self) -> Option<&serde_json::Value> {
        self.extra.as_ref()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn validation_name(&self) -> &str {
        &self.validation_name
    }

    /// Name of the graph node that reported this message.
    pub fn validator_name(&self) -> &str {
        &self.validator_name
    }

    pub fn validator_id(&self) -> &ValidatorId {
        &self.validator_id
    }

    pub fn location(&self) -> ReportLocation {
        self.location
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    pub fn reported_at(&self) -> DateTime<Utc> {
        self.reported_at
    }
}

impl PartialEq for ValidationMessage {
    fn eq(&self, other: &Self) -> bool {
        self.severity == other.severity
            && self.message == other.message
            && self.validation_name == other.validation_name
            && self.validator_name == other.validator_name
            && self.validator_id == other.validator_id
            && self.location == other.location
    }
}

impl Eq for ValidationMessage {}

impl Hash for ValidationMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.severity.hash(state);
        self.message.hash(state);
        self.validation_name.hash(state);
        self.validator_name.hash(state);
        self.validator_id.hash(state);
        self.location.hash(state);
    }
}

impl fmt::Display for ValidationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.validator_name, self.message)?;
        if let Some(code) = &self.code {
            write!(f, " ({code})")?;
        }
        Ok(())
    }
}
