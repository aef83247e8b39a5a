//! Per-run configuration

use serde::{Deserialize, Serialize};

use crate::message::Severity;

/// What happens after a validator reports a message at or above the stop severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationMode {
    /// Keep validating everything.
    #[default]
    Sustainable,
    /// Skip the remaining validators for the offending item only.
    ImmediateStopSingleData,
    /// Skip the remaining validators for every item.
    ImmediateStopAllData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub mode: ValidationMode,
    pub stop_severity: Severity,
}

impl RunConfig {
    pub fn new() -> Self {
        Self {
            mode: ValidationMode::Sustainable,
            stop_severity: Severity::Error,
        }
    }

    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_stop_severity(mut self, severity: Severity) -> Self {
        self.stop_severity = severity;
        self
    }

    /// Whether a message of this severity triggers the configured stop policy.
    pub fn stops_on(&self, severity: Severity) -> bool {
        self.mode != ValidationMode::Sustainable && severity >= self.stop_severity
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new()
    }
}
