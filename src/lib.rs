//! Orchestrates validators over a batch of items.
//!
//! A [`Validation`] is a graph of named validators composed serially or in
//! parallel groups. A [`ValidationManager`] holds validations by name and
//! runs them on the calling thread, on an [`Executor`], or with rayon
//! fork/join, collecting every reported [`ValidationMessage`] per item.

pub mod config;
pub mod context;
pub mod data_wrapper;
pub mod error;
pub mod graph;
pub mod message;
pub mod provider;
pub mod result;
pub mod runtime;
pub mod skip;
pub mod validator;

pub use config::{RunConfig, ValidationMode};
pub use context::{Cancelled, RunContext, ValidatorContext};
pub use data_wrapper::DataWrapper;
pub use error::{Result, ValidationError};
pub use graph::{NodeId, NodeKind, Validation, ValidatorNode};
pub use message::{Report, ReportLocation, Severity, ValidationMessage};
pub use provider::DataProvider;
pub use result::record::{ValidationRecord, ValidationReport};
pub use result::{ResultCondition, ValidationResult};
pub use runtime::{Executor, Substrate, Task, ThreadSpawner, ValidationManager};
pub use validator::{FnValidator, Item, Validator, ValidatorId, ValidatorRef, ValidatorUnit};
