//! Error types for graph editing and validation runs

use miette::Diagnostic;
use thiserror::Error;
use uuid::Uuid;

use crate::validator::ValidatorId;

pub type Result<T, E = ValidationError> = std::result::Result<T, E>;

#[derive(Error, Debug, Diagnostic)]
pub enum ValidationError {
    #[error("No such validator `{name}`")]
    #[diagnostic(
        code(valchain::graph::no_such_validator),
        help("validator names are matched exactly against the names given at creation")
    )]
    NoSuchValidator { name: String },

    #[error("Duplicate validator name `{name}`")]
    #[diagnostic(
        code(valchain::graph::duplicate_validator),
        help("every validator node must have a unique name across the whole validation, including nested branches")
    )]
    DuplicateValidator { name: String },

    #[error("No validation registered under `{name}`")]
    #[diagnostic(code(valchain::registry::no_such_validation))]
    NoSuchValidation { name: String },

    #[error("A parallel group needs at least one validation")]
    #[diagnostic(code(valchain::graph::empty_parallel_group))]
    EmptyParallelGroup,

    #[error("Validation `{name}` contains parallel groups but no executor was supplied")]
    #[diagnostic(
        code(valchain::runtime::missing_executor),
        help("use `validate_with` or `validate_fork_join` for validations with parallel groups")
    )]
    MissingExecutor { name: String },

    #[error("Something went wrong in validator `{node}` ({validator})")]
    #[diagnostic(code(valchain::runtime::validator_failed))]
    ValidatorFailed {
        node: String,
        validator: ValidatorId,
        #[source]
        source: anyhow::Error,
    },

    #[error("Validator `{node}` ({validator}) panicked: {message}")]
    #[diagnostic(code(valchain::runtime::validator_panicked))]
    ValidatorPanicked {
        node: String,
        validator: ValidatorId,
        message: String,
    },

    #[error(
        "Validator `{node}` ({validator}) observed a cancellation request but did not return the cancellation signal"
    )]
    #[diagnostic(
        code(valchain::runtime::cancellation_swallowed),
        help("propagate the result of `check_cancellation()` with `?` instead of handling it yourself")
    )]
    CancellationSwallowed { node: String, validator: ValidatorId },

    #[error("A parallel branch of `{validation}` ended without reporting back")]
    #[diagnostic(
        code(valchain::runtime::branch_lost),
        help("the executor dropped a task without running it")
    )]
    BranchLost { validation: String },

    #[error("Not in a validation run")]
    #[diagnostic(
        code(valchain::context::not_in_run),
        help("validator contexts are only usable while the validator invocation is in progress")
    )]
    NotInValidationRun,

    #[error("Item does not belong to validation run {run}")]
    #[diagnostic(code(valchain::context::item_not_in_run))]
    ItemNotInRun { run: Uuid },

    #[error("Validation messages must not be empty")]
    #[diagnostic(code(valchain::context::empty_message))]
    EmptyMessage,

    #[error("Validator name must not be empty")]
    #[diagnostic(code(valchain::context::empty_validator_name))]
    EmptyValidatorName,

    #[error("Invalid ignore pattern `{pattern}`")]
    #[diagnostic(
        code(valchain::skip::invalid_pattern),
        help("patterns wrapped in slashes are regular expressions, e.g. `/audit_.*/`")
    )]
    InvalidIgnorePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Validator `{id}` is already cached for a different item type")]
    #[diagnostic(code(valchain::validator::type_mismatch))]
    ValidatorTypeMismatch { id: ValidatorId },

    #[error("Stored value `{key}` has a different type than requested")]
    #[diagnostic(code(valchain::context::store_type_mismatch))]
    StoreTypeMismatch { key: String },

    #[error("Data provider failed to generate a value")]
    #[diagnostic(code(valchain::provider::failed))]
    DataProvider {
        #[source]
        source: anyhow::Error,
    },
}
