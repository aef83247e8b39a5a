//! The pluggable validator contract and validator references

pub mod cache;

use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

use crate::context::ValidatorContext;
use crate::data_wrapper::DataWrapper;
use crate::error::Result;

pub use cache::ValidatorCache;

/// Bounds every validated item satisfies. Items are compared and hashed to
/// collapse duplicates and key the result map.
pub trait Item: Eq + std::hash::Hash + Clone + Send + Sync + 'static {}

impl<T> Item for T where T: Eq + std::hash::Hash + Clone + Send + Sync + 'static {}

/// A unit of validation logic.
///
/// Implementations receive every item that is still eligible at this point of
/// the graph and report messages against individual items through `ctx`.
/// Call [`ValidatorContext::check_cancellation`] at convenient points and
/// propagate its error with `?`.
pub trait Validator<T: Item>: Send + Sync + 'static {
    fn validate(&self, batch: &[&DataWrapper<T>], ctx: &ValidatorContext<T>) -> anyhow::Result<()> {
        let _ = (batch, ctx);
        Ok(())
    }
}

/// A validator that can be constructed without arguments and carries its own id.
pub trait ValidatorUnit<T: Item>: Validator<T> + Default {
    const ID: &'static str;
}

/// Stable identifier of a validator implementation; the cache key for its
/// shared instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValidatorId(Arc<str>);

impl ValidatorId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ValidatorId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl From<&str> for ValidatorId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A closure run as a validator; see [`ValidatorRef::from_fn`].
pub struct FnValidator<F>(pub F);

impl<T, F> Validator<T> for FnValidator<F>
where
    T: Item,
    F: Fn(&[&DataWrapper<T>], &ValidatorContext<T>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn validate(&self, batch: &[&DataWrapper<T>], ctx: &ValidatorContext<T>) -> anyhow::Result<()> {
        (self.0)(batch, ctx)
    }
}

type Factory<T> = Arc<dyn Fn() -> Arc<dyn Validator<T>> + Send + Sync>;

/// What a leaf node runs: a validator id plus a way to build the instance the
/// first time it is needed.
pub struct ValidatorRef<T: Item> {
    id: ValidatorId,
    factory: Factory<T>,
}

impl<T: Item> ValidatorRef<T> {
    pub fn of<V: ValidatorUnit<T>>() -> Self {
        Self::new(V::ID, V::default)
    }

    pub fn new<V, F>(id: impl AsRef<str>, factory: F) -> Self
    where
        V: Validator<T>,
        F: Fn() -> V + Send + Sync + 'static,
    {
        Self {
            id: ValidatorId::new(id),
            factory: Arc::new(move || Arc::new(factory()) as Arc<dyn Validator<T>>),
        }
    }

    /// Run a closure as the validator. The closure is cloned into each
    /// fresh instance.
    pub fn from_fn<F>(id: impl AsRef<str>, validate: F) -> Self
    where
        F: Fn(&[&DataWrapper<T>], &ValidatorContext<T>) -> anyhow::Result<()>
            + Clone
            + Send
            + Sync
            + 'static,
    {
        Self::new(id, move || FnValidator(validate.clone()))
    }

    pub fn id(&self) -> &ValidatorId {
        &self.id
    }

    /// The shared instance for this id, constructing it on first use.
    pub fn instance(&self) -> Result<Arc<dyn Validator<T>>> {
        ValidatorCache::global().get_or_create(&self.id, || (self.factory)())
    }
}

impl<T: Item> Clone for ValidatorRef<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<T: Item> fmt::Debug for ValidatorRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValidatorRef").field(&self.id).finish()
    }
}
