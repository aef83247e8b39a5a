//! Values shared between validators through the run context store

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, ValidationError};

type Generator<V> = Arc<dyn Fn() -> anyhow::Result<V> + Send + Sync>;

/// A value that is either fixed up front or produced by a generator.
///
/// Clones share the same cached value.
pub struct DataProvider<V> {
    inner: Arc<Inner<V>>,
}

struct Inner<V> {
    generator: Option<Generator<V>>,
    cache: bool,
    slot: Mutex<Option<Arc<V>>>,
}

impl<V: Send + Sync + 'static> DataProvider<V> {
    pub fn immediate(value: V) -> Self {
        Self {
            inner: Arc::new(Inner {
                generator: None,
                cache: true,
                slot: Mutex::new(Some(Arc::new(value))),
            }),
        }
    }

    /// A provider backed by `generator`.
    ///
    /// With `cache` the first generated value is kept until [`reset`](Self::reset);
    /// without it every `get` generates anew. `generate_now` runs the
    /// generator before returning.
    pub fn factory<F>(generator: F, cache: bool, generate_now: bool) -> Result<Self>
    where
        F: Fn() -> anyhow::Result<V> + Send + Sync + 'static,
    {
        let provider = Self {
            inner: Arc::new(Inner {
                generator: Some(Arc::new(generator)),
                cache,
                slot: Mutex::new(None),
            }),
        };
        if generate_now {
            provider.get()?;
        }
        Ok(provider)
    }

    /// Cached, generated on first access.
    pub fn lazy<F>(generator: F) -> Self
    where
        F: Fn() -> anyhow::Result<V> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                generator: Some(Arc::new(generator)),
                cache: true,
                slot: Mutex::new(None),
            }),
        }
    }

    /// The current value, generating it when needed.
    ///
    /// Uncached generators run without holding any lock, so they may run
    /// concurrently and may read this provider. A cached generator runs under
    /// the slot lock so it runs once; it must not read its own provider.
    pub fn get(&self) -> Result<Arc<V>> {
        let Some(generator) = &self.inner.generator else {
            return self.inner.slot.lock().clone().ok_or_else(|| ValidationError::DataProvider {
                source: anyhow::anyhow!("provider has no value and no generator"),
            });
        };
        if !self.inner.cache {
            return generate(generator).map(Arc::new);
        }

        let mut slot = self.inner.slot.lock();
        if let Some(value) = slot.as_ref() {
            return Ok(Arc::clone(value));
        }
        let value = Arc::new(generate(generator)?);
        *slot = Some(Arc::clone(&value));
        Ok(value)
    }

    /// Forget a generated value. Immediate values are kept.
    pub fn reset(&self) {
        if self.inner.generator.is_some() {
            *self.inner.slot.lock() = None;
        }
    }

    pub fn is_generated(&self) -> bool {
        self.inner.slot.lock().is_some()
    }
}

fn generate<V>(generator: &Generator<V>) -> Result<V> {
    generator().map_err(|source| ValidationError::DataProvider { source })
}

impl<V> Clone for DataProvider<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for DataProvider<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataProvider")
            .field("generated", &self.inner.generator.is_some())
            .field("cache", &self.inner.cache)
            .finish()
    }
}
