#![allow(dead_code)]

use valchain::{DataWrapper, Validation, ValidatorContext, ValidatorRef};

pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("valchain=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_test_writer()
        .try_init();
}

/// A single-node validation running `validate` under a unique validator id.
pub fn node<F>(name: &str, validate: F) -> Validation<u32>
where
    F: Fn(&[&DataWrapper<u32>], &ValidatorContext<u32>) -> anyhow::Result<()>
        + Clone
        + Send
        + Sync
        + 'static,
{
    let id = format!("it.{name}.{}", uuid::Uuid::new_v4());
    Validation::create_with(name, ValidatorRef::from_fn(id, validate))
}

/// Reports one INFO message per item, naming the validator.
pub fn flag_all(name: &str) -> Validation<u32> {
    let label = name.to_string();
    node(name, move |batch, ctx| {
        for item in batch {
            ctx.info(item, format!("{label} saw {}", item.data()))?;
        }
        Ok(())
    })
}

/// Reports a WARNING for `target` only.
pub fn flag_one(name: &str, target: u32) -> Validation<u32> {
    let label = name.to_string();
    node(name, move |batch, ctx| {
        for item in batch.iter().filter(|item| *item.data() == target) {
            ctx.warning(item, format!("{label} flagged {target}"))?;
        }
        Ok(())
    })
}
