mod common;

use common::{flag_all, init_logging, node};
use std::sync::{Arc, Barrier};
use valchain::{ThreadSpawner, Validation, ValidationError, ValidationManager};

/// Branch A cancels its siblings, then lets B continue. B checks right away
/// and must not get to report. C never checks and finishes normally.
#[test]
fn test_cancel_other_parallel_validators() {
    init_logging();
    let barrier = Arc::new(Barrier::new(2));

    let gate = Arc::clone(&barrier);
    let branch_a = node("branch_a", move |batch, ctx| {
        if let Some(item) = batch.iter().find(|item| *item.data() == 2) {
            ctx.error(item, "duplicate order")?;
            ctx.cancel_other_parallel_validators()?;
        }
        gate.wait();
        Ok(())
    });

    let gate = Arc::clone(&barrier);
    let branch_b = node("branch_b", move |batch, ctx| {
        gate.wait();
        ctx.check_cancellation()?;
        for item in batch {
            ctx.warning(item, "should never be reported")?;
        }
        Ok(())
    });

    let manager = ValidationManager::new();
    manager.register(
        "orders",
        Validation::create_parallel(vec![branch_a, branch_b, flag_all("branch_c")]).unwrap(),
    );

    let report = manager
        .validate_with("orders", [1, 2, 3], &Arc::new(ThreadSpawner::new()))
        .unwrap();

    assert!(!report.messages().any(|m| m.validator_name() == "branch_b"));
    for item in [1, 2, 3] {
        assert!(report.result(&item).unwrap().contains_validator_name("branch_c"));
    }
    assert!(report.result(&2).unwrap().contains_message("duplicate order"));

    let cancelled: Vec<_> = report
        .records()
        .iter()
        .filter(|record| record.cancelled)
        .map(|record| record.validator_name.as_str())
        .collect();
    assert_eq!(cancelled, vec!["branch_b"]);
}

#[test]
fn test_cancellation_does_not_leak_out_of_the_container() {
    let barrier = Arc::new(Barrier::new(2));
    let gate = Arc::clone(&barrier);
    let canceller = node("canceller", move |_, ctx| {
        ctx.cancel_other_parallel_validators()?;
        gate.wait();
        Ok(())
    });
    let gate = Arc::clone(&barrier);
    let victim = node("victim", move |_, ctx| {
        gate.wait();
        ctx.check_cancellation()?;
        Ok(())
    });
    let validation = Validation::create_parallel(vec![canceller, victim])
        .unwrap()
        .then_serial(flag_all("after"))
        .unwrap();

    let manager = ValidationManager::new();
    manager.register("orders", validation);
    let report = manager
        .validate_with("orders", [1], &Arc::new(ThreadSpawner::new()))
        .unwrap();
    assert!(report.result(&1).unwrap().contains_validator_name("after"));
}

#[test]
fn test_swallowed_cancellation_is_an_error() {
    let barrier = Arc::new(Barrier::new(2));
    let gate = Arc::clone(&barrier);
    let canceller = node("canceller", move |_, ctx| {
        ctx.cancel_other_parallel_validators()?;
        gate.wait();
        Ok(())
    });
    let gate = Arc::clone(&barrier);
    let swallower = node("swallower", move |_, ctx| {
        gate.wait();
        let _ = ctx.check_cancellation();
        Ok(())
    });

    let manager = ValidationManager::new();
    manager.register(
        "orders",
        Validation::create_parallel(vec![canceller, swallower]).unwrap(),
    );
    let err = manager
        .validate_with("orders", [1], &Arc::new(ThreadSpawner::new()))
        .unwrap_err();
    assert!(matches!(
        err,
        ValidationError::CancellationSwallowed { ref node, .. } if node == "swallower"
    ));
}

#[test]
fn test_cancellation_wrapped_in_context_is_still_absorbed() {
    let barrier = Arc::new(Barrier::new(2));
    let gate = Arc::clone(&barrier);
    let canceller = node("canceller", move |_, ctx| {
        ctx.cancel_other_parallel_validators()?;
        gate.wait();
        Ok(())
    });
    let gate = Arc::clone(&barrier);
    let wrapped = node("wrapped", move |_, ctx| {
        use anyhow::Context;
        gate.wait();
        ctx.check_cancellation().context("checking stock levels")?;
        Ok(())
    });

    let manager = ValidationManager::new();
    manager.register(
        "orders",
        Validation::create_parallel(vec![canceller, wrapped]).unwrap(),
    );
    let report = manager
        .validate_with("orders", [1], &Arc::new(ThreadSpawner::new()))
        .unwrap();
    assert!(report.records().iter().any(|r| r.validator_name == "wrapped" && r.cancelled));
}
