use super::*;
use crate::validator::Validator;
use std::collections::BTreeSet;

struct Noop;

impl Validator<u32> for Noop {}

fn leaf(name: &str) -> Validation<u32> {
    Validation::create_with(name, ValidatorRef::new(format!("graph_tests.{name}"), || Noop))
}

fn chain(names: &[&str]) -> Validation<u32> {
    let mut validation = Validation::empty();
    for name in names {
        validation.append_serial(leaf(name)).unwrap();
    }
    validation
}

/// Walk the graph from the root and check every structural invariant.
fn assert_consistent(validation: &Validation<u32>) {
    let mut reachable_leaves = BTreeSet::new();
    let mut stack: Vec<(NodeId, Option<NodeId>)> =
        validation.root.into_iter().map(|id| (id, None)).collect();

    if let Some(root) = validation.root {
        assert!(validation.nodes[root.0].prev.is_none());
        let mut last = root;
        while let Some(next) = validation.nodes[last.0].next {
            last = next;
        }
        assert_eq!(validation.tail, Some(last));
    } else {
        assert!(validation.tail.is_none());
    }

    while let Some((id, container)) = stack.pop() {
        let node = &validation.nodes[id.0];
        assert!(node.live, "reached retired node {id:?}");
        assert_eq!(node.container, container, "bad container of {}", node.name);
        if let Some(next) = node.next {
            assert_eq!(validation.nodes[next.0].prev, Some(id));
            stack.push((next, container));
        }
        match &node.kind {
            NodeKind::Leaf(_) => {
                assert!(reachable_leaves.insert(node.name.clone()));
                assert_eq!(validation.index.get(&node.name), Some(&id));
            }
            NodeKind::Parallel(branches) => {
                assert!(branches.len() >= 2, "container with {} branches", branches.len());
                for head in branches {
                    assert!(validation.nodes[head.0].prev.is_none());
                    stack.push((*head, Some(id)));
                }
            }
        }
    }

    let indexed: BTreeSet<String> = validation.index.keys().cloned().collect();
    assert_eq!(indexed, reachable_leaves);
}

#[test]
fn test_single_validator_roadmap() {
    let validation = leaf("amount");
    assert_consistent(&validation);
    insta::assert_snapshot!(validation.roadmap(), @r"
START
--> amount: graph_tests.amount
END
");
}

#[test]
fn test_empty_validation() {
    let validation = Validation::<u32>::empty();
    assert!(validation.is_empty());
    assert_eq!(validation.len(), 0);
    assert_eq!(validation.roadmap(), "START\nEND");
    assert_consistent(&validation);
}

#[test]
fn test_serial_order() {
    let validation = chain(&["a", "b", "c"]);
    assert_eq!(validation.names(), vec!["a", "b", "c"]);
    assert_consistent(&validation);
}

#[test]
fn test_nested_roadmap() {
    let validation = leaf("amount")
        .then_parallel(vec![
            chain(&["stock", "reserve"]),
            leaf("pricing")
                .then_parallel(vec![leaf("tax"), leaf("discount")])
                .unwrap(),
        ])
        .unwrap()
        .then_serial(leaf("ship"))
        .unwrap();
    assert_consistent(&validation);
    assert_eq!(
        validation.names(),
        vec!["amount", "stock", "reserve", "pricing", "tax", "discount", "ship"]
    );
    insta::assert_snapshot!(validation.roadmap(), @r"
START
--> amount: graph_tests.amount
--> PARALLEL
    |--- stock: graph_tests.stock
    |    --> reserve: graph_tests.reserve
    |--- pricing: graph_tests.pricing
    |    --> PARALLEL
    |        |--- tax: graph_tests.tax
    |        |--- discount: graph_tests.discount
--> ship: graph_tests.ship
END
");
}

#[test]
fn test_duplicate_names_are_rejected_without_change() {
    let mut validation = chain(&["a", "b"]);
    let before = validation.roadmap();

    let err = validation.append_serial(chain(&["c", "b"])).unwrap_err();
    assert!(matches!(err, ValidationError::DuplicateValidator { ref name } if name == "b"));
    assert_eq!(validation.roadmap(), before);

    let err = validation
        .append_parallel(vec![leaf("x"), chain(&["y", "x"])])
        .unwrap_err();
    assert!(matches!(err, ValidationError::DuplicateValidator { ref name } if name == "x"));
    assert_eq!(validation.roadmap(), before);
    assert_consistent(&validation);
}

#[test]
fn test_duplicate_inside_nested_branch_is_rejected() {
    let mut validation = leaf("a")
        .then_parallel(vec![leaf("b"), leaf("c")])
        .unwrap();
    let err = validation.insert_serial_first(leaf("c")).unwrap_err();
    assert!(matches!(err, ValidationError::DuplicateValidator { .. }));
}

#[test]
fn test_unknown_anchor_leaves_graph_unchanged() {
    let mut validation = chain(&["a", "b"]);
    let err = validation.insert_serial_after("missing", leaf("c")).unwrap_err();
    assert!(matches!(err, ValidationError::NoSuchValidator { ref name } if name == "missing"));
    assert_eq!(validation.names(), vec!["a", "b"]);

    assert!(validation.remove("missing").is_err());
    assert!(validation.disable("missing").is_err());
    assert!(validation.enable("missing").is_err());
    assert!(validation.is_enabled("missing").is_err());
}

#[test]
fn test_parallel_of_one_is_serial() {
    let mut validation = leaf("a");
    validation.append_parallel(vec![leaf("b")]).unwrap();
    assert!(!validation.has_parallel());
    assert_eq!(validation.names(), vec!["a", "b"]);
    assert_consistent(&validation);
}

#[test]
fn test_empty_parallel_group_is_an_error() {
    let mut validation = leaf("a");
    assert!(matches!(
        validation.append_parallel(Vec::new()),
        Err(ValidationError::EmptyParallelGroup)
    ));
}

#[test]
fn test_insert_positions_top_level() {
    let mut validation = chain(&["b", "d"]);
    validation.insert_serial_first(leaf("a")).unwrap();
    validation.insert_serial_before("d", leaf("c")).unwrap();
    validation.insert_serial_after("d", leaf("e")).unwrap();
    validation.insert_serial_last(leaf("f")).unwrap();
    assert_eq!(validation.names(), vec!["a", "b", "c", "d", "e", "f"]);
    assert_eq!(validation.tail(), validation.id_of("f"));
    assert_consistent(&validation);
}

#[test]
fn test_insert_inside_branch_updates_branch_head() {
    let mut validation = Validation::create_parallel(vec![leaf("a"), leaf("b")]).unwrap();
    validation.insert_serial_before("a", leaf("a0")).unwrap();
    validation.insert_serial_after("b", leaf("b1")).unwrap();
    assert_consistent(&validation);

    let container = validation.root().unwrap();
    let branches = validation.get(container).unwrap().branches().to_vec();
    assert_eq!(branches, vec![validation.id_of("a0").unwrap(), validation.id_of("b").unwrap()]);
    assert_eq!(validation.node("b1").unwrap().container(), Some(container));
    assert_eq!(validation.names(), vec!["a0", "a", "b", "b1"]);
}

#[test]
fn test_insert_parallel_before_and_after() {
    let mut validation = chain(&["a", "z"]);
    validation
        .insert_parallel_after("a", vec![leaf("p"), leaf("q")])
        .unwrap();
    validation
        .insert_parallel_before("p", vec![leaf("m"), leaf("n")])
        .unwrap();
    validation
        .insert_parallel_first(vec![leaf("f1"), leaf("f2")])
        .unwrap();
    validation
        .insert_parallel_last(vec![leaf("l1"), leaf("l2"), leaf("l3")])
        .unwrap();
    assert_consistent(&validation);
    insta::assert_snapshot!(validation.roadmap(), @r"
START
--> PARALLEL
    |--- f1: graph_tests.f1
    |--- f2: graph_tests.f2
--> a: graph_tests.a
--> PARALLEL
    |--- PARALLEL
    |    |--- m: graph_tests.m
    |    |--- n: graph_tests.n
    |    --> p: graph_tests.p
    |--- q: graph_tests.q
--> z: graph_tests.z
--> PARALLEL
    |--- l1: graph_tests.l1
    |--- l2: graph_tests.l2
    |--- l3: graph_tests.l3
END
");
}

#[test]
fn test_remove_branch_then_collapse() {
    let mut validation = leaf("start")
        .then_parallel(vec![leaf("a"), leaf("b"), leaf("c")])
        .unwrap()
        .then_serial(leaf("end"))
        .unwrap();

    validation.remove("b").unwrap();
    assert_consistent(&validation);
    assert!(validation.has_parallel());
    assert_eq!(validation.names(), vec!["start", "a", "c", "end"]);

    validation.remove("c").unwrap();
    assert_consistent(&validation);
    assert!(!validation.has_parallel());
    assert!(!validation.roadmap().contains("PARALLEL"));
    insta::assert_snapshot!(validation.roadmap(), @r"
START
--> start: graph_tests.start
--> a: graph_tests.a
--> end: graph_tests.end
END
");
}

#[test]
fn test_collapse_promotes_branch_into_outer_container() {
    let mut validation = Validation::create_parallel(vec![
        leaf("x"),
        chain(&["y0"])
            .then_parallel(vec![chain(&["p", "p2"]), leaf("q")])
            .unwrap(),
    ])
    .unwrap();

    validation.remove("q").unwrap();
    assert_consistent(&validation);
    let outer = validation.root().unwrap();
    assert_eq!(validation.node("p").unwrap().container(), Some(outer));
    assert_eq!(validation.node("p2").unwrap().container(), Some(outer));
    assert_eq!(validation.names(), vec!["x", "y0", "p", "p2"]);
}

#[test]
fn test_remove_branch_head_keeps_rest_of_branch() {
    let mut validation = Validation::create_parallel(vec![chain(&["a", "a2"]), leaf("b")]).unwrap();
    validation.remove("a").unwrap();
    assert_consistent(&validation);

    let container = validation.root().unwrap();
    assert_eq!(
        validation.get(container).unwrap().branches(),
        &[validation.id_of("a2").unwrap(), validation.id_of("b").unwrap()]
    );
}

#[test]
fn test_remove_everything() {
    let mut validation = Validation::create_parallel(vec![leaf("a"), leaf("b")]).unwrap();
    validation.remove("a").unwrap().remove("b").unwrap();
    assert!(validation.is_empty());
    assert_eq!(validation.roadmap(), "START\nEND");
    assert_consistent(&validation);

    validation.append_serial(leaf("a")).unwrap();
    assert_eq!(validation.names(), vec!["a"]);
    assert_consistent(&validation);
}

#[test]
fn test_disable_enable() {
    let mut validation = chain(&["a", "b"]);
    validation.disable("b").unwrap();
    assert!(!validation.is_enabled("b").unwrap());
    assert!(validation.roadmap().contains("b: graph_tests.b [DISABLED]"));

    validation.enable("b").unwrap();
    assert!(validation.is_enabled("b").unwrap());
    assert!(!validation.roadmap().contains("[DISABLED]"));
}

#[test]
fn test_update_validator_swaps_reference() {
    let mut validation = chain(&["a"]);
    validation
        .update_validator_with("a", ValidatorRef::new("graph_tests.replacement", || Noop))
        .unwrap();
    assert_eq!(
        validation.node("a").unwrap().validator().unwrap().id().as_str(),
        "graph_tests.replacement"
    );
}

#[test]
fn test_future_validators_serial() {
    let mut validation = chain(&["v1", "v2", "v3", "v4", "v5"]);
    let from = validation.id_of("v2").unwrap();
    assert_eq!(validation.future_validators(from), vec!["v3", "v4", "v5"]);

    validation.disable("v4").unwrap();
    let from = validation.id_of("v2").unwrap();
    assert_eq!(validation.future_validators(from), vec!["v3", "v5"]);
}

#[test]
fn test_future_validators_from_branch() {
    let validation = leaf("first")
        .then_parallel(vec![
            chain(&["a1", "a2"]),
            chain(&["b1"]).then_parallel(vec![leaf("c"), leaf("d")]).unwrap(),
        ])
        .unwrap()
        .then_serial(leaf("last"))
        .unwrap();

    let from_a1 = validation.id_of("a1").unwrap();
    let mut future = validation.future_validators(from_a1);
    future.sort();
    assert_eq!(future, vec!["a2", "b1", "c", "d", "last"]);

    let from_c = validation.id_of("c").unwrap();
    let mut future = validation.future_validators(from_c);
    future.sort();
    assert_eq!(future, vec!["a1", "a2", "d", "last"]);
}

#[test]
fn test_clone_is_independent() {
    let original = chain(&["a", "b"]);
    let mut copy = original.clone();
    copy.remove("a").unwrap();
    assert_eq!(original.names(), vec!["a", "b"]);
    assert_eq!(copy.names(), vec!["b"]);
}
