use statecraft::{Context, ResourceGraph, Signal};
use statecraft_test_utils::{EventLog, FakeResource, init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// `x -> y` inside a graph of its own.
fn pair(log: &EventLog, prefix: &str) -> ResourceGraph {
    let mut rg = ResourceGraph::new();
    let x = rg.register("x", FakeResource::new(format!("{prefix}.x"), log));
    rg.when(x, &[Signal::Materialized])
        .do_("y", FakeResource::new(format!("{prefix}.y"), log));
    rg
}

#[test]
fn flattening_keeps_members_and_edges() {
    let log = EventLog::new();
    let inner = pair(&log, "inner");
    let before: Vec<_> = inner.resources().collect();
    let (x, y) = (before[0], before[1]);

    let mut outer = ResourceGraph::new();
    let extra = outer.register("extra", FakeResource::new("extra", &log));
    let group = outer.register("inner", inner);

    assert_eq!(outer.len(), 3);
    assert_eq!(outer.resources().collect::<Vec<_>>(), vec![extra, x, y]);
    assert_eq!(outer.signals_between(x, y), Some(&[Signal::Materialized][..]));
    assert_eq!(outer.name_of(x), Some("inner·x"));
    assert_eq!(outer.name_of(group), Some("inner"));
    assert!(outer.contains(group));
    assert_eq!(outer.roots(), vec![extra, x]);
    assert_eq!(outer.leaves(), vec![extra, y]);
}

#[test]
fn boxed_graph_is_flattened_too() {
    let log = EventLog::new();
    let inner = pair(&log, "boxed");
    let members: Vec<_> = inner.resources().collect();

    let mut outer = ResourceGraph::new();
    let group = outer.register("boxed", Box::new(inner));

    assert_eq!(outer.len(), 2);
    assert_eq!(outer.resources().collect::<Vec<_>>(), members);
    assert_eq!(outer.name_of(members[0]), Some("boxed·x"));
    assert_eq!(outer.members_of(group), Some(&members[..]));
}

#[test]
fn edge_from_a_graph_lands_on_its_leaves() {
    let log = EventLog::new();
    let mut rg = ResourceGraph::new();
    let first = rg.register("first", pair(&log, "first"));
    let after = rg.when(first, &[]).do_("after", FakeResource::new("after", &log));

    let members = rg.members_of(first).unwrap().to_vec();
    let (x, y) = (members[0], members[1]);
    assert_eq!(rg.dependencies_of(after), vec![y]);
    assert!(rg.signals_between(x, after).is_none());
}

#[test]
fn edge_into_a_graph_lands_on_its_roots() {
    let log = EventLog::new();
    let mut rg = ResourceGraph::new();
    let before = rg.register("before", FakeResource::new("before", &log));
    let second = rg
        .when(before, &[Signal::Evaluated])
        .do_("second", pair(&log, "second"));

    let members = rg.members_of(second).unwrap().to_vec();
    assert_eq!(rg.dependents_of(before), vec![members[0]]);
    assert_eq!(
        rg.signals_between(before, members[0]),
        Some(&[Signal::Evaluated][..])
    );
}

#[test]
fn nested_names_carry_every_prefix() {
    let log = EventLog::new();
    let mut middle = ResourceGraph::new();
    middle.register("inner", pair(&log, "p"));
    let mut outer = ResourceGraph::new();
    outer.register("middle", middle);

    let names: Vec<_> = outer
        .resources()
        .map(|id| outer.name_of(id).unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["middle·inner·x", "middle·inner·y"]);
    assert_eq!(
        outer.to_string(),
        "ResourceGraph{rs:[middle·inner·x middle·inner·y], deps:{middle·inner·x:middle·inner·y}}"
    );
}

#[tokio::test]
async fn flattened_graphs_materialize_in_order() -> TestResult {
    init_tracing();
    let log = EventLog::new();
    let mut rg = ResourceGraph::new();
    let first = rg.register("first", pair(&log, "first"));
    rg.when(first, &[Signal::Evaluated])
        .do_("second", pair(&log, "second"));

    with_timeout(rg.materialize(&Context::background())).await?;

    let pos = |label: &str| log.materialize_index(label).expect(label);
    assert!(pos("first.x") < pos("first.y"));
    assert!(pos("first.y") < pos("second.x"));
    assert!(pos("second.x") < pos("second.y"));

    let names: Vec<_> = log
        .events()
        .into_iter()
        .filter_map(|e| e.context_name)
        .collect();
    assert!(names.contains(&"second·y".to_string()), "{names:?}");
    Ok(())
}

#[tokio::test]
async fn edges_added_after_flattening_use_member_handles() -> TestResult {
    init_tracing();
    let log = EventLog::new();
    let inner = pair(&log, "inner");
    let x = inner.resources().next().unwrap();

    let mut rg = ResourceGraph::new();
    rg.register("inner", inner);
    rg.when(x, &[Signal::Materialized])
        .do_("side", FakeResource::new("side", &log));

    with_timeout(rg.materialize(&Context::background())).await?;

    let pos = |label: &str| log.materialize_index(label).expect(label);
    assert!(pos("inner.x") < pos("side"));
    Ok(())
}
