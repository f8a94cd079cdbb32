//! Integration tests for the adaptive router.
//!
//! These tests drive the full query lifecycle — analyze, placement
//! selection, wrap-up, feedback, refresh — against an in-memory catalog and
//! monitoring service.

use std::sync::Arc;

use polyroute::catalog::{Adapter, AdapterKind, Catalog, CatalogTable, MemoryCatalog};
use polyroute::monitoring::{ExecutionTimeMonitor, InMemoryMonitor};
use polyroute::plan::{LogicalExpr, LogicalPlan, ModifyOp, ScalarValue, TableRef};
use polyroute::{
    AdaptiveRouter, PlacementSet, RouteDecision, Router, RouterConfig, RouterError, Weight,
};

const MS: u64 = 1_000_000;

struct TestEnv {
    catalog: Arc<MemoryCatalog>,
    router: AdaptiveRouter,
    table: CatalogTable,
}

/// Two data stores, both holding a full replica of the `users` table.
fn setup(config: RouterConfig) -> TestEnv {
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.register_adapter(Adapter::new(1, "pg0", AdapterKind::Store));
    catalog.register_adapter(Adapter::new(2, "mongo0", AdapterKind::Store));

    let table = CatalogTable::new(10, "users", vec![100, 101])
        .with_placement(1, vec![100, 101])
        .with_placement(2, vec![100, 101]);
    catalog.register_table(table.clone()).unwrap();

    let config = Arc::new(config);
    let monitoring = Arc::new(InMemoryMonitor::new(config.clone()));
    let router = AdaptiveRouter::with_rng_seed(catalog.clone(), monitoring, config, 7);

    TestEnv {
        catalog,
        router,
        table,
    }
}

fn scan_plan() -> LogicalPlan {
    LogicalPlan::TableScan {
        table: TableRef::new("public", "users"),
    }
}

fn filter_plan(age: i64) -> LogicalPlan {
    LogicalPlan::Filter {
        predicate: LogicalExpr::column("age").eq(LogicalExpr::literal(ScalarValue::Int64(age))),
        input: Arc::new(scan_plan()),
    }
}

fn ps(id: u32) -> PlacementSet {
    PlacementSet::singleton(id)
}

/// Run one query end to end and report its execution time.
fn run_query(env: &TestEnv, plan: &LogicalPlan, nanos: u64) -> RouteDecision {
    let mut decision = env.router.analyze(plan).unwrap();
    env.router
        .select_placement(&mut decision, &env.table)
        .unwrap();
    let monitor = ExecutionTimeMonitor::new();
    env.router.wrap_up(&decision, &monitor);
    monitor.set_execution_time(nanos);
    decision
}

#[test]
fn cold_start_initializes_row_and_explores_first_candidate() {
    let env = setup(RouterConfig::default());

    let decision = run_query(&env, &scan_plan(), 30 * MS);
    let class = decision.query_class().unwrap();
    assert_eq!(decision.selected_placement(), Some(&ps(1)));

    let row = env.router.routing_table().row(class).unwrap();
    assert_eq!(row.get(&ps(1)), Some(Weight::Missing));
    assert_eq!(row.get(&ps(2)), Some(Weight::Missing));
}

#[test]
fn one_sample_each_converges_to_fastest() {
    let env = setup(RouterConfig::default());
    let table = env.router.routing_table();

    // First execution lands on placement [1] and measures 30 ms.
    let decision = run_query(&env, &scan_plan(), 30 * MS);
    let class = decision.query_class().unwrap().clone();
    table.refresh();

    // The unexplored placement [2] goes next and measures 60 ms.
    let decision = run_query(&env, &scan_plan(), 60 * MS);
    assert_eq!(decision.selected_placement(), Some(&ps(2)));
    table.refresh();

    let row = table.row(&class).unwrap();
    assert_eq!(row.get(&ps(1)), Some(Weight::Share(100)));
    assert_eq!(row.get(&ps(2)), Some(Weight::Share(0)));

    // From now on every selection is deterministic.
    for _ in 0..5 {
        let decision = env.router.analyze(&scan_plan()).unwrap();
        assert_eq!(decision.selected_placement(), Some(&ps(1)));
    }
}

#[test]
fn similarity_band_splits_weights_and_selection_follows_them() {
    let env = setup(RouterConfig::new().with_short_running_similar_threshold(150));
    let table = env.router.routing_table();

    let decision = run_query(&env, &scan_plan(), 30 * MS);
    let class = decision.query_class().unwrap().clone();
    table.refresh();
    run_query(&env, &scan_plan(), 60 * MS);
    table.refresh();

    let row = table.row(&class).unwrap();
    assert_eq!(row.get(&ps(1)), Some(Weight::Share(67)));
    assert_eq!(row.get(&ps(2)), Some(Weight::Share(33)));

    // Weighted choice: with enough draws both placements are selected.
    let mut seen = std::collections::BTreeSet::new();
    for _ in 0..200 {
        let decision = env.router.analyze(&scan_plan()).unwrap();
        seen.insert(decision.selected_placement().unwrap().clone());
    }
    assert_eq!(seen.len(), 2);
}

#[test]
fn long_running_regime_collapses_to_fastest() {
    let env = setup(
        RouterConfig::new()
            .with_short_running_similar_threshold(150)
            .with_long_running_similar_threshold(0),
    );
    let table = env.router.routing_table();

    let decision = run_query(&env, &scan_plan(), 2500 * MS);
    let class = decision.query_class().unwrap().clone();
    table.refresh();
    run_query(&env, &scan_plan(), 2600 * MS);
    table.refresh();

    // Both means are beyond the 1000 ms boundary and the long-running band
    // is disabled, so the short-running band does not apply.
    let row = table.row(&class).unwrap();
    assert_eq!(row.get(&ps(1)), Some(Weight::Share(100)));
    assert_eq!(row.get(&ps(2)), Some(Weight::Share(0)));
}

#[test]
fn dropping_an_adapter_removes_it_everywhere() {
    let env = setup(RouterConfig::default());
    let table = env.router.routing_table();

    let decision = run_query(&env, &scan_plan(), 30 * MS);
    let class = decision.query_class().unwrap().clone();
    table.refresh();
    run_query(&env, &scan_plan(), 60 * MS);
    table.refresh();

    let placements = env.catalog.column_placements_on_adapter(2, env.table.id);
    env.router.drop_placements(&placements);
    // The catalog drops the placements too.
    let mut updated = env.table.clone();
    updated.placements_by_adapter.remove(&2);
    env.catalog.update_table(updated);

    let known: Vec<PlacementSet> = table
        .known_placements()
        .into_iter()
        .map(|(placement, _)| placement)
        .collect();
    assert_eq!(known, vec![ps(1)]);

    let row = table.row(&class).unwrap();
    assert_eq!(row.len(), 1);
    // The surviving placement is rebuilt as the sole winner.
    assert_eq!(row.get(&ps(1)), Some(Weight::Share(100)));

    // Dropping the same placements again is a no-op.
    env.router.drop_placements(&placements);
    assert_eq!(table.known_placements().len(), 1);
}

#[test]
fn modifications_bypass_the_routing_table() {
    let env = setup(RouterConfig::default());

    let plan = LogicalPlan::Modify {
        table: TableRef::new("public", "users"),
        op: ModifyOp::Insert,
        source: None,
    };
    let mut decision = env.router.analyze(&plan).unwrap();
    assert!(decision.is_modification());
    assert!(decision.query_class().is_none());

    let placements = env
        .router
        .select_placement(&mut decision, &env.table)
        .unwrap();
    assert_eq!(placements.len(), 4); // both columns on both adapters
    assert!(env.router.routing_table().is_empty());

    // DDL surface: a new table goes to every data store.
    let stores = env.router.create_table_stores().unwrap();
    assert_eq!(stores.len(), 2);
}

#[test]
fn merge_surfaces_a_structured_error() {
    let env = setup(RouterConfig::default());
    let plan = LogicalPlan::Modify {
        table: TableRef::new("public", "users"),
        op: ModifyOp::Merge,
        source: None,
    };
    let mut decision = env.router.analyze(&plan).unwrap();
    match env.router.select_placement(&mut decision, &env.table) {
        Err(RouterError::Unsupported { operation }) => assert_eq!(operation, "MERGE"),
        other => panic!("expected unsupported MERGE, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn exploration_wins_while_any_placement_is_unmeasured() {
    let env = setup(RouterConfig::new().with_short_running_similar_threshold(150));
    let table = env.router.routing_table();

    let decision = run_query(&env, &scan_plan(), 30 * MS);
    let class = decision.query_class().unwrap().clone();
    table.refresh();

    // Placement [2] is still missing: every selection must return it, no
    // matter what the random draw says.
    for _ in 0..20 {
        let decision = env.router.analyze(&scan_plan()).unwrap();
        assert_eq!(decision.selected_placement(), Some(&ps(2)));
    }
    let row = table.row(&class).unwrap();
    assert!(row.has_missing());
}

#[test]
fn literal_changes_share_one_routing_row() {
    let env = setup(RouterConfig::default());
    let table = env.router.routing_table();

    let decision = run_query(&env, &filter_plan(3), 10 * MS);
    let class = decision.query_class().unwrap().clone();

    let decision = run_query(&env, &filter_plan(7), 12 * MS);
    assert_eq!(decision.query_class(), Some(&class));
    assert_eq!(table.len(), 1);
}

#[test]
fn rows_stay_isomorphic_across_classes() {
    let env = setup(RouterConfig::default());
    let table = env.router.routing_table();

    run_query(&env, &scan_plan(), 10 * MS);
    run_query(&env, &filter_plan(1), 20 * MS);
    table.refresh();

    let known = table.known_placements();
    for (class, row) in table.snapshot() {
        for (placement, _) in &known {
            assert!(
                row.get(placement).is_some(),
                "row {} misses {}",
                class,
                placement
            );
        }
        // Post-refresh every row sums to 100 or still has unexplored
        // placements.
        assert!(row.share_sum() == 100 || row.has_missing());
    }
}

#[test]
fn training_off_freezes_the_table() {
    // With training disabled no feedback is ever emitted, so even after
    // executions and refreshes the row keeps its sentinels.
    let env = setup(RouterConfig::default().with_training(false));
    let table = env.router.routing_table();

    let mut decision = env.router.analyze(&scan_plan()).unwrap();
    env.router
        .select_placement(&mut decision, &env.table)
        .unwrap();
    let monitor = ExecutionTimeMonitor::new();
    env.router.wrap_up(&decision, &monitor);
    monitor.set_execution_time(500 * MS);
    table.refresh();

    let class = decision.query_class().unwrap();
    let row = table.row(class).unwrap();
    assert_eq!(row.get(&ps(1)), Some(Weight::Missing));
    assert_eq!(row.get(&ps(2)), Some(Weight::Missing));
}

#[test]
fn background_refresh_applies_feedback_without_manual_refresh() {
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.register_adapter(Adapter::new(1, "pg0", AdapterKind::Store));
    let table = CatalogTable::new(10, "users", vec![100]).with_placement(1, vec![100]);
    catalog.register_table(table.clone()).unwrap();

    let config = Arc::new(RouterConfig::default());
    let monitoring = Arc::new(InMemoryMonitor::new(config.clone()));
    let router = AdaptiveRouter::with_refresh_interval(
        catalog,
        monitoring,
        config,
        std::time::Duration::from_millis(10),
    );

    let mut decision = router.analyze(&scan_plan()).unwrap();
    router.select_placement(&mut decision, &table).unwrap();
    let monitor = ExecutionTimeMonitor::new();
    router.wrap_up(&decision, &monitor);
    monitor.set_execution_time(5 * MS);

    let class = decision.query_class().unwrap();
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    loop {
        let row = router.routing_table().row(class).unwrap();
        if row.get(&ps(1)) == Some(Weight::Share(100)) {
            break;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "background refresh never applied the sample"
        );
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
}

#[test]
fn introspection_renders_the_table() {
    let env = setup(RouterConfig::default());
    let table = env.router.routing_table();

    let decision = run_query(&env, &scan_plan(), 30 * MS);
    let class = decision.query_class().unwrap().clone();
    table.refresh();

    let view = env.router.table_view();
    assert_eq!(view.labels, vec!["Query Class", "pg0", "mongo0"]);
    assert_eq!(view.rows.len(), 1);
    assert_eq!(view.rows[0].cells, vec!["100", "Unknown"]);

    let detail = env.router.class_view(&class).unwrap();
    assert_eq!(detail.entries.len(), 2);
    assert_eq!(detail.entries[0].weight, "100");
    assert_eq!(detail.entries[0].mean_ms, Some(30.0));

    // Views serialize for the admin surface.
    let json = serde_json::to_string(&view).unwrap();
    assert!(json.contains("Query Class"));
}
