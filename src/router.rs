//! The adaptive router.
//!
//! One [`AdaptiveRouter`] lives for the whole process. Each query runs
//! through three calls in program order:
//!
//! 1. [`Router::analyze`] classifies the logical plan and, for a known
//!    class, picks the placement set to execute on.
//! 2. [`Router::select_placement`] resolves the pick against the catalog,
//!    initializing the routing row on a class's first sighting.
//! 3. [`Router::wrap_up`] subscribes the routing table to the query's
//!    execution time, closing the feedback loop.
//!
//! Modification queries skip classification and selection entirely and are
//! dispatched to every adapter hosting the table.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::catalog::{Adapter, Catalog, CatalogTable, ColumnPlacement};
use crate::classify::{classify, QueryClass};
use crate::config::RouterConfig;
use crate::error::{Result, RouterError};
use crate::introspection::{class_view, table_view, QueryClassView, RoutingTableView};
use crate::monitoring::{ExecutionTimeMonitor, MonitoringService, RoutingRef};
use crate::plan::{LogicalPlan, ModifyOp};
use crate::routing::{
    candidate_placements, select_placement, PlacementSet, RoutingTable, TableRefresher,
    DEFAULT_REFRESH_INTERVAL,
};

/// Per-query routing state, produced by `analyze` and consumed by the
/// later lifecycle calls.
#[derive(Debug, Clone)]
pub struct RouteDecision {
    query_class: Option<QueryClass>,
    selected: Option<PlacementSet>,
    modify: Option<ModifyOp>,
}

impl RouteDecision {
    /// The query class, absent for modification queries.
    pub fn query_class(&self) -> Option<&QueryClass> {
        self.query_class.as_ref()
    }

    /// The chosen placement set, once selection has happened.
    pub fn selected_placement(&self) -> Option<&PlacementSet> {
        self.selected.as_ref()
    }

    /// Whether the query modifies a table.
    pub fn is_modification(&self) -> bool {
        self.modify.is_some()
    }
}

/// Query routing seam between the planner and the storage adapters.
pub trait Router: Send + Sync {
    /// Classify a logical plan and pre-select a placement for known
    /// classes.
    fn analyze(&self, plan: &LogicalPlan) -> Result<RouteDecision>;

    /// Resolve the decision against a concrete table: the chosen placement
    /// set's column placements, in the table's column order.
    fn select_placement(
        &self,
        decision: &mut RouteDecision,
        table: &CatalogTable,
    ) -> Result<Vec<ColumnPlacement>>;

    /// Hook the routing feedback loop up to the query's execution monitor.
    fn wrap_up(&self, decision: &RouteDecision, monitor: &ExecutionTimeMonitor);

    /// Stores eligible for placing a newly created table.
    fn create_table_stores(&self) -> Result<Vec<Adapter>>;

    /// Adapters that receive a column added to an existing table.
    fn add_column_stores(&self, table: &CatalogTable) -> Result<Vec<Adapter>>;

    /// Forget dropped placements.
    fn drop_placements(&self, placements: &[ColumnPlacement]);
}

/// Router that learns, per query class, which placement sets answer
/// queries fastest, and routes accordingly.
pub struct AdaptiveRouter {
    catalog: Arc<dyn Catalog>,
    monitoring: Arc<dyn MonitoringService>,
    config: Arc<RouterConfig>,
    table: Arc<RoutingTable>,
    rng: Mutex<StdRng>,
    _refresher: TableRefresher,
}

impl AdaptiveRouter {
    /// Create a router and start its background refresh.
    pub fn new(
        catalog: Arc<dyn Catalog>,
        monitoring: Arc<dyn MonitoringService>,
        config: Arc<RouterConfig>,
    ) -> Self {
        Self::with_options(
            catalog,
            monitoring,
            config,
            DEFAULT_REFRESH_INTERVAL,
            StdRng::from_entropy(),
        )
    }

    /// Create a router refreshing on a custom cadence.
    pub fn with_refresh_interval(
        catalog: Arc<dyn Catalog>,
        monitoring: Arc<dyn MonitoringService>,
        config: Arc<RouterConfig>,
        interval: Duration,
    ) -> Self {
        Self::with_options(catalog, monitoring, config, interval, StdRng::from_entropy())
    }

    /// Create a router with a seeded random source, so weighted selection
    /// is reproducible.
    pub fn with_rng_seed(
        catalog: Arc<dyn Catalog>,
        monitoring: Arc<dyn MonitoringService>,
        config: Arc<RouterConfig>,
        seed: u64,
    ) -> Self {
        Self::with_options(
            catalog,
            monitoring,
            config,
            DEFAULT_REFRESH_INTERVAL,
            StdRng::seed_from_u64(seed),
        )
    }

    fn with_options(
        catalog: Arc<dyn Catalog>,
        monitoring: Arc<dyn MonitoringService>,
        config: Arc<RouterConfig>,
        interval: Duration,
        rng: StdRng,
    ) -> Self {
        let table = Arc::new(RoutingTable::new(monitoring.clone(), config.clone()));
        let refresher = TableRefresher::start(table.clone(), interval);
        Self {
            catalog,
            monitoring,
            config,
            table,
            rng: Mutex::new(rng),
            _refresher: refresher,
        }
    }

    /// The shared routing table.
    pub fn routing_table(&self) -> &Arc<RoutingTable> {
        &self.table
    }

    /// Snapshot of the routing table for diagnostics.
    pub fn table_view(&self) -> RoutingTableView {
        table_view(&self.table)
    }

    /// Detail view of one query class, with mean execution times.
    pub fn class_view(&self, query_class: &QueryClass) -> Option<QueryClassView> {
        class_view(&self.table, self.monitoring.as_ref(), query_class)
    }

    fn draw(&self) -> u32 {
        self.rng.lock().gen_range(1..=100)
    }

    fn placement_label(&self, placement: &PlacementSet) -> String {
        let names: Vec<String> = placement
            .iter()
            .map(|adapter_id| {
                self.catalog
                    .adapter(adapter_id)
                    .map(|adapter| adapter.unique_name)
                    .unwrap_or_else(|| adapter_id.to_string())
            })
            .collect();
        names.join(",")
    }

    /// Column placements of the table on every adapter hosting it, used to
    /// fan a modification out to all stores.
    fn all_placements(&self, table: &CatalogTable) -> Vec<ColumnPlacement> {
        table
            .hosting_adapters()
            .into_iter()
            .flat_map(|adapter_id| {
                self.catalog
                    .column_placements_on_adapter(adapter_id, table.id)
            })
            .collect()
    }
}

impl Router for AdaptiveRouter {
    fn analyze(&self, plan: &LogicalPlan) -> Result<RouteDecision> {
        if plan.is_modification() {
            return Ok(RouteDecision {
                query_class: None,
                selected: None,
                modify: plan.modify_op(),
            });
        }

        let query_class = classify(plan, self.config.classifier());
        let mut selected = None;
        if let Some(row) = self.table.row(&query_class) {
            if !row.is_empty() {
                let deterministic = self.config.short_running_similar_threshold() == 0;
                selected = Some(select_placement(&row, deterministic, self.draw())?);
            }
        }
        debug!(query_class = %query_class, selected = ?selected, "analyzed plan");
        Ok(RouteDecision {
            query_class: Some(query_class),
            selected,
            modify: None,
        })
    }

    fn select_placement(
        &self,
        decision: &mut RouteDecision,
        table: &CatalogTable,
    ) -> Result<Vec<ColumnPlacement>> {
        if decision.modify == Some(ModifyOp::Merge) {
            return Err(RouterError::unsupported("MERGE"));
        }
        if decision.is_modification() {
            let placements = self.all_placements(table);
            if placements.is_empty() {
                return Err(RouterError::plan(format!(
                    "table '{}' has no placement on any adapter",
                    table.name
                )));
            }
            return Ok(placements);
        }

        let candidates = candidate_placements(table);
        if candidates.is_empty() {
            return Err(RouterError::plan(format!(
                "no placement combination covers all columns of table '{}'",
                table.name
            )));
        }

        let query_class = decision.query_class.clone().ok_or_else(|| {
            RouterError::internal("placement selection without a classified plan")
        })?;

        for candidate in &candidates {
            self.table
                .register_placement(candidate, self.placement_label(candidate), Some(&query_class));
        }

        if decision.selected.is_none() {
            // First sighting of this class: initialize its row and take the
            // first candidate.
            self.table.initialize_row(&query_class, &candidates);
            decision.selected = Some(candidates[0].clone());
        }

        let selected = decision
            .selected
            .clone()
            .ok_or_else(|| RouterError::internal("no placement selected"))?;

        let available: Vec<ColumnPlacement> = selected
            .iter()
            .flat_map(|adapter_id| {
                self.catalog
                    .column_placements_on_adapter(adapter_id, table.id)
            })
            .collect();

        let mut result = Vec::with_capacity(table.column_ids.len());
        for &column_id in &table.column_ids {
            if let Some(placement) = available
                .iter()
                .find(|placement| placement.column_id == column_id)
            {
                result.push(placement.clone());
            }
        }

        if result.is_empty() {
            return Err(RouterError::plan(format!(
                "selected placement set {} no longer holds table '{}'",
                selected, table.name
            )));
        }
        Ok(result)
    }

    fn wrap_up(&self, decision: &RouteDecision, monitor: &ExecutionTimeMonitor) {
        if !self.config.training() {
            return;
        }
        if let (Some(query_class), Some(selected)) =
            (&decision.query_class, &decision.selected)
        {
            monitor.subscribe(
                self.table.clone(),
                RoutingRef::new(selected.clone(), query_class.clone()),
            );
        }
    }

    fn create_table_stores(&self) -> Result<Vec<Adapter>> {
        let stores = self.catalog.stores();
        if stores.is_empty() {
            return Err(RouterError::catalog("no suitable data store found"));
        }
        Ok(stores)
    }

    fn add_column_stores(&self, table: &CatalogTable) -> Result<Vec<Adapter>> {
        let adapters: Vec<Adapter> = table
            .hosting_adapters()
            .into_iter()
            .filter_map(|adapter_id| self.catalog.adapter(adapter_id))
            .collect();
        if adapters.is_empty() {
            return Err(RouterError::catalog("no suitable data store found"));
        }
        Ok(adapters)
    }

    fn drop_placements(&self, placements: &[ColumnPlacement]) {
        self.table.drop_placements(placements);
    }
}
