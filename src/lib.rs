//! Polyroute - Adaptive Query Routing for Polyglot Data Stores
//!
//! Polyroute decides, for every incoming logical query, which set of
//! storage adapters should execute it. Decisions are learned: the router
//! classifies each plan into a *query class*, measures execution times per
//! (class, adapter set), and keeps a probability table that a background
//! task rewrites every few seconds from the observed means.
//!
//! # Features
//!
//! - **Query classification**: structural plan fingerprints, or literal
//!   collapsing so `x = 3` and `x = 7` share one class
//! - **Learned routing table**: per-class weight distributions over adapter
//!   placement sets, refreshed from measured execution times
//! - **Exploration first**: every candidate placement is executed at least
//!   once before the weights take over
//! - **Lock-free query path**: immutable row snapshots behind a concurrent
//!   map; only the background refresh takes the writer lock
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use polyroute::catalog::{Adapter, AdapterKind, CatalogTable, MemoryCatalog};
//! use polyroute::monitoring::{ExecutionTimeMonitor, InMemoryMonitor};
//! use polyroute::plan::{LogicalPlan, TableRef};
//! use polyroute::{AdaptiveRouter, Result, Router, RouterConfig};
//!
//! fn main() -> Result<()> {
//!     // Two stores, both holding a full replica of the table.
//!     let catalog = Arc::new(MemoryCatalog::new());
//!     catalog.register_adapter(Adapter::new(1, "pg0", AdapterKind::Store));
//!     catalog.register_adapter(Adapter::new(2, "mongo0", AdapterKind::Store));
//!     let table = CatalogTable::new(10, "users", vec![100, 101])
//!         .with_placement(1, vec![100, 101])
//!         .with_placement(2, vec![100, 101]);
//!     catalog.register_table(table.clone())?;
//!
//!     let config = Arc::new(RouterConfig::default());
//!     let monitoring = Arc::new(InMemoryMonitor::new(config.clone()));
//!     let router = AdaptiveRouter::new(catalog, monitoring, config);
//!
//!     // Route one query and report its execution time back.
//!     let plan = LogicalPlan::TableScan {
//!         table: TableRef::new("public", "users"),
//!     };
//!     let mut decision = router.analyze(&plan)?;
//!     let placements = router.select_placement(&mut decision, &table)?;
//!     assert_eq!(placements.len(), 2);
//!
//!     let monitor = ExecutionTimeMonitor::new();
//!     router.wrap_up(&decision, &monitor);
//!     monitor.set_execution_time(4_200_000); // 4.2 ms
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod introspection;
pub mod monitoring;
pub mod plan;
pub mod router;
pub mod routing;

// Re-export commonly used types
pub use classify::QueryClass;
pub use config::{ClassifierStrategy, RouterConfig};
pub use error::{Result, RouterError};
pub use router::{AdaptiveRouter, RouteDecision, Router};
pub use routing::{PlacementSet, RoutingTable, Weight};

/// Prelude module for common imports.
pub mod prelude {
    pub use crate::catalog::{Adapter, AdapterKind, Catalog, CatalogTable, MemoryCatalog};
    pub use crate::classify::QueryClass;
    pub use crate::config::{ClassifierStrategy, RouterConfig};
    pub use crate::error::{Result, RouterError};
    pub use crate::monitoring::{ExecutionTimeMonitor, InMemoryMonitor, MonitoringService};
    pub use crate::plan::{LogicalExpr, LogicalPlan, ScalarValue, TableRef};
    pub use crate::router::{AdaptiveRouter, RouteDecision, Router};
    pub use crate::routing::{PlacementSet, RoutingTable, Weight};
}
