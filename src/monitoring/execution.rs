//! Execution-time feedback plumbing.
//!
//! The physical executor knows when a query finished and how long it took;
//! the routing table wants that number tagged with the placement set and
//! query class the router chose. An [`ExecutionTimeMonitor`] is created per
//! query: interested parties subscribe with a typed [`RoutingRef`], and the
//! executor fires `set_execution_time` exactly once when the query
//! completes. If the query is abandoned the monitor is simply dropped and
//! no feedback is emitted.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::classify::QueryClass;
use crate::routing::PlacementSet;

/// Tag identifying which routing decision a timing sample belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRef {
    pub placement: PlacementSet,
    pub query_class: QueryClass,
}

impl RoutingRef {
    /// Create a new reference tag.
    pub fn new(placement: PlacementSet, query_class: QueryClass) -> Self {
        Self {
            placement,
            query_class,
        }
    }
}

/// Receiver of execution-time observations.
pub trait ExecutionTimeObserver: Send + Sync {
    /// Called once per subscribed query with the elapsed wall time.
    fn execution_time(&self, reference: &RoutingRef, nanos: u64);
}

/// Per-query registry of execution-time subscriptions.
#[derive(Default)]
pub struct ExecutionTimeMonitor {
    subscribers: Mutex<Vec<(RoutingRef, Arc<dyn ExecutionTimeObserver>)>>,
}

impl ExecutionTimeMonitor {
    /// Create an empty monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe an observer under a reference tag.
    pub fn subscribe(&self, observer: Arc<dyn ExecutionTimeObserver>, reference: RoutingRef) {
        self.subscribers.lock().push((reference, observer));
    }

    /// Notify every subscriber of the query's execution time and clear the
    /// registry.
    pub fn set_execution_time(&self, nanos: u64) {
        let subscribers = std::mem::take(&mut *self.subscribers.lock());
        for (reference, observer) in subscribers {
            observer.execution_time(&reference, nanos);
        }
    }
}
