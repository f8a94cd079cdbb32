//! Monitoring collaborator of the routing engine.
//!
//! The router does not keep execution history itself. After every query it
//! emits a [`RoutingEvent`] to a [`MonitoringService`]; the periodic table
//! refresh later pulls the retained [`RoutingDataPoint`]s back out and
//! averages them. The service's retention window is therefore the effective
//! moving-average window of the whole feedback loop.

mod execution;

pub use execution::{ExecutionTimeMonitor, ExecutionTimeObserver, RoutingRef};

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use serde::Serialize;

use crate::classify::QueryClass;
use crate::config::RouterConfig;
use crate::routing::PlacementSet;

/// One measured query execution, emitted by the router after wrap-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingEvent {
    pub query_class: QueryClass,
    pub placement: PlacementSet,
    pub nanos: u64,
}

/// One retained timing sample, returned to the refresher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDataPoint {
    pub query_class: QueryClass,
    pub placement: PlacementSet,
    pub nanos: u64,
}

/// A generic monitoring record, for surfaces beyond routing timings.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorEvent {
    pub monitoring_type: String,
    pub description: String,
    pub field_names: Vec<String>,
    #[serde(skip)]
    pub recorded_at: SystemTime,
}

impl MonitorEvent {
    /// Build the record for a routing event.
    pub fn routing(event: &RoutingEvent) -> Self {
        Self {
            monitoring_type: "routing".to_string(),
            description: format!(
                "execution of class {} on {} took {} ns",
                event.query_class, event.placement, event.nanos
            ),
            field_names: vec![
                "query_class".to_string(),
                "placement".to_string(),
                "nanos".to_string(),
            ],
            recorded_at: SystemTime::now(),
        }
    }
}

/// Sink and store for routing timing samples.
///
/// `monitor_event` is called on the query path and must not block; pulling
/// data points happens on the background refresh path.
pub trait MonitoringService: Send + Sync {
    /// Record a routing event.
    fn monitor_event(&self, event: RoutingEvent);

    /// All retained samples for a query class.
    fn routing_data_points(&self, query_class: &QueryClass) -> Vec<RoutingDataPoint>;
}

/// In-process monitoring service with bounded retention.
///
/// Samples are kept per (query class, placement set) in a ring capped at
/// the configured window size; the oldest sample falls out when the ring is
/// full.
pub struct InMemoryMonitor {
    config: Arc<RouterConfig>,
    samples: RwLock<HashMap<QueryClass, HashMap<PlacementSet, VecDeque<u64>>>>,
    events: RwLock<Vec<MonitorEvent>>,
}

impl InMemoryMonitor {
    /// Create a monitor reading its window size from the given config.
    pub fn new(config: Arc<RouterConfig>) -> Self {
        Self {
            config,
            samples: RwLock::new(HashMap::new()),
            events: RwLock::new(Vec::new()),
        }
    }

    /// All generic monitoring records seen so far.
    pub fn events(&self) -> Vec<MonitorEvent> {
        self.events.read().clone()
    }

    /// Number of retained samples for one (class, placement) pair.
    pub fn sample_count(&self, query_class: &QueryClass, placement: &PlacementSet) -> usize {
        self.samples
            .read()
            .get(query_class)
            .and_then(|per_placement| per_placement.get(placement))
            .map(|ring| ring.len())
            .unwrap_or(0)
    }
}

impl MonitoringService for InMemoryMonitor {
    fn monitor_event(&self, event: RoutingEvent) {
        // Window size is runtime-mutable; read it per event.
        let window = self.config.window_size().max(1);

        self.events.write().push(MonitorEvent::routing(&event));

        let mut samples = self.samples.write();
        let ring = samples
            .entry(event.query_class)
            .or_default()
            .entry(event.placement)
            .or_default();
        ring.push_back(event.nanos);
        while ring.len() > window {
            ring.pop_front();
        }
    }

    fn routing_data_points(&self, query_class: &QueryClass) -> Vec<RoutingDataPoint> {
        let samples = self.samples.read();
        let Some(per_placement) = samples.get(query_class) else {
            return vec![];
        };
        let mut points = Vec::new();
        for (placement, ring) in per_placement {
            for &nanos in ring {
                points.push(RoutingDataPoint {
                    query_class: query_class.clone(),
                    placement: placement.clone(),
                    nanos,
                });
            }
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor_with_window(window: usize) -> InMemoryMonitor {
        InMemoryMonitor::new(Arc::new(RouterConfig::new().with_window_size(window)))
    }

    fn event(class: &str, adapter: u32, nanos: u64) -> RoutingEvent {
        RoutingEvent {
            query_class: QueryClass::new(class),
            placement: PlacementSet::singleton(adapter),
            nanos,
        }
    }

    #[test]
    fn test_samples_are_retained_per_class_and_placement() {
        let monitor = monitor_with_window(25);
        monitor.monitor_event(event("c1", 1, 100));
        monitor.monitor_event(event("c1", 2, 200));
        monitor.monitor_event(event("c2", 1, 300));

        let points = monitor.routing_data_points(&QueryClass::new("c1"));
        assert_eq!(points.len(), 2);
        assert!(monitor
            .routing_data_points(&QueryClass::new("c3"))
            .is_empty());
    }

    #[test]
    fn test_window_caps_retention() {
        let monitor = monitor_with_window(3);
        for nanos in [10, 20, 30, 40, 50] {
            monitor.monitor_event(event("c1", 1, nanos));
        }
        assert_eq!(
            monitor.sample_count(&QueryClass::new("c1"), &PlacementSet::singleton(1)),
            3
        );
        let points = monitor.routing_data_points(&QueryClass::new("c1"));
        let retained: Vec<u64> = points.iter().map(|p| p.nanos).collect();
        assert_eq!(retained, vec![30, 40, 50]);
    }

    #[test]
    fn test_generic_event_log() {
        let monitor = monitor_with_window(25);
        monitor.monitor_event(event("c1", 1, 100));
        let events = monitor.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].monitoring_type, "routing");
    }
}
