//! The adaptive routing table.
//!
//! A concurrent map from query class to an immutable weight row. The query
//! path only ever reads row snapshots (lock-free through the sharded map);
//! all mutation funnels through an exclusive writer lock taken by the
//! periodic refresh, row initialization, and placement drops. Readers may
//! observe a row that is one refresh cycle stale, which is acceptable:
//! selection accuracy is a soft target.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::catalog::{AdapterId, ColumnPlacement};
use crate::classify::QueryClass;
use crate::config::RouterConfig;
use crate::monitoring::{ExecutionTimeObserver, MonitoringService, RoutingEvent, RoutingRef};

use super::generate::generate_row;
use super::placement::PlacementSet;

/// Weight of one placement set within a routing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weight {
    /// This placement cannot serve this query class.
    NoPlacement,
    /// No timing sample yet; selection explores it next.
    Missing,
    /// Selection probability in percent.
    Share(u8),
}

impl Weight {
    /// Whether this is the missing-value sentinel.
    pub fn is_missing(&self) -> bool {
        matches!(self, Weight::Missing)
    }

    /// The percent share, if this is a measured weight.
    pub fn share(&self) -> Option<u8> {
        match self {
            Weight::Share(share) => Some(*share),
            _ => None,
        }
    }

    /// Contribution to the selection accumulator; sentinels count as zero.
    pub(crate) fn effective(&self) -> u32 {
        self.share().unwrap_or(0) as u32
    }
}

/// Immutable snapshot of one query class's weight distribution.
///
/// Entries iterate in placement-set order, so row traversal is
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct RoutingRow {
    entries: BTreeMap<PlacementSet, Weight>,
}

impl RoutingRow {
    fn from_entries(entries: BTreeMap<PlacementSet, Weight>) -> Self {
        Self { entries }
    }

    /// Whether the row has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Weight of a placement set, if present.
    pub fn get(&self, placement: &PlacementSet) -> Option<Weight> {
        self.entries.get(placement).copied()
    }

    /// Iterate entries in placement-set order.
    pub fn iter(&self) -> impl Iterator<Item = (&PlacementSet, Weight)> {
        self.entries.iter().map(|(placement, &weight)| (placement, weight))
    }

    /// The first unexplored placement, if any.
    pub fn first_missing(&self) -> Option<&PlacementSet> {
        self.entries
            .iter()
            .find(|(_, weight)| weight.is_missing())
            .map(|(placement, _)| placement)
    }

    /// Whether any entry is still unexplored.
    pub fn has_missing(&self) -> bool {
        self.entries.values().any(|weight| weight.is_missing())
    }

    /// Sum of the measured percent shares.
    pub fn share_sum(&self) -> u32 {
        self.entries.values().map(|weight| weight.effective()).sum()
    }
}

/// Concurrent routing table shared by every query thread and the refresher.
pub struct RoutingTable {
    /// Query class -> immutable row snapshot.
    rows: DashMap<QueryClass, Arc<RoutingRow>>,
    /// Every placement set ever discovered, with its human-readable label.
    /// Rows carry an entry for each of these, so rows stay columnwise
    /// comparable.
    known_placements: RwLock<BTreeMap<PlacementSet, String>>,
    /// Serializes refresh, initialization, and drops.
    write_lock: Mutex<()>,
    monitoring: Arc<dyn MonitoringService>,
    config: Arc<RouterConfig>,
}

impl RoutingTable {
    /// Create an empty routing table.
    pub fn new(monitoring: Arc<dyn MonitoringService>, config: Arc<RouterConfig>) -> Self {
        Self {
            rows: DashMap::new(),
            known_placements: RwLock::new(BTreeMap::new()),
            write_lock: Mutex::new(()),
            monitoring,
            config,
        }
    }

    /// Whether a query class has a row.
    pub fn contains(&self, query_class: &QueryClass) -> bool {
        self.rows.contains_key(query_class)
    }

    /// Snapshot of a query class's row.
    pub fn row(&self, query_class: &QueryClass) -> Option<Arc<RoutingRow>> {
        self.rows.get(query_class).map(|entry| entry.value().clone())
    }

    /// Number of query classes currently tracked.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table tracks no query class yet.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Snapshot of every known placement set and its label, in set order.
    pub fn known_placements(&self) -> Vec<(PlacementSet, String)> {
        self.known_placements
            .read()
            .iter()
            .map(|(placement, label)| (placement.clone(), label.clone()))
            .collect()
    }

    /// Snapshot of all rows, ordered by query class.
    pub fn snapshot(&self) -> Vec<(QueryClass, Arc<RoutingRow>)> {
        let mut rows: Vec<(QueryClass, Arc<RoutingRow>)> = self
            .rows
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }

    /// Make a placement set known under the given label.
    ///
    /// On first registration every existing row is backfilled so rows stay
    /// isomorphic: the row of `current_class` (the class being analyzed
    /// right now) gets a `Missing` entry since the placement is a candidate
    /// for it, every other row gets `NoPlacement`.
    pub fn register_placement(
        &self,
        placement: &PlacementSet,
        label: String,
        current_class: Option<&QueryClass>,
    ) {
        {
            let mut known = self.known_placements.write();
            if known.contains_key(placement) {
                return;
            }
            known.insert(placement.clone(), label);
        }

        let _guard = self.write_lock.lock();
        for mut entry in self.rows.iter_mut() {
            if entry.value().get(placement).is_none() {
                let weight = if current_class == Some(entry.key()) {
                    Weight::Missing
                } else {
                    Weight::NoPlacement
                };
                let mut entries = entry.value().entries.clone();
                entries.insert(placement.clone(), weight);
                *entry.value_mut() = Arc::new(RoutingRow::from_entries(entries));
            }
        }
    }

    /// Create the row for a newly seen query class.
    ///
    /// The row starts with `NoPlacement` for every known placement set and
    /// `Missing` for each candidate, so the selection policy explores every
    /// candidate at least once.
    pub fn initialize_row(&self, query_class: &QueryClass, candidates: &[PlacementSet]) {
        let _guard = self.write_lock.lock();
        let mut entries: BTreeMap<PlacementSet, Weight> = self
            .known_placements
            .read()
            .keys()
            .map(|placement| (placement.clone(), Weight::NoPlacement))
            .collect();
        for candidate in candidates {
            entries.insert(candidate.clone(), Weight::Missing);
        }
        self.rows
            .insert(query_class.clone(), Arc::new(RoutingRow::from_entries(entries)));
    }

    /// Remove dropped adapters from the registry and every row.
    ///
    /// Any placement set containing a dropped adapter disappears; rows left
    /// without a single placement are removed entirely. Calling this twice
    /// with the same placements is a no-op the second time.
    pub fn drop_placements(&self, placements: &[ColumnPlacement]) {
        // Fold pending samples into the table before the keys disappear.
        self.refresh();
        {
            let _guard = self.write_lock.lock();
            let dropped: BTreeSet<AdapterId> =
                placements.iter().map(|placement| placement.adapter_id).collect();

            self.known_placements
                .write()
                .retain(|placement, _| !placement.iter().any(|id| dropped.contains(&id)));

            let classes: Vec<QueryClass> =
                self.rows.iter().map(|entry| entry.key().clone()).collect();
            for query_class in classes {
                let Some(old) = self.row(&query_class) else {
                    continue;
                };
                let entries: BTreeMap<PlacementSet, Weight> = old
                    .iter()
                    .filter(|(placement, _)| {
                        !placement.iter().any(|id| dropped.contains(&id))
                    })
                    .map(|(placement, weight)| (placement.clone(), weight))
                    .collect();
                if entries.is_empty() {
                    debug!(query_class = %query_class, "dropping routing row without placements");
                    self.rows.remove(&query_class);
                } else {
                    self.rows
                        .insert(query_class, Arc::new(RoutingRow::from_entries(entries)));
                }
            }
        }
        self.refresh();
    }

    /// Recompute every row from the monitoring service's retained samples.
    ///
    /// Holds the exclusive writer lock for the duration; the query path
    /// keeps reading the previous snapshots meanwhile. Placements whose
    /// samples disappeared fall back to `Missing`, placements marked
    /// `NoPlacement` stay that way.
    pub fn refresh(&self) {
        let _guard = self.write_lock.lock();
        let classes: Vec<QueryClass> = self.rows.iter().map(|entry| entry.key().clone()).collect();
        for query_class in classes {
            let mut grouped: BTreeMap<PlacementSet, Vec<u64>> = BTreeMap::new();
            for point in self.monitoring.routing_data_points(&query_class) {
                grouped.entry(point.placement).or_default().push(point.nanos);
            }
            let mean_times: BTreeMap<PlacementSet, f64> = grouped
                .into_iter()
                .map(|(placement, samples)| {
                    let mean =
                        samples.iter().map(|&nanos| nanos as f64).sum::<f64>() / samples.len() as f64;
                    (placement, mean)
                })
                .collect();

            let calculated = generate_row(
                &mean_times,
                self.config.short_running_similar_threshold(),
                self.config.long_running_similar_threshold(),
                self.config.short_running_long_running_threshold_nanos(),
            );

            let Some(old) = self.row(&query_class) else {
                continue;
            };
            let mut entries: BTreeMap<PlacementSet, Weight> = self
                .known_placements
                .read()
                .keys()
                .map(|placement| (placement.clone(), Weight::NoPlacement))
                .collect();
            for (placement, weight) in old.iter() {
                match weight {
                    Weight::NoPlacement => {
                        entries.insert(placement.clone(), Weight::NoPlacement);
                    }
                    _ => {
                        if !entries.contains_key(placement) {
                            continue;
                        }
                        let refreshed = match calculated.get(placement) {
                            Some(&share) => Weight::Share(share),
                            None => Weight::Missing,
                        };
                        entries.insert(placement.clone(), refreshed);
                    }
                }
            }
            self.rows
                .insert(query_class, Arc::new(RoutingRow::from_entries(entries)));
        }
    }
}

impl ExecutionTimeObserver for RoutingTable {
    /// Intake of one measured execution: forward it to the monitoring
    /// service. The routing table itself is only updated by the periodic
    /// refresh, which keeps this path free of contention.
    fn execution_time(&self, reference: &RoutingRef, nanos: u64) {
        if reference.placement.is_empty() {
            // Query without any table (e.g. SELECT 1).
            return;
        }
        self.monitoring.monitor_event(RoutingEvent {
            query_class: reference.query_class.clone(),
            placement: reference.placement.clone(),
            nanos,
        });
    }
}
