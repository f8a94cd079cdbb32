//! Placement sets and candidate discovery.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::catalog::{AdapterId, CatalogTable, ColumnId};

/// An unordered set of adapters that together provide every column of a
/// table.
///
/// Equality is by set membership, and iteration order is the ascending
/// adapter id order, so placement sets are usable as deterministic map
/// keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PlacementSet(BTreeSet<AdapterId>);

impl PlacementSet {
    /// Create an empty placement set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set holding a single adapter.
    pub fn singleton(adapter_id: AdapterId) -> Self {
        let mut set = BTreeSet::new();
        set.insert(adapter_id);
        Self(set)
    }

    /// Add an adapter to the set.
    pub fn insert(&mut self, adapter_id: AdapterId) {
        self.0.insert(adapter_id);
    }

    /// Whether the set contains an adapter.
    pub fn contains(&self, adapter_id: AdapterId) -> bool {
        self.0.contains(&adapter_id)
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of adapters in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate the adapter ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = AdapterId> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<AdapterId> for PlacementSet {
    fn from_iter<I: IntoIterator<Item = AdapterId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for PlacementSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.0.iter().map(|id| id.to_string()).collect();
        write!(f, "[{}]", ids.join(","))
    }
}

/// Compute the candidate placement sets able to answer queries on a table.
///
/// Every adapter holding a full replica is a singleton candidate. When no
/// adapter covers the whole table, one synthetic stitched set is built:
/// the adapter with the most placed columns, plus, for each column it
/// lacks, the first adapter that holds it. Cross-adapter planning beyond
/// that single pre-picked stitch is out of scope for the router.
pub fn candidate_placements(table: &CatalogTable) -> Vec<PlacementSet> {
    let mut candidates: Vec<PlacementSet> = table
        .placements_by_adapter
        .iter()
        .filter(|(_, columns)| {
            table
                .column_ids
                .iter()
                .all(|column_id| columns.contains(column_id))
        })
        .map(|(&adapter_id, _)| PlacementSet::singleton(adapter_id))
        .collect();

    if candidates.is_empty() && !table.placements_by_adapter.is_empty() {
        let mut best_adapter = None;
        let mut best_columns: &[ColumnId] = &[];
        for (&adapter_id, columns) in &table.placements_by_adapter {
            if columns.len() > best_columns.len() {
                best_adapter = Some(adapter_id);
                best_columns = columns;
            }
        }

        let mut stitched = PlacementSet::new();
        if let Some(best_adapter) = best_adapter {
            for column_id in &table.column_ids {
                if best_columns.contains(column_id) {
                    stitched.insert(best_adapter);
                } else if let Some((&adapter_id, _)) = table
                    .placements_by_adapter
                    .iter()
                    .find(|(_, columns)| columns.contains(column_id))
                {
                    stitched.insert(adapter_id);
                }
            }
        }
        if !stitched.is_empty() {
            candidates.push(stitched);
        }
    }

    candidates
}
