//! Read-only views of the routing table for diagnostics.
//!
//! Views are computed on demand from the current snapshots; they never hold
//! the table's writer lock. Cells render `"Unknown"` for placements that
//! are still unexplored and `"-"` for placements that cannot serve the
//! class.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::classify::QueryClass;
use crate::monitoring::MonitoringService;
use crate::routing::{PlacementSet, RoutingTable, Weight};

/// Tabular snapshot: one row per query class, one column per known
/// placement set.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingTableView {
    /// Column headers: "Query Class" followed by the placement labels.
    pub labels: Vec<String>,
    /// One row per query class, ordered by class.
    pub rows: Vec<RoutingRowView>,
}

/// One rendered routing table row.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingRowView {
    pub query_class: String,
    /// One cell per known placement, in placement order.
    pub cells: Vec<String>,
}

/// Detail view of one query class.
#[derive(Debug, Clone, Serialize)]
pub struct QueryClassView {
    pub query_class: String,
    pub entries: Vec<QueryClassEntry>,
}

/// One placement's weight and observed mean time within a class view.
#[derive(Debug, Clone, Serialize)]
pub struct QueryClassEntry {
    pub placement: String,
    pub label: String,
    pub weight: String,
    /// Mean of the retained samples in milliseconds, if any.
    pub mean_ms: Option<f64>,
}

fn render_weight(weight: Option<Weight>) -> String {
    match weight {
        Some(Weight::Missing) => "Unknown".to_string(),
        Some(Weight::Share(share)) => share.to_string(),
        Some(Weight::NoPlacement) | None => "-".to_string(),
    }
}

/// Render the whole routing table.
pub fn table_view(table: &RoutingTable) -> RoutingTableView {
    let known = table.known_placements();
    let mut labels = vec!["Query Class".to_string()];
    labels.extend(known.iter().map(|(_, label)| label.clone()));

    let rows = table
        .snapshot()
        .into_iter()
        .map(|(query_class, row)| RoutingRowView {
            query_class: query_class.to_string(),
            cells: known
                .iter()
                .map(|(placement, _)| render_weight(row.get(placement)))
                .collect(),
        })
        .collect();

    RoutingTableView { labels, rows }
}

/// Render one query class with mean execution times, if the class is
/// tracked.
pub fn class_view(
    table: &RoutingTable,
    monitoring: &dyn MonitoringService,
    query_class: &QueryClass,
) -> Option<QueryClassView> {
    let row = table.row(query_class)?;
    let labels: BTreeMap<PlacementSet, String> = table.known_placements().into_iter().collect();

    let mut sums: BTreeMap<PlacementSet, (u64, usize)> = BTreeMap::new();
    for point in monitoring.routing_data_points(query_class) {
        let entry = sums.entry(point.placement).or_insert((0, 0));
        entry.0 += point.nanos;
        entry.1 += 1;
    }

    let entries = row
        .iter()
        .map(|(placement, weight)| QueryClassEntry {
            placement: placement.to_string(),
            label: labels.get(placement).cloned().unwrap_or_default(),
            weight: render_weight(Some(weight)),
            mean_ms: sums.get(placement).map(|&(total, count)| {
                total as f64 / count as f64 / 1_000_000.0
            }),
        })
        .collect();

    Some(QueryClassView {
        query_class: query_class.to_string(),
        entries,
    })
}

impl fmt::Display for RoutingTableView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Parameterized class strings span lines; flatten them for the
        // one-row-per-class rendering.
        let rows: Vec<(String, &[String])> = self
            .rows
            .iter()
            .map(|row| {
                (
                    row.query_class.replace('\n', " ").trim_end().to_string(),
                    row.cells.as_slice(),
                )
            })
            .collect();

        let mut widths: Vec<usize> = self.labels.iter().map(|label| label.len()).collect();
        for (query_class, cells) in &rows {
            if let Some(width) = widths.first_mut() {
                *width = (*width).max(query_class.len());
            }
            for (index, cell) in cells.iter().enumerate() {
                if let Some(width) = widths.get_mut(index + 1) {
                    *width = (*width).max(cell.len());
                }
            }
        }

        for (index, label) in self.labels.iter().enumerate() {
            if index > 0 {
                write!(f, "  ")?;
            }
            write!(f, "{:width$}", label, width = widths[index])?;
        }
        writeln!(f)?;

        for (query_class, cells) in &rows {
            write!(f, "{:width$}", query_class, width = widths[0])?;
            for (index, cell) in cells.iter().enumerate() {
                let width = widths.get(index + 1).copied().unwrap_or(0);
                write!(f, "  {:width$}", cell, width = width)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::monitoring::{ExecutionTimeObserver, InMemoryMonitor, RoutingRef};
    use std::sync::Arc;

    fn ps(id: u32) -> PlacementSet {
        PlacementSet::singleton(id)
    }

    fn setup() -> (Arc<InMemoryMonitor>, RoutingTable) {
        let config = Arc::new(RouterConfig::default());
        let monitor = Arc::new(InMemoryMonitor::new(config.clone()));
        let table = RoutingTable::new(monitor.clone(), config);
        (monitor, table)
    }

    #[test]
    fn test_table_view_renders_sentinels() {
        let (_, table) = setup();
        table.register_placement(&ps(1), "pg0".to_string(), None);
        table.register_placement(&ps(2), "mongo0".to_string(), None);
        table.initialize_row(&QueryClass::new("c1"), &[ps(1)]);

        let view = table_view(&table);
        assert_eq!(view.labels, vec!["Query Class", "pg0", "mongo0"]);
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].cells, vec!["Unknown", "-"]);
    }

    #[test]
    fn test_table_view_renders_weights() {
        let (_, table) = setup();
        let class = QueryClass::new("c1");
        table.register_placement(&ps(1), "pg0".to_string(), None);
        table.register_placement(&ps(2), "mongo0".to_string(), None);
        table.initialize_row(&class, &[ps(1), ps(2)]);
        table.execution_time(&RoutingRef::new(ps(1), class.clone()), 30_000_000);
        table.execution_time(&RoutingRef::new(ps(2), class.clone()), 60_000_000);
        table.refresh();

        let view = table_view(&table);
        assert_eq!(view.rows[0].cells, vec!["100", "0"]);

        let rendered = view.to_string();
        assert!(rendered.contains("pg0"));
        assert!(rendered.contains("100"));
    }

    #[test]
    fn test_class_view_includes_means() {
        let (monitor, table) = setup();
        let class = QueryClass::new("c1");
        table.register_placement(&ps(1), "pg0".to_string(), None);
        table.initialize_row(&class, &[ps(1)]);
        table.execution_time(&RoutingRef::new(ps(1), class.clone()), 20_000_000);
        table.execution_time(&RoutingRef::new(ps(1), class.clone()), 40_000_000);
        table.refresh();

        let view = class_view(&table, monitor.as_ref(), &class).unwrap();
        assert_eq!(view.entries.len(), 1);
        assert_eq!(view.entries[0].weight, "100");
        assert_eq!(view.entries[0].mean_ms, Some(30.0));

        assert!(class_view(&table, monitor.as_ref(), &QueryClass::new("nope")).is_none());
    }
}
