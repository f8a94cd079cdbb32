//! Catalog view of adapters, tables, and column placements.
//!
//! The system-of-record for schemas and placements lives outside the
//! router; this module is the seam it is consumed through. [`Catalog`] is
//! the trait the embedding system implements, [`MemoryCatalog`] is an
//! in-process implementation used by embedders and tests.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::{Result, RouterError};

/// Identifier of a storage adapter, assigned by the catalog.
pub type AdapterId = u32;
/// Identifier of a column.
pub type ColumnId = u64;
/// Identifier of a table.
pub type TableId = u64;

/// What an adapter can do with data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    /// Read-write data store; eligible for table creation.
    Store,
    /// Read-only data source (e.g. an external ledger); never a target for
    /// new placements.
    Source,
}

/// A registered storage adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adapter {
    pub id: AdapterId,
    pub unique_name: String,
    pub kind: AdapterKind,
}

impl Adapter {
    /// Create a new adapter descriptor.
    pub fn new(id: AdapterId, unique_name: impl Into<String>, kind: AdapterKind) -> Self {
        Self {
            id,
            unique_name: unique_name.into(),
            kind,
        }
    }

    /// Whether this adapter is a writable data store.
    pub fn is_store(&self) -> bool {
        self.kind == AdapterKind::Store
    }
}

/// Placement of one column on one adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlacement {
    pub adapter_id: AdapterId,
    pub table_id: TableId,
    pub column_id: ColumnId,
    /// Name of the column in the adapter's physical schema.
    pub physical_name: String,
}

/// Catalog view of a table: its columns and where they are placed.
#[derive(Debug, Clone)]
pub struct CatalogTable {
    pub id: TableId,
    pub name: String,
    /// All column ids, in table order.
    pub column_ids: Vec<ColumnId>,
    /// Per adapter, the ordered list of column ids placed on it.
    pub placements_by_adapter: BTreeMap<AdapterId, Vec<ColumnId>>,
}

impl CatalogTable {
    /// Create a table descriptor without placements.
    pub fn new(id: TableId, name: impl Into<String>, column_ids: Vec<ColumnId>) -> Self {
        Self {
            id,
            name: name.into(),
            column_ids,
            placements_by_adapter: BTreeMap::new(),
        }
    }

    /// Add a placement of some of this table's columns on an adapter.
    pub fn with_placement(mut self, adapter_id: AdapterId, column_ids: Vec<ColumnId>) -> Self {
        self.placements_by_adapter.insert(adapter_id, column_ids);
        self
    }

    /// Ids of all adapters holding at least one column of this table.
    pub fn hosting_adapters(&self) -> Vec<AdapterId> {
        self.placements_by_adapter.keys().copied().collect()
    }
}

/// Read access to the catalog, as the router needs it.
pub trait Catalog: Send + Sync {
    /// Look up an adapter by id.
    fn adapter(&self, id: AdapterId) -> Option<Adapter>;

    /// All registered adapters.
    fn adapters(&self) -> Vec<Adapter>;

    /// All writable data stores.
    fn stores(&self) -> Vec<Adapter> {
        self.adapters().into_iter().filter(|a| a.is_store()).collect()
    }

    /// Look up a table by id.
    fn table(&self, id: TableId) -> Option<CatalogTable>;

    /// The column placements of a table on one adapter.
    fn column_placements_on_adapter(
        &self,
        adapter_id: AdapterId,
        table_id: TableId,
    ) -> Vec<ColumnPlacement>;
}

/// In-process catalog backed by plain maps.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    adapters: RwLock<BTreeMap<AdapterId, Adapter>>,
    tables: RwLock<BTreeMap<TableId, CatalogTable>>,
}

impl MemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter.
    pub fn register_adapter(&self, adapter: Adapter) {
        self.adapters.write().insert(adapter.id, adapter);
    }

    /// Register a table. Every placement must reference a known adapter.
    pub fn register_table(&self, table: CatalogTable) -> Result<()> {
        let adapters = self.adapters.read();
        for adapter_id in table.placements_by_adapter.keys() {
            if !adapters.contains_key(adapter_id) {
                return Err(RouterError::catalog(format!(
                    "table '{}' references unknown adapter {}",
                    table.name, adapter_id
                )));
            }
        }
        drop(adapters);
        self.tables.write().insert(table.id, table);
        Ok(())
    }

    /// Replace a table's placement map (used when placements are dropped).
    pub fn update_table(&self, table: CatalogTable) {
        self.tables.write().insert(table.id, table);
    }
}

impl Catalog for MemoryCatalog {
    fn adapter(&self, id: AdapterId) -> Option<Adapter> {
        self.adapters.read().get(&id).cloned()
    }

    fn adapters(&self) -> Vec<Adapter> {
        self.adapters.read().values().cloned().collect()
    }

    fn table(&self, id: TableId) -> Option<CatalogTable> {
        self.tables.read().get(&id).cloned()
    }

    fn column_placements_on_adapter(
        &self,
        adapter_id: AdapterId,
        table_id: TableId,
    ) -> Vec<ColumnPlacement> {
        let tables = self.tables.read();
        let Some(table) = tables.get(&table_id) else {
            return vec![];
        };
        table
            .placements_by_adapter
            .get(&adapter_id)
            .map(|columns| {
                columns
                    .iter()
                    .map(|&column_id| ColumnPlacement {
                        adapter_id,
                        table_id,
                        column_id,
                        physical_name: format!("col{}", column_id),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let catalog = MemoryCatalog::new();
        catalog.register_adapter(Adapter::new(1, "pg0", AdapterKind::Store));
        catalog.register_adapter(Adapter::new(2, "chain0", AdapterKind::Source));

        let table = CatalogTable::new(10, "users", vec![100, 101])
            .with_placement(1, vec![100, 101]);
        catalog.register_table(table).unwrap();

        assert_eq!(catalog.adapter(1).unwrap().unique_name, "pg0");
        assert_eq!(catalog.table(10).unwrap().name, "users");
        assert_eq!(catalog.stores().len(), 1);
    }

    #[test]
    fn test_register_table_unknown_adapter() {
        let catalog = MemoryCatalog::new();
        let table = CatalogTable::new(10, "users", vec![100]).with_placement(7, vec![100]);
        assert!(catalog.register_table(table).is_err());
    }

    #[test]
    fn test_column_placements_follow_table_order() {
        let catalog = MemoryCatalog::new();
        catalog.register_adapter(Adapter::new(1, "pg0", AdapterKind::Store));
        let table = CatalogTable::new(10, "users", vec![100, 101])
            .with_placement(1, vec![100, 101]);
        catalog.register_table(table).unwrap();

        let placements = catalog.column_placements_on_adapter(1, 10);
        assert_eq!(placements.len(), 2);
        assert_eq!(placements[0].column_id, 100);
        assert_eq!(placements[1].column_id, 101);
    }
}
