//! In-memory [`Store`] used for development and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::query::{Statement, StatementKind};
use crate::scope::{RecordId, Row, Store, ID_COLUMN};

type Table = BTreeMap<RecordId, Row>;

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, Table>>>,
    operations: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a row as-is, bypassing scoping. Provisioning and tests only.
    /// Rows without a numeric `id` get the next free one.
    pub async fn seed(&self, table: &str, row: serde_json::Value) -> RecordId {
        let mut row = match row {
            serde_json::Value::Object(map) => map,
            other => {
                tracing::warn!(table, value = %other, "ignoring non-object seed row");
                return 0;
            }
        };
        let mut tables = self.tables.write().await;
        let table = tables.entry(table.to_string()).or_default();
        let id = row
            .get(ID_COLUMN)
            .and_then(serde_json::Value::as_i64)
            .unwrap_or_else(|| next_id(table));
        row.insert(ID_COLUMN.to_string(), serde_json::Value::from(id));
        table.insert(id, row);
        id
    }

    /// Every row of a table, ignoring tenants.
    pub async fn dump(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .await
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of statements executed through the [`Store`] interface.
    pub fn operation_count(&self) -> usize {
        self.operations.load(Ordering::Relaxed)
    }

    fn record_operation(&self) {
        self.operations.fetch_add(1, Ordering::Relaxed);
    }
}

fn next_id(table: &Table) -> RecordId {
    table.keys().next_back().map_or(1, |last| last + 1)
}

fn expect_kind(statement: &Statement, kinds: &[StatementKind]) -> Result<(), StoreError> {
    if kinds.contains(&statement.kind()) {
        Ok(())
    } else {
        Err(StoreError::UnsupportedStatement(statement.kind().as_str()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn fetch(&self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        expect_kind(statement, &[StatementKind::Select])?;
        self.record_operation();
        let tables = self.tables.read().await;
        Ok(tables
            .get(statement.table())
            .map(|rows| {
                rows.values()
                    .filter(|row| statement.matches(row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, statement: &Statement) -> Result<RecordId, StoreError> {
        expect_kind(statement, &[StatementKind::Insert])?;
        self.record_operation();
        let mut tables = self.tables.write().await;
        let table = tables.entry(statement.table().to_string()).or_default();
        let id = next_id(table);
        let mut row: Row = statement
            .assignments()
            .iter()
            .map(|(column, value)| (column.to_string(), value.to_json()))
            .collect();
        row.insert(ID_COLUMN.to_string(), serde_json::Value::from(id));
        table.insert(id, row);
        Ok(id)
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, StoreError> {
        expect_kind(statement, &[StatementKind::Update, StatementKind::Delete])?;
        self.record_operation();
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(statement.table()) else {
            return Ok(0);
        };

        let targets: Vec<RecordId> = table
            .iter()
            .filter(|(_, row)| statement.matches(row))
            .map(|(id, _)| *id)
            .collect();

        for id in &targets {
            if statement.kind() == StatementKind::Delete {
                table.remove(id);
            } else if let Some(row) = table.get_mut(id) {
                for (column, value) in statement.assignments().iter() {
                    row.insert(column.to_string(), value.to_json());
                }
            }
        }
        Ok(targets.len() as u64)
    }

    async fn fetch_raw(&self, table: &str, id: RecordId) -> Result<Option<Row>, StoreError> {
        self.record_operation();
        Ok(self
            .tables
            .read()
            .await
            .get(table)
            .and_then(|rows| rows.get(&id))
            .cloned())
    }
}
