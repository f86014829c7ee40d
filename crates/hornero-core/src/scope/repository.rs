//! Typed, tenant-scoped repositories over a [`Store`].

use std::marker::PhantomData;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::{ScopeError, ScopeResult, StoreError, TenantSecurityViolation};
use crate::query::{Assignments, Filter, Statement};
use crate::scope::builder::ScopedQueryBuilder;
use crate::scope::entity::{
    Entity, EntityInfo, EntityRegistry, RecordId, Row, Tenancy, ID_COLUMN, TENANT_COLUMN,
};
use crate::tenant::TenantId;
use crate::verify::OwnershipVerifier;

/// Persistence operations the scoping layer needs from a backend.
///
/// Backends execute statements as given; they must apply the statement's
/// tenant scope together with its predicates.
#[async_trait]
pub trait Store: Send + Sync {
    /// Run a select statement.
    async fn fetch(&self, statement: &Statement) -> Result<Vec<Row>, StoreError>;
    /// Run an insert statement, returning the new primary key.
    async fn insert(&self, statement: &Statement) -> Result<RecordId, StoreError>;
    /// Run an update or delete statement, returning the affected row count.
    async fn execute(&self, statement: &Statement) -> Result<u64, StoreError>;
    /// Load a row by primary key with no tenant constraint at all.
    async fn fetch_raw(&self, table: &str, id: RecordId) -> Result<Option<Row>, StoreError>;
}

pub struct Repository<'a, E, S: ?Sized> {
    store: &'a S,
    builder: ScopedQueryBuilder<'a>,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, E: Entity, S: Store + ?Sized> Repository<'a, E, S> {
    pub fn new(store: &'a S, ctx: &'a RequestContext) -> Self {
        Self {
            store,
            builder: ScopedQueryBuilder::new(ctx),
            _entity: PhantomData,
        }
    }

    pub fn context(&self) -> &'a RequestContext {
        self.builder.context()
    }

    pub async fn list(&self, filter: Filter) -> ScopeResult<Vec<E>> {
        let statement = self.builder.select::<E>(filter)?;
        let rows = self.store.fetch(&statement).await?;
        rows.into_iter().map(|row| self.decode_checked(row)).collect()
    }

    /// Scoped lookup by primary key: a record of another tenant is reported
    /// as absent.
    pub async fn get(&self, id: RecordId) -> ScopeResult<Option<E>> {
        let statement = self.builder.select_by_id::<E>(id)?;
        let mut rows = self.store.fetch(&statement).await?;
        match rows.len() {
            0 => Ok(None),
            _ => self.decode_checked(rows.swap_remove(0)).map(Some),
        }
    }

    pub async fn create(&self, values: Assignments) -> ScopeResult<RecordId> {
        self.create_for(values, None).await
    }

    pub async fn create_for(
        &self,
        values: Assignments,
        tenant: Option<TenantId>,
    ) -> ScopeResult<RecordId> {
        let statement = self.builder.insert::<E>(values, tenant)?;
        let id = self.store.insert(&statement).await?;
        tracing::debug!(entity = E::NAME, id, "record created");
        Ok(id)
    }

    pub async fn update(&self, filter: Filter, values: Assignments) -> ScopeResult<u64> {
        let statement = self.builder.update::<E>(filter, values)?;
        Ok(self.store.execute(&statement).await?)
    }

    pub async fn delete(&self, filter: Filter) -> ScopeResult<u64> {
        let statement = self.builder.delete::<E>(filter)?;
        Ok(self.store.execute(&statement).await?)
    }

    /// Primary-key fetch that bypasses the builder. The id alone proves
    /// nothing about ownership, so the result goes through the verifier
    /// before it is returned.
    pub async fn fetch_by_id_unscoped(&self, id: RecordId) -> ScopeResult<Option<E>> {
        let row = self.store.fetch_raw(E::TABLE, id).await?;
        let record = row.map(|row| decode::<E>(row)).transpose()?;
        OwnershipVerifier::verify(self.context(), record.as_ref())?;
        Ok(record)
    }

    /// Backends are trusted to apply the scope, but a foreign row reaching
    /// this point is a hard failure rather than something to filter out.
    fn decode_checked(&self, row: Row) -> ScopeResult<E> {
        check_row(self.context(), E::info(), &row)?;
        decode::<E>(row)
    }
}

/// Untyped listing of a table named at runtime. The name must be on the
/// allow-list and every row is re-checked like a typed one.
pub async fn list_named<S: Store + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    registry: &EntityRegistry,
    table: &str,
    filter: Filter,
) -> ScopeResult<Vec<Row>> {
    let info = registry.lookup(table)?;
    let statement = ScopedQueryBuilder::new(ctx).select_named(registry, info.table, filter)?;
    let rows = store.fetch(&statement).await?;
    for row in &rows {
        check_row(ctx, info, row)?;
    }
    Ok(rows)
}

fn check_row(
    ctx: &RequestContext,
    info: EntityInfo,
    row: &Row,
) -> Result<(), TenantSecurityViolation> {
    if info.tenancy == Tenancy::Exempt {
        return Ok(());
    }
    let owner = row
        .get(TENANT_COLUMN)
        .and_then(serde_json::Value::as_i64)
        .map(TenantId::new)
        .ok_or_else(|| TenantSecurityViolation::MissingTenantColumn { entity: info.name }.logged())?;
    let id = row
        .get(ID_COLUMN)
        .and_then(serde_json::Value::as_i64)
        .unwrap_or_default();
    OwnershipVerifier::check_owner(ctx, info.name, id, owner)
}

fn decode<E: Entity>(row: Row) -> ScopeResult<E> {
    serde_json::from_value(serde_json::Value::Object(row)).map_err(|source| ScopeError::Decode {
        entity: E::NAME,
        source,
    })
}
