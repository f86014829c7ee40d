//! PostgreSQL backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hornero_core::query::{is_valid_identifier, Statement, StatementKind, Value};
use hornero_core::scope::{RecordId, Row, Store};
use hornero_core::{Plan, Principal, PrincipalId, Role, StoreError, Tenant, TenantId};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row as _};

use super::DatabasePool;
use crate::auth::{AuthError, PrincipalDirectory};
use crate::tenancy::{ResolveError, TenantRegistry};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

fn bind<'q>(query: PgQuery<'q>, value: &'q Value) -> PgQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.as_str()),
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn expect_kind(statement: &Statement, kinds: &[StatementKind]) -> Result<(), StoreError> {
    if kinds.contains(&statement.kind()) {
        Ok(())
    } else {
        Err(StoreError::UnsupportedStatement(statement.kind().as_str()))
    }
}

fn json_row(row: &PgRow) -> Result<Row, StoreError> {
    match row.try_get::<serde_json::Value, _>("row").map_err(backend)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(StoreError::Decode(format!("expected a JSON object, got {other}"))),
    }
}

/// [`Store`] over PostgreSQL. Rows travel as `to_jsonb` objects so the
/// scoping layer sees the same shape as with the in-memory store.
#[derive(Debug, Clone)]
pub struct SqlxStore {
    pool: DatabasePool,
}

impl SqlxStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for SqlxStore {
    async fn fetch(&self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        expect_kind(statement, &[StatementKind::Select])?;
        let (sql, params) = statement.to_sql();
        let sql = format!("SELECT to_jsonb(t) AS row FROM ({sql}) AS t");
        tracing::trace!(%sql, entity = statement.entity(), "fetch");

        let rows = params
            .iter()
            .fold(sqlx::query(&sql), bind)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.iter().map(json_row).collect()
    }

    async fn insert(&self, statement: &Statement) -> Result<RecordId, StoreError> {
        expect_kind(statement, &[StatementKind::Insert])?;
        let (sql, params) = statement.to_sql();
        tracing::trace!(%sql, entity = statement.entity(), "insert");

        let row = params
            .iter()
            .fold(sqlx::query(&sql), bind)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        row.try_get::<i64, _>("id").map_err(backend)
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, StoreError> {
        expect_kind(statement, &[StatementKind::Update, StatementKind::Delete])?;
        let (sql, params) = statement.to_sql();
        tracing::trace!(%sql, entity = statement.entity(), "execute");

        let result = params
            .iter()
            .fold(sqlx::query(&sql), bind)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected())
    }

    async fn fetch_raw(&self, table: &str, id: RecordId) -> Result<Option<Row>, StoreError> {
        if !is_valid_identifier(table) {
            return Err(StoreError::Backend(format!("invalid table name '{table}'")));
        }
        let sql = format!("SELECT to_jsonb(t) AS row FROM {table} AS t WHERE t.id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.as_ref().map(json_row).transpose()
    }
}

const TENANT_COLUMNS: &str = "id, nombre, subdominio, activo, plan, suscripcion_vence";

fn registry_error(err: impl std::fmt::Display) -> ResolveError {
    ResolveError::Registry(err.to_string())
}

fn tenant_from_row(row: &PgRow) -> Result<Tenant, ResolveError> {
    let id: i64 = row.try_get("id").map_err(registry_error)?;
    let name: String = row.try_get("nombre").map_err(registry_error)?;
    let subdomain: String = row.try_get("subdominio").map_err(registry_error)?;
    let active: bool = row.try_get("activo").map_err(registry_error)?;
    let plan: String = row.try_get("plan").map_err(registry_error)?;
    let expires: Option<DateTime<Utc>> = row.try_get("suscripcion_vence").map_err(registry_error)?;

    let plan: Plan = plan.parse().map_err(registry_error)?;
    let tenant = Tenant::new(TenantId::new(id), name, subdomain)
        .map_err(registry_error)?
        .active(active)
        .with_plan(plan);
    Ok(match expires {
        Some(at) => tenant.expires_at(at),
        None => tenant,
    })
}

#[derive(Debug, Clone)]
pub struct SqlxTenantRegistry {
    pool: DatabasePool,
}

impl SqlxTenantRegistry {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantRegistry for SqlxTenantRegistry {
    async fn find_active(&self, identifier: &str) -> Result<Option<Tenant>, ResolveError> {
        let sql = format!(
            "SELECT {TENANT_COLUMNS} FROM panaderias \
             WHERE activo AND (lower(subdominio) = lower($1) OR id::text = $1) LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(identifier.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(registry_error)?;
        row.as_ref().map(tenant_from_row).transpose()
    }

    async fn get(&self, id: TenantId) -> Result<Option<Tenant>, ResolveError> {
        let sql = format!("SELECT {TENANT_COLUMNS} FROM panaderias WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(registry_error)?;
        row.as_ref().map(tenant_from_row).transpose()
    }
}

#[derive(Debug, Clone)]
pub struct SqlxPrincipalDirectory {
    pool: DatabasePool,
}

impl SqlxPrincipalDirectory {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn directory_error(err: impl std::fmt::Display) -> AuthError {
    AuthError::Directory(err.to_string())
}

#[async_trait]
impl PrincipalDirectory for SqlxPrincipalDirectory {
    async fn find(&self, id: PrincipalId) -> Result<Option<Principal>, AuthError> {
        let row = sqlx::query(
            "SELECT id, username, email, rol, panaderia_id, activo FROM usuarios WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(directory_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let username: String = row.try_get("username").map_err(directory_error)?;
        let email: Option<String> = row.try_get("email").map_err(directory_error)?;
        let role: String = row.try_get("rol").map_err(directory_error)?;
        let tenant: Option<i64> = row.try_get("panaderia_id").map_err(directory_error)?;
        let active: bool = row.try_get("activo").map_err(directory_error)?;

        let role: Role = role.parse().map_err(directory_error)?;
        let mut principal = Principal::new(id, username, role).active(active);
        if let Some(email) = email {
            principal = principal.with_email(email);
        }
        if let Some(tenant) = tenant.filter(|t| *t > 0) {
            principal = principal.with_tenant(TenantId::new(tenant));
        }
        Ok(Some(principal))
    }
}
