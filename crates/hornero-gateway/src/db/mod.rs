//! Persistence for tenants, principals and tenant-owned records.
//!
//! In-memory backends are always available. PostgreSQL backends are built
//! with the `persistence-sqlx` feature.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use hornero_core::{Principal, PrincipalId, Tenant, TenantId};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::auth::{AuthError, PrincipalDirectory};
use crate::tenancy::{ResolveError, TenantRegistry};

#[cfg(feature = "persistence-sqlx")]
mod sqlx_backend;
#[cfg(feature = "persistence-sqlx")]
pub use sqlx_backend::{SqlxPrincipalDirectory, SqlxStore, SqlxTenantRegistry};

/// Database connection pool type used by gateway persistence.
#[cfg(feature = "persistence-sqlx")]
pub type DatabasePool = sqlx::PgPool;

/// Placeholder pool type when SQLx persistence is disabled.
#[cfg(not(feature = "persistence-sqlx"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct DatabasePool;

/// SQL schema for the `panaderias` (tenants) table.
pub const TENANTS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS panaderias (
    id BIGSERIAL PRIMARY KEY,
    nombre TEXT NOT NULL,
    subdominio TEXT NOT NULL UNIQUE,
    activo BOOLEAN NOT NULL DEFAULT TRUE,
    plan TEXT NOT NULL DEFAULT 'basico',
    suscripcion_vence TIMESTAMPTZ
);"#;

/// SQL schema for the `usuarios` table.
pub const USERS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS usuarios (
    id BIGSERIAL PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    email TEXT,
    rol TEXT NOT NULL,
    panaderia_id BIGINT REFERENCES panaderias(id),
    activo BOOLEAN NOT NULL DEFAULT TRUE
);"#;

/// SQL schema for the `proveedores` table.
pub const SUPPLIERS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS proveedores (
    id BIGSERIAL PRIMARY KEY,
    panaderia_id BIGINT NOT NULL REFERENCES panaderias(id),
    nombre TEXT NOT NULL,
    contacto TEXT,
    telefono TEXT,
    email TEXT,
    activo BOOLEAN NOT NULL DEFAULT TRUE
);"#;

/// SQL schema for the tenant-exempt `planes` table.
pub const PLANS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS planes (
    id BIGSERIAL PRIMARY KEY,
    nombre TEXT NOT NULL UNIQUE,
    precio_mensual DOUBLE PRECISION NOT NULL DEFAULT 0
);"#;

/// SQL schema for the `productos` table.
pub const PRODUCTS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS productos (
    id BIGSERIAL PRIMARY KEY,
    panaderia_id BIGINT NOT NULL REFERENCES panaderias(id),
    nombre TEXT NOT NULL,
    precio_venta DOUBLE PRECISION NOT NULL DEFAULT 0,
    codigo_barras TEXT,
    activo BOOLEAN NOT NULL DEFAULT TRUE
);"#;

/// SQL schema for the `materias_primas` table.
pub const RAW_MATERIALS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS materias_primas (
    id BIGSERIAL PRIMARY KEY,
    panaderia_id BIGINT NOT NULL REFERENCES panaderias(id),
    nombre TEXT NOT NULL,
    unidad_medida TEXT NOT NULL,
    stock_actual DOUBLE PRECISION NOT NULL DEFAULT 0,
    stock_minimo DOUBLE PRECISION NOT NULL DEFAULT 0
);"#;

/// SQL schema for the `ventas` table.
pub const SALES_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ventas (
    id BIGSERIAL PRIMARY KEY,
    panaderia_id BIGINT NOT NULL REFERENCES panaderias(id),
    total DOUBLE PRECISION NOT NULL,
    metodo_pago TEXT NOT NULL,
    usuario_id BIGINT NOT NULL REFERENCES usuarios(id),
    fecha_hora TIMESTAMPTZ DEFAULT now()
);"#;

/// SQL schema for the `gastos` table.
pub const EXPENSES_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS gastos (
    id BIGSERIAL PRIMARY KEY,
    panaderia_id BIGINT NOT NULL REFERENCES panaderias(id),
    descripcion TEXT NOT NULL,
    categoria TEXT NOT NULL,
    monto DOUBLE PRECISION NOT NULL
);"#;

/// Every table the gateway creates, in dependency order.
pub const TABLE_SCHEMAS: [(&str, &str); 8] = [
    ("panaderias", TENANTS_TABLE_SCHEMA),
    ("usuarios", USERS_TABLE_SCHEMA),
    ("proveedores", SUPPLIERS_TABLE_SCHEMA),
    ("planes", PLANS_TABLE_SCHEMA),
    ("productos", PRODUCTS_TABLE_SCHEMA),
    ("materias_primas", RAW_MATERIALS_TABLE_SCHEMA),
    ("ventas", SALES_TABLE_SCHEMA),
    ("gastos", EXPENSES_TABLE_SCHEMA),
];

/// Error type returned by pool and schema setup.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database query failed.
    #[cfg(feature = "persistence-sqlx")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// SQLx persistence feature is disabled.
    #[error("persistence-sqlx feature is disabled")]
    SqlxDisabled,
}

/// Create a PostgreSQL connection pool for gateway persistence.
#[cfg(feature = "persistence-sqlx")]
pub async fn init_pool(database_url: &str) -> Result<DatabasePool, RepositoryError> {
    Ok(sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?)
}

/// Create a PostgreSQL connection pool for gateway persistence.
#[cfg(not(feature = "persistence-sqlx"))]
pub async fn init_pool(_database_url: &str) -> Result<DatabasePool, RepositoryError> {
    Err(RepositoryError::SqlxDisabled)
}

/// Initialize required tables if they do not exist.
#[cfg(feature = "persistence-sqlx")]
pub async fn initialize_schema(pool: &DatabasePool) -> Result<(), RepositoryError> {
    for (_, schema) in TABLE_SCHEMAS {
        sqlx::query(schema).execute(pool).await?;
    }
    Ok(())
}

/// Initialize required tables if they do not exist.
#[cfg(not(feature = "persistence-sqlx"))]
pub async fn initialize_schema(_pool: &DatabasePool) -> Result<(), RepositoryError> {
    Err(RepositoryError::SqlxDisabled)
}

/// In-memory [`TenantRegistry`].
#[derive(Debug, Clone, Default)]
pub struct MemoryTenantRegistry {
    tenants: Arc<RwLock<BTreeMap<TenantId, Tenant>>>,
}

impl MemoryTenantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenants(tenants: impl IntoIterator<Item = Tenant>) -> Self {
        let tenants = tenants.into_iter().map(|t| (t.id, t)).collect();
        Self {
            tenants: Arc::new(RwLock::new(tenants)),
        }
    }

    pub async fn upsert(&self, tenant: Tenant) {
        self.tenants.write().await.insert(tenant.id, tenant);
    }
}

#[async_trait]
impl TenantRegistry for MemoryTenantRegistry {
    async fn find_active(&self, identifier: &str) -> Result<Option<Tenant>, ResolveError> {
        Ok(self
            .tenants
            .read()
            .await
            .values()
            .find(|tenant| tenant.is_active && tenant.matches_identifier(identifier))
            .cloned())
    }

    async fn get(&self, id: TenantId) -> Result<Option<Tenant>, ResolveError> {
        Ok(self.tenants.read().await.get(&id).cloned())
    }
}

/// In-memory [`PrincipalDirectory`].
#[derive(Debug, Clone, Default)]
pub struct MemoryPrincipalDirectory {
    principals: Arc<RwLock<BTreeMap<PrincipalId, Principal>>>,
}

impl MemoryPrincipalDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_principals(principals: impl IntoIterator<Item = Principal>) -> Self {
        let principals = principals.into_iter().map(|p| (p.id, p)).collect();
        Self {
            principals: Arc::new(RwLock::new(principals)),
        }
    }

    pub async fn upsert(&self, principal: Principal) {
        self.principals.write().await.insert(principal.id, principal);
    }
}

#[async_trait]
impl PrincipalDirectory for MemoryPrincipalDirectory {
    async fn find(&self, id: PrincipalId) -> Result<Option<Principal>, AuthError> {
        Ok(self.principals.read().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hornero_core::Role;

    fn tenant(id: i64, slug: &str) -> Tenant {
        Tenant::new(TenantId::new(id), format!("Panadería {slug}"), slug.to_string()).unwrap()
    }

    #[test]
    fn registry_finds_active_tenants_by_slug_or_id() {
        let registry = MemoryTenantRegistry::with_tenants(vec![
            tenant(3, "sol"),
            tenant(8, "cerrada").active(false),
        ]);

        tokio_test::block_on(async {
            assert_eq!(registry.find_active("sol").await.unwrap().unwrap().id, TenantId::new(3));
            assert_eq!(registry.find_active("3").await.unwrap().unwrap().subdomain, "sol");
            assert!(registry.find_active("cerrada").await.unwrap().is_none());
            assert!(registry.find_active("8").await.unwrap().is_none());
            assert!(!registry.get(TenantId::new(8)).await.unwrap().unwrap().is_active);
        });
    }

    #[test]
    fn every_registered_table_has_a_schema() {
        let registry = hornero_core::entities::bakery_registry().unwrap();
        for info in registry.tables() {
            let schema = TABLE_SCHEMAS
                .iter()
                .find(|(table, _)| *table == info.table)
                .map(|(_, sql)| *sql);
            assert!(
                schema.is_some_and(|sql| sql.contains(&format!("EXISTS {} (", info.table))),
                "no schema for {}",
                info.table
            );
        }
    }

    #[test]
    fn directory_returns_stored_principals() {
        let directory = MemoryPrincipalDirectory::with_principals(vec![Principal::new(
            PrincipalId::new(7),
            "marta",
            Role::Manager,
        )
        .with_tenant(TenantId::new(3))]);

        tokio_test::block_on(async {
            let found = directory.find(PrincipalId::new(7)).await.unwrap().unwrap();
            assert_eq!(found.tenant_id, Some(TenantId::new(3)));
            assert!(directory.find(PrincipalId::new(8)).await.unwrap().is_none());
        });
    }

    #[cfg(not(feature = "persistence-sqlx"))]
    #[tokio::test]
    async fn pool_requires_feature() {
        assert!(matches!(
            init_pool("postgres://localhost/hornero").await,
            Err(RepositoryError::SqlxDisabled)
        ));
    }
}
