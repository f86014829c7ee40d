//! Shared, read-only application state.

use std::sync::Arc;

use hornero_core::entities::bakery_registry;
use hornero_core::scope::{EntityRegistry, Store};
use hornero_core::SuperAdminPolicy;

use crate::auth::tenant::LocalHosts;
use crate::auth::{JwtConfig, PrincipalDirectory};
use crate::config::{ConfigError, GatewayConfig};
use crate::tenancy::{TenantRegistry, TenantResolver};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tenants: Arc<dyn TenantRegistry>,
    pub principals: Arc<dyn PrincipalDirectory>,
    pub entities: Arc<EntityRegistry>,
    pub policy: Arc<SuperAdminPolicy>,
    pub local_hosts: Arc<LocalHosts>,
    pub jwt: Arc<JwtConfig>,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    /// Validates `config` and wires the backends together.
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn Store>,
        tenants: Arc<dyn TenantRegistry>,
        principals: Arc<dyn PrincipalDirectory>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let policy = config.super_admin_policy()?;
        let jwt = JwtConfig::new(&config.jwt_secret, config.jwt_issuer.clone())
            .with_expiry(config.session_ttl_secs);
        let entities = bakery_registry().map_err(|err| ConfigError::Entities(err.to_string()))?;

        Ok(Self {
            store,
            tenants,
            principals,
            entities: Arc::new(entities),
            policy: Arc::new(policy),
            local_hosts: Arc::new(config.local_hosts()),
            jwt: Arc::new(jwt),
            config: Arc::new(config),
        })
    }

    pub fn resolver(&self) -> TenantResolver<'_> {
        TenantResolver::new(self.tenants.as_ref(), &self.policy, &self.local_hosts)
    }
}
