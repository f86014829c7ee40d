//! Gateway configuration
//!
//! Every setting can be given as a flag or through its `HORNERO_*`
//! environment variable. [`GatewayConfig::validate`] runs once at startup.

use std::net::SocketAddr;

use clap::Parser;
use hornero_core::{PolicyError, SuperAdminPolicy};

use crate::auth::tenant::LocalHosts;

/// Shortest accepted session signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("session secret must be at least {MIN_SECRET_LEN} bytes")]
    WeakSecret,
    #[error("{name} must be an absolute path, got '{value}'")]
    InvalidPath { name: &'static str, value: String },
    #[error("{0} and {1} must be different paths")]
    PathCollision(&'static str, &'static str),
    #[error("session lifetime must be positive")]
    InvalidSessionTtl,
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("entity registry: {0}")]
    Entities(String),
}

#[derive(Debug, Clone, Parser)]
#[command(name = "hornero-gateway", version, about = "Hornero multi-tenant bakery gateway")]
pub struct GatewayConfig {
    /// Socket address to listen on.
    #[arg(long, env = "HORNERO_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: SocketAddr,

    /// PostgreSQL URL. Without it the gateway runs on in-memory stores.
    #[arg(long, env = "HORNERO_DATABASE_URL")]
    pub database_url: Option<String>,

    /// HS256 secret used to sign and verify session tokens.
    #[arg(long, env = "HORNERO_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    #[arg(long, env = "HORNERO_JWT_ISSUER", default_value = "hornero")]
    pub jwt_issuer: String,

    /// Session lifetime in seconds.
    #[arg(long, env = "HORNERO_SESSION_TTL_SECS", default_value_t = 8 * 3600)]
    pub session_ttl_secs: u64,

    /// Extra development hosts that never carry a tenant subdomain.
    #[arg(long, env = "HORNERO_LOCAL_HOSTS", value_delimiter = ',')]
    pub local_hosts: Vec<String>,

    #[arg(long, env = "HORNERO_SUPER_ADMIN_IDS", value_delimiter = ',')]
    pub super_admin_ids: Vec<i64>,

    #[arg(long, env = "HORNERO_SUPER_ADMIN_USERNAMES", value_delimiter = ',')]
    pub super_admin_usernames: Vec<String>,

    /// Email suffixes such as `@hornero.app`.
    #[arg(long, env = "HORNERO_SUPER_ADMIN_EMAIL_SUFFIXES", value_delimiter = ',')]
    pub super_admin_email_suffixes: Vec<String>,

    #[arg(long, env = "HORNERO_LOGIN_PATH", default_value = "/login")]
    pub login_path: String,

    /// Page shown when a request cannot be tied to a tenant.
    #[arg(long, env = "HORNERO_SAFE_PATH", default_value = "/acceso-denegado")]
    pub safe_path: String,

    #[arg(long, env = "HORNERO_EXPIRED_PATH", default_value = "/suscripcion-vencida")]
    pub expired_path: String,

    /// Emit logs as JSON lines.
    #[arg(long, env = "HORNERO_LOG_JSON")]
    pub log_json: bool,
}

impl GatewayConfig {
    /// Configuration for tests and local tooling: defaults plus a secret.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            database_url: None,
            jwt_secret: secret.into(),
            jwt_issuer: "hornero".to_string(),
            session_ttl_secs: 8 * 3600,
            local_hosts: Vec::new(),
            super_admin_ids: Vec::new(),
            super_admin_usernames: Vec::new(),
            super_admin_email_suffixes: Vec::new(),
            login_path: "/login".to_string(),
            safe_path: "/acceso-denegado".to_string(),
            expired_path: "/suscripcion-vencida".to_string(),
            log_json: false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret);
        }
        if self.session_ttl_secs == 0 {
            return Err(ConfigError::InvalidSessionTtl);
        }

        let paths = [
            ("login_path", &self.login_path),
            ("safe_path", &self.safe_path),
            ("expired_path", &self.expired_path),
        ];
        for (name, value) in paths {
            if !value.starts_with('/') || value.starts_with("/api") {
                return Err(ConfigError::InvalidPath {
                    name,
                    value: value.clone(),
                });
            }
        }
        for (i, (a, left)) in paths.iter().enumerate() {
            if let Some((b, _)) = paths[i + 1..].iter().find(|(_, right)| right == left) {
                return Err(ConfigError::PathCollision(*a, *b));
            }
        }
        Ok(())
    }

    /// Builds the super-admin allow-list. Blank list entries are skipped so an
    /// empty environment variable means "none".
    pub fn super_admin_policy(&self) -> Result<SuperAdminPolicy, ConfigError> {
        Ok(SuperAdminPolicy::new(
            self.super_admin_ids.iter().copied(),
            non_blank(&self.super_admin_usernames),
            non_blank(&self.super_admin_email_suffixes),
        )?)
    }

    pub fn local_hosts(&self) -> LocalHosts {
        LocalHosts::new(non_blank(&self.local_hosts))
    }
}

fn non_blank(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}
