//! Tenant domain model for Hornero.
//!
//! A tenant is one bakery ("panadería"). Tenants are provisioned outside this
//! crate and referenced by id; they are never deleted in normal operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TenantError {
    #[error("tenant name cannot be empty")]
    EmptyName,
    #[error("tenant subdomain cannot be empty")]
    EmptySubdomain,
    #[error("tenant subdomain contains invalid characters: {0}")]
    InvalidSubdomain(String),
    #[error("invalid tenant id: {0}")]
    InvalidId(String),
    #[error("unknown plan: {0}")]
    UnknownPlan(String),
}

/// Numeric tenant identifier, stored in the `panaderia_id` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(i64);

impl TenantId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    /// Parses a decimal id. Zero and negative values are rejected.
    pub fn parse(s: &str) -> Result<Self, TenantError> {
        let trimmed = s.trim();
        match trimmed.parse::<i64>() {
            Ok(id) if id > 0 => Ok(Self(id)),
            _ => Err(TenantError::InvalidId(trimmed.to_string())),
        }
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TenantId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Basico,
    Profesional,
    Empresarial,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Basico => "basico",
            Plan::Profesional => "profesional",
            Plan::Empresarial => "empresarial",
        }
    }
}

impl std::str::FromStr for Plan {
    type Err = TenantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basico" => Ok(Plan::Basico),
            "profesional" => Ok(Plan::Profesional),
            "empresarial" => Ok(Plan::Empresarial),
            other => Err(TenantError::UnknownPlan(other.to_string())),
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub subdomain: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub plan: Plan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_expires_at: Option<DateTime<Utc>>,
}

impl Tenant {
    pub fn new(id: TenantId, name: String, subdomain: String) -> Result<Self, TenantError> {
        Self::validate_name(&name)?;
        Self::validate_subdomain(&subdomain)?;
        Ok(Self {
            id,
            name,
            subdomain,
            is_active: true,
            plan: Plan::default(),
            subscription_expires_at: None,
        })
    }

    pub fn active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plan = plan;
        self
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.subscription_expires_at = Some(at);
        self
    }

    /// A tenant without an expiry date is on an open-ended subscription.
    pub fn is_subscription_current(&self, now: DateTime<Utc>) -> bool {
        self.subscription_expires_at.map_or(true, |at| now < at)
    }

    /// Whether `identifier` names this tenant, either by subdomain or by id.
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        let identifier = identifier.trim();
        self.subdomain.eq_ignore_ascii_case(identifier)
            || TenantId::parse(identifier).is_ok_and(|id| id == self.id)
    }

    fn validate_name(name: &str) -> Result<(), TenantError> {
        if name.trim().is_empty() {
            return Err(TenantError::EmptyName);
        }
        Ok(())
    }

    fn validate_subdomain(subdomain: &str) -> Result<(), TenantError> {
        if subdomain.trim().is_empty() {
            return Err(TenantError::EmptySubdomain);
        }
        let valid = subdomain
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid {
            return Err(TenantError::InvalidSubdomain(subdomain.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> Tenant {
        Tenant::new(TenantId::new(3), "Panadería La Espiga".to_string(), "la-espiga".to_string())
            .unwrap()
    }

    #[test]
    fn tenant_id_parses_positive_integers() {
        assert_eq!(TenantId::parse("42").unwrap(), TenantId::new(42));
        assert_eq!(TenantId::parse(" 7 ").unwrap(), TenantId::new(7));
    }

    #[test]
    fn tenant_id_rejects_zero_negative_and_garbage() {
        assert!(matches!(TenantId::parse("0"), Err(TenantError::InvalidId(_))));
        assert!(matches!(TenantId::parse("-3"), Err(TenantError::InvalidId(_))));
        assert!(matches!(TenantId::parse("la-espiga"), Err(TenantError::InvalidId(_))));
    }

    #[test]
    fn tenant_creates_active_on_basic_plan() {
        let tenant = sample();
        assert!(tenant.is_active);
        assert_eq!(tenant.plan, Plan::Basico);
        assert!(tenant.subscription_expires_at.is_none());
    }

    #[test]
    fn tenant_rejects_empty_name() {
        let result = Tenant::new(TenantId::new(1), " ".to_string(), "slug".to_string());
        assert_eq!(result, Err(TenantError::EmptyName));
    }

    #[test]
    fn tenant_rejects_invalid_subdomain_characters() {
        let result = Tenant::new(TenantId::new(1), "Name".to_string(), "La Espiga!".to_string());
        assert!(matches!(result, Err(TenantError::InvalidSubdomain(_))));
    }

    #[test]
    fn tenant_matches_by_subdomain_or_id() {
        let tenant = sample();
        assert!(tenant.matches_identifier("la-espiga"));
        assert!(tenant.matches_identifier("LA-ESPIGA"));
        assert!(tenant.matches_identifier("3"));
        assert!(!tenant.matches_identifier("4"));
        assert!(!tenant.matches_identifier("otra"));
    }

    #[test]
    fn subscription_expiry_is_exclusive() {
        let now = Utc::now();
        let tenant = sample().expires_at(now);
        assert!(!tenant.is_subscription_current(now));
        assert!(tenant.is_subscription_current(now - Duration::seconds(1)));
        assert!(sample().is_subscription_current(now));
    }

    #[test]
    fn plan_parses_known_names() {
        assert_eq!("empresarial".parse::<Plan>().unwrap(), Plan::Empresarial);
        assert!(matches!("gold".parse::<Plan>(), Err(TenantError::UnknownPlan(_))));
    }

    #[test]
    fn tenant_serializes_to_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["subdomain"], "la-espiga");
        assert_eq!(json["isActive"], true);
        assert_eq!(json["plan"], "basico");
        assert!(json.get("subscriptionExpiresAt").is_none());
    }
}
