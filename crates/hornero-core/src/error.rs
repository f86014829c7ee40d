//! Error types for tenant-scoped data access.

use thiserror::Error;

use crate::context::ContextError;
use crate::tenant::TenantId;

/// A breach (or attempted breach) of tenant isolation.
///
/// Kept apart from ordinary not-found and validation errors so callers and
/// logs can tell isolation failures from business-logic failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TenantSecurityViolation {
    #[error("{entity} #{record_id} belongs to tenant {record_tenant}, not to {context}")]
    ForeignRecord {
        entity: &'static str,
        record_id: i64,
        record_tenant: TenantId,
        context: String,
    },
    #[error("filter on {entity} requests tenant {requested} from a context scoped to tenant {context}")]
    TenantFilterMismatch {
        entity: &'static str,
        requested: String,
        context: TenantId,
    },
    #[error("insert into {entity} targets tenant {requested} from a context scoped to tenant {context}")]
    ForeignTenantInsert {
        entity: &'static str,
        requested: TenantId,
        context: TenantId,
    },
    #[error("the tenant of an existing {entity} record cannot be reassigned")]
    TenantReassignment { entity: &'static str },
    #[error("table '{table}' is neither tenant-owned nor on the exempt allow-list")]
    UnregisteredEntity { table: String },
    #[error("row of tenant-owned {entity} has no readable tenant column")]
    MissingTenantColumn { entity: &'static str },
}

impl TenantSecurityViolation {
    /// Emits the violation on the security log target and returns it.
    pub fn logged(self) -> Self {
        tracing::error!(
            target: "hornero::security",
            kind = self.kind(),
            violation = %self,
            "tenant isolation violation"
        );
        self
    }

    /// Stable label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TenantSecurityViolation::ForeignRecord { .. } => "foreign_record",
            TenantSecurityViolation::TenantFilterMismatch { .. } => "tenant_filter_mismatch",
            TenantSecurityViolation::ForeignTenantInsert { .. } => "foreign_tenant_insert",
            TenantSecurityViolation::TenantReassignment { .. } => "tenant_reassignment",
            TenantSecurityViolation::UnregisteredEntity { .. } => "unregistered_entity",
            TenantSecurityViolation::MissingTenantColumn { .. } => "missing_tenant_column",
        }
    }
}

/// Error reported by a persistence backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),
    #[error("statement kind {0} is not valid for this operation")]
    UnsupportedStatement(&'static str),
    #[error("row decode error: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Violation(#[from] TenantSecurityViolation),
    #[error("{entity} requires an explicit tenant when written by a super-admin")]
    TenantRequired { entity: &'static str },
    #[error("invalid column name: '{0}'")]
    InvalidColumn(String),
    #[error("column '{0}' is managed by the store and cannot be assigned")]
    ReservedColumn(String),
    #[error("unfiltered {kind} on {entity} is not allowed")]
    UnboundedMutation {
        kind: &'static str,
        entity: &'static str,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to decode {entity}: {source}")]
    Decode {
        entity: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ScopeError {
    pub fn is_violation(&self) -> bool {
        matches!(self, ScopeError::Violation(_))
    }

    pub fn as_violation(&self) -> Option<&TenantSecurityViolation> {
        match self {
            ScopeError::Violation(violation) => Some(violation),
            _ => None,
        }
    }
}

/// Result type for scoped data access
pub type ScopeResult<T> = Result<T, ScopeError>;
