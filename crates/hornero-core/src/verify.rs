//! Post-fetch ownership verification.
//!
//! A record fetched by primary key proves nothing about its tenant. Anything
//! that did not come through the scoped query builder must pass through
//! [`OwnershipVerifier::verify`] before it is used or mutated.

use crate::context::RequestContext;
use crate::error::TenantSecurityViolation;
use crate::scope::{Entity, RecordId};
use crate::tenant::TenantId;

pub struct OwnershipVerifier;

impl OwnershipVerifier {
    /// Succeeds for `None`, for super-admin contexts, for exempt entities,
    /// and for records owned by the context tenant.
    pub fn verify<E: Entity>(
        ctx: &RequestContext,
        record: Option<&E>,
    ) -> Result<(), TenantSecurityViolation> {
        let Some(record) = record else {
            return Ok(());
        };
        match record.owner() {
            Some(owner) => Self::check_owner(ctx, E::NAME, record.id(), owner),
            None => Ok(()),
        }
    }

    pub fn check_owner(
        ctx: &RequestContext,
        entity: &'static str,
        record_id: RecordId,
        owner: TenantId,
    ) -> Result<(), TenantSecurityViolation> {
        if ctx.can_see(owner) {
            return Ok(());
        }
        Err(TenantSecurityViolation::ForeignRecord {
            entity,
            record_id,
            record_tenant: owner,
            context: ctx.to_string(),
        }
        .logged())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ResolutionSource;
    use crate::entities::{SubscriptionPlan, Supplier};
    use proptest::prelude::*;

    fn supplier(id: RecordId, owner: i64) -> Supplier {
        Supplier {
            id,
            tenant_id: TenantId::new(owner),
            name: "Molinos del Sur".to_string(),
            contact: None,
            phone: None,
            email: None,
            is_active: true,
        }
    }

    fn tenant(id: i64) -> RequestContext {
        RequestContext::for_tenant(TenantId::new(id), ResolutionSource::AuthenticatedUser)
    }

    #[test]
    fn missing_record_passes() {
        assert!(OwnershipVerifier::verify::<Supplier>(&tenant(3), None).is_ok());
    }

    #[test]
    fn own_record_passes() {
        assert!(OwnershipVerifier::verify(&tenant(3), Some(&supplier(1, 3))).is_ok());
    }

    #[test]
    fn foreign_record_is_a_violation() {
        let err = OwnershipVerifier::verify(&tenant(3), Some(&supplier(42, 5))).unwrap_err();
        assert_eq!(
            err,
            TenantSecurityViolation::ForeignRecord {
                entity: "Supplier",
                record_id: 42,
                record_tenant: TenantId::new(5),
                context: "tenant 3 (via authenticated_user)".to_string(),
            }
        );
    }

    #[test]
    fn super_admin_sees_everything() {
        let ctx = RequestContext::super_admin();
        assert!(OwnershipVerifier::verify(&ctx, Some(&supplier(42, 5))).is_ok());
    }

    #[test]
    fn exempt_records_pass() {
        let plan = SubscriptionPlan {
            id: 1,
            name: "basico".to_string(),
            monthly_price: 0.0,
        };
        assert!(OwnershipVerifier::verify(&tenant(3), Some(&plan)).is_ok());
    }

    proptest! {
        #[test]
        fn verify_rejects_exactly_foreign_records(ctx_tenant in 1i64..50, owner in 1i64..50, id in 1i64..10_000) {
            let result = OwnershipVerifier::verify(&tenant(ctx_tenant), Some(&supplier(id, owner)));
            prop_assert_eq!(result.is_ok(), ctx_tenant == owner);
        }
    }
}
