//! Super-admin allow-list.
//!
//! Super-admin status is derived from configuration on every request and is
//! never persisted on the principal. The criteria form a closed set: a
//! reserved principal id, a reserved username, or a reserved email suffix.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::principal::{Principal, PrincipalId, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("reserved super-admin id must be positive, got {0}")]
    NonPositiveId(i64),
    #[error("reserved super-admin username cannot be blank")]
    BlankUsername,
    #[error("reserved email suffix must look like '@domain.tld', got '{0}'")]
    InvalidEmailSuffix(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuperAdminPolicy {
    ids: BTreeSet<PrincipalId>,
    usernames: BTreeSet<String>,
    email_suffixes: BTreeSet<String>,
}

impl SuperAdminPolicy {
    /// Builds and validates a policy. Usernames and suffixes are compared
    /// case-insensitively.
    pub fn new<I, U, E>(ids: I, usernames: U, email_suffixes: E) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = i64>,
        U: IntoIterator<Item = String>,
        E: IntoIterator<Item = String>,
    {
        let mut policy = Self::default();

        for id in ids {
            if id <= 0 {
                return Err(PolicyError::NonPositiveId(id));
            }
            policy.ids.insert(PrincipalId::new(id));
        }

        for username in usernames {
            let username = username.trim().to_ascii_lowercase();
            if username.is_empty() {
                return Err(PolicyError::BlankUsername);
            }
            policy.usernames.insert(username);
        }

        for suffix in email_suffixes {
            let suffix = suffix.trim().to_ascii_lowercase();
            let domain = suffix.strip_prefix('@').unwrap_or_default();
            if domain.is_empty() || !domain.contains('.') || domain.starts_with('.') {
                return Err(PolicyError::InvalidEmailSuffix(suffix));
            }
            policy.email_suffixes.insert(suffix);
        }

        if policy.is_empty() {
            tracing::warn!("super-admin allow-list is empty; cross-tenant access is disabled");
        } else {
            tracing::info!(
                ids = policy.ids.len(),
                usernames = policy.usernames.len(),
                email_suffixes = policy.email_suffixes.len(),
                "super-admin allow-list loaded"
            );
        }

        Ok(policy)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.usernames.is_empty() && self.email_suffixes.is_empty()
    }

    /// Pure check against the allow-list. The stored role is not consulted:
    /// a `super_admin` role outside the allow-list grants nothing.
    pub fn is_super_admin(&self, principal: &Principal) -> bool {
        let matched = self.ids.contains(&principal.id)
            || self
                .usernames
                .contains(&principal.username.trim().to_ascii_lowercase())
            || principal.email.as_deref().is_some_and(|email| {
                let email = email.trim().to_ascii_lowercase();
                self.email_suffixes
                    .iter()
                    .any(|suffix| email.len() > suffix.len() && email.ends_with(suffix.as_str()))
            });

        if !matched && principal.role == Role::SuperAdmin {
            tracing::warn!(
                target: "hornero::security",
                principal_id = %principal.id,
                username = %principal.username,
                "principal carries the super_admin role but is not on the allow-list"
            );
        }

        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::TenantId;

    fn policy() -> SuperAdminPolicy {
        SuperAdminPolicy::new(
            [1],
            ["dev_master".to_string()],
            ["@soporte.hornero.app".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn reserved_id_is_super_admin() {
        let principal = Principal::new(PrincipalId::new(1), "bootstrap", Role::TenantAdmin);
        assert!(policy().is_super_admin(&principal));
    }

    #[test]
    fn reserved_username_matches_case_insensitively() {
        let principal = Principal::new(PrincipalId::new(50), "Dev_Master", Role::Cashier);
        assert!(policy().is_super_admin(&principal));
    }

    #[test]
    fn reserved_email_suffix_is_super_admin() {
        let principal = Principal::new(PrincipalId::new(51), "ana", Role::Manager)
            .with_email("ana@soporte.hornero.app");
        assert!(policy().is_super_admin(&principal));
    }

    #[test]
    fn suffix_alone_is_not_an_email() {
        let principal = Principal::new(PrincipalId::new(52), "x", Role::Manager)
            .with_email("@soporte.hornero.app");
        assert!(!policy().is_super_admin(&principal));
    }

    #[test]
    fn look_alike_username_is_not_super_admin() {
        let principal = Principal::new(PrincipalId::new(53), "dev_master2", Role::Manager)
            .with_tenant(TenantId::new(3));
        assert!(!policy().is_super_admin(&principal));
    }

    #[test]
    fn stored_role_does_not_grant_super_admin() {
        let principal = Principal::new(PrincipalId::new(54), "impostor", Role::SuperAdmin);
        assert!(!policy().is_super_admin(&principal));
    }

    #[test]
    fn empty_policy_grants_nothing() {
        let policy = SuperAdminPolicy::new([], [], []).unwrap();
        assert!(policy.is_empty());
        let principal = Principal::new(PrincipalId::new(1), "dev_master", Role::SuperAdmin);
        assert!(!policy.is_super_admin(&principal));
    }

    #[test]
    fn validation_rejects_bad_entries() {
        assert_eq!(
            SuperAdminPolicy::new([0], [], []),
            Err(PolicyError::NonPositiveId(0))
        );
        assert_eq!(
            SuperAdminPolicy::new([], ["  ".to_string()], []),
            Err(PolicyError::BlankUsername)
        );
        assert!(matches!(
            SuperAdminPolicy::new([], [], ["hornero.app".to_string()]),
            Err(PolicyError::InvalidEmailSuffix(_))
        ));
        assert!(matches!(
            SuperAdminPolicy::new([], [], ["@localhost".to_string()]),
            Err(PolicyError::InvalidEmailSuffix(_))
        ));
    }
}
