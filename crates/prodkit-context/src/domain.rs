//! Tenant, account, organization and user contexts.
//!
//! The four contexts are independent: pushing one never changes another,
//! although the request-handling layer usually pushes several together.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The tenant (and optional sub-tenant) a unit of work acts on behalf of.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantContext {
    /// Tenant identifier; selects the storage schema.
    pub tenant_id: Option<String>,
    /// Sub-tenant identifier.
    pub sub_id: Option<String>,
}

impl TenantContext {
    /// Create a tenant context.
    pub fn new(tenant_id: Option<String>, sub_id: Option<String>) -> Self {
        Self { tenant_id, sub_id }
    }

    /// Context for a single tenant with no sub-tenant.
    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            sub_id: None,
        }
    }

    /// Tenant identifier as a string slice.
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }
}

impl fmt::Display for TenantContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<TenantContext tenant_id={:?}, sub_id={:?}>",
            self.tenant_id, self.sub_id
        )
    }
}

scoped_context! {
    /// Ambient tenant for the current task.
    static TENANT_CONTEXT: TenantContext;
}

/// Define a context carrying a single optional identifier.
macro_rules! define_id_context {
    (
        $(#[$meta:meta])*
        $name:ident { $field:ident }, $key:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name {
            /// Identifier, if one is set.
            pub $field: Option<String>,
        }

        impl $name {
            /// Create a context for the given identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self { $field: Some(id.into()) }
            }

            /// The identifier as a string slice.
            pub fn $field(&self) -> Option<&str> {
                self.$field.as_deref()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    concat!("<", stringify!($name), " ", stringify!($field), "={:?}>"),
                    self.$field
                )
            }
        }

        scoped_context! {
            static $key: $name;
        }
    };
}

define_id_context!(
    /// The account the current unit of work operates on.
    AccountContext { account_id },
    ACCOUNT_CONTEXT
);

define_id_context!(
    /// The organization the current unit of work operates on.
    OrganizationContext { organization_id },
    ORGANIZATION_CONTEXT
);

define_id_context!(
    /// The user on whose behalf the current unit of work runs.
    UserContext { user_id },
    USER_CONTEXT
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScopedContext;

    #[test]
    fn test_defaults_are_empty() {
        assert_eq!(TenantContext::current(), TenantContext::default());
        assert_eq!(AccountContext::current().account_id(), None);
        assert_eq!(OrganizationContext::current().organization_id(), None);
        assert_eq!(UserContext::current().user_id(), None);
    }

    #[test]
    fn test_contexts_are_independent() {
        TenantContext::for_tenant("t1").sync_scope(|| {
            UserContext::new("u1").sync_scope(|| {
                assert_eq!(TenantContext::current().tenant_id(), Some("t1"));
                assert_eq!(UserContext::current().user_id(), Some("u1"));
                assert_eq!(AccountContext::current().account_id(), None);

                TenantContext::for_tenant("t2").sync_scope(|| {
                    assert_eq!(TenantContext::current().tenant_id(), Some("t2"));
                    assert_eq!(UserContext::current().user_id(), Some("u1"));
                });
                assert_eq!(TenantContext::current().tenant_id(), Some("t1"));
            });
            assert_eq!(UserContext::current().user_id(), None);
        });
    }

    #[tokio::test]
    async fn test_same_type_different_values_across_tasks() {
        let a = tokio::spawn(OrganizationContext::new("org-a").scope(async {
            tokio::task::yield_now().await;
            OrganizationContext::current()
        }));
        let b = tokio::spawn(OrganizationContext::new("org-b").scope(async {
            tokio::task::yield_now().await;
            OrganizationContext::current()
        }));

        assert_eq!(a.await.unwrap().organization_id(), Some("org-a"));
        assert_eq!(b.await.unwrap().organization_id(), Some("org-b"));
    }

    #[test]
    fn test_display() {
        let tenant = TenantContext::new(Some("t1".into()), None);
        assert_eq!(
            tenant.to_string(),
            r#"<TenantContext tenant_id=Some("t1"), sub_id=None>"#
        );
        assert_eq!(
            AccountContext::new("acc").to_string(),
            r#"<AccountContext account_id=Some("acc")>"#
        );
    }
}
