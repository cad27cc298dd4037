//! The canonical authorization request handed to the engine.
//!
//! Every check builds one [`WebResource`], passes it to the engine once,
//! and discards it. The builder takes a **snapshot** of the caller's
//! pass-through attributes, so a caller mutating its own map after the
//! check returns can never affect an in-flight decision.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use webgate_core::{CallerSubject, Principal, Role};

/// String tokens engines speaking the legacy map-based contract use for
/// the reserved attributes. The typed slots on [`WebResource`] are the
/// native representation; these constants exist for embedders bridging
/// engines that still key off the map.
pub mod resource_keys {
    pub const ROLENAME: &str = "rolename";
    pub const ROLEREF_PERM_CHECK: &str = "roleRefPermissionCheck";
    pub const PRINCIPAL_ROLES: &str = "principalRoles";
    pub const POLICY_REGISTRATION: &str = "policyRegistration";
}

macro_rules! opaque_handle {
    ($t:ident, $what:literal) => {
        #[doc = concat!("Opaque handle to ", $what, ".")]
        ///
        /// The decision layer never inspects the wrapped value; it is
        /// carried for the engine, which downcasts to whatever concrete
        /// type the embedding container supplies. Cloning is cheap.
        #[derive(Clone)]
        pub struct $t(Arc<dyn Any + Send + Sync>);

        impl $t {
            pub fn new<T: Any + Send + Sync>(value: T) -> Self {
                Self(Arc::new(value))
            }

            pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
                self.0.downcast_ref()
            }
        }

        impl core::fmt::Debug for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(concat!(stringify!($t), "(..)"))
            }
        }
    };
}

opaque_handle!(RequestHandle, "the inbound request");
opaque_handle!(ResponseHandle, "the outbound response");
opaque_handle!(PolicyRegistration, "the engine's policy registration");

/// Canonical description of one authorization request.
///
/// # Invariants
/// - Single-use: built, evaluated once, discarded.
/// - The pass-through attribute map is a snapshot taken at build time.
/// - Only the slots relevant to the check kind are populated; the rest
///   stay `None`.
#[derive(Debug, Clone)]
pub struct WebResource {
    context: HashMap<String, Value>,
    policy_context_id: String,
    servlet_request: Option<RequestHandle>,
    servlet_response: Option<ResponseHandle>,
    canonical_request_uri: Option<String>,
    caller_subject: Option<CallerSubject>,
    principal: Option<Principal>,
    servlet_name: Option<String>,
    role_name: Option<Role>,
    roleref_perm_check: bool,
    principal_roles: Option<HashSet<Principal>>,
    policy_registration: Option<PolicyRegistration>,
}

impl WebResource {
    pub fn builder(policy_context_id: impl Into<String>) -> WebResourceBuilder {
        WebResourceBuilder {
            resource: WebResource {
                context: HashMap::new(),
                policy_context_id: policy_context_id.into(),
                servlet_request: None,
                servlet_response: None,
                canonical_request_uri: None,
                caller_subject: None,
                principal: None,
                servlet_name: None,
                role_name: None,
                roleref_perm_check: false,
                principal_roles: None,
                policy_registration: None,
            },
        }
    }

    /// Pass-through attributes supplied by the embedding application.
    pub fn context(&self) -> &HashMap<String, Value> {
        &self.context
    }

    pub fn policy_context_id(&self) -> &str {
        &self.policy_context_id
    }

    pub fn servlet_request(&self) -> Option<&RequestHandle> {
        self.servlet_request.as_ref()
    }

    pub fn servlet_response(&self) -> Option<&ResponseHandle> {
        self.servlet_response.as_ref()
    }

    pub fn canonical_request_uri(&self) -> Option<&str> {
        self.canonical_request_uri.as_deref()
    }

    pub fn caller_subject(&self) -> Option<&CallerSubject> {
        self.caller_subject.as_ref()
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn servlet_name(&self) -> Option<&str> {
        self.servlet_name.as_deref()
    }

    /// The role under test. Set only for role-reference checks.
    pub fn role_name(&self) -> Option<&Role> {
        self.role_name.as_ref()
    }

    /// True iff this resource was built for a role-reference check.
    pub fn is_roleref_perm_check(&self) -> bool {
        self.roleref_perm_check
    }

    /// Role-bearing principals supplied by the container (role check only).
    pub fn principal_roles(&self) -> Option<&HashSet<Principal>> {
        self.principal_roles.as_ref()
    }

    pub fn policy_registration(&self) -> Option<&PolicyRegistration> {
        self.policy_registration.as_ref()
    }
}

/// Builder for [`WebResource`]. Consumed by `build`, matching the
/// resource's single-use life.
#[derive(Debug)]
pub struct WebResourceBuilder {
    resource: WebResource,
}

impl WebResourceBuilder {
    /// Snapshot the caller's pass-through attributes. The map stays
    /// borrowed by the caller; the resource keeps its own copy.
    pub fn context_snapshot(mut self, attributes: &HashMap<String, Value>) -> Self {
        self.resource.context = attributes.clone();
        self
    }

    pub fn servlet_request(mut self, request: RequestHandle) -> Self {
        self.resource.servlet_request = Some(request);
        self
    }

    pub fn servlet_response(mut self, response: ResponseHandle) -> Self {
        self.resource.servlet_response = Some(response);
        self
    }

    pub fn canonical_request_uri(mut self, uri: impl Into<String>) -> Self {
        self.resource.canonical_request_uri = Some(uri.into());
        self
    }

    pub fn caller_subject(mut self, subject: Option<CallerSubject>) -> Self {
        self.resource.caller_subject = subject;
        self
    }

    pub fn principal(mut self, principal: Option<Principal>) -> Self {
        self.resource.principal = principal;
        self
    }

    pub fn servlet_name(mut self, name: Option<String>) -> Self {
        self.resource.servlet_name = name;
        self
    }

    /// Mark this resource as a role-reference check for `role`.
    pub fn role_under_test(mut self, role: Role) -> Self {
        self.resource.role_name = Some(role);
        self.resource.roleref_perm_check = true;
        self
    }

    pub fn principal_roles(mut self, roles: HashSet<Principal>) -> Self {
        self.resource.principal_roles = Some(roles);
        self
    }

    pub fn policy_registration(mut self, registration: PolicyRegistration) -> Self {
        self.resource.policy_registration = Some(registration);
        self
    }

    pub fn build(self) -> WebResource {
        self.resource
    }
}
