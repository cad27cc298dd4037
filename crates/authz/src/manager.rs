//! Collaborator surface: the policy engine and the security context.
//!
//! The decision layer never evaluates policy itself. It binds to an
//! [`AuthorizationManager`] through the per-deployment
//! [`SecurityContext`] and treats the engine's two failure channels
//! differently: authorization-domain failures fail closed, anything else
//! propagates.

use std::sync::Arc;

use thiserror::Error;

use webgate_core::{CallerSubject, RoleGroup};

use crate::resource::WebResource;
use crate::verdict::Verdict;

/// Domain failure raised by the engine while evaluating a resource
/// (missing policy, unresolvable role reference, ...). Always interpreted
/// as a denial by the decision layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct AuthorizationFailure {
    reason: String,
}

impl AuthorizationFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Failure channels of [`AuthorizationManager::authorize`].
///
/// The split is deliberate: only [`EngineError::Authorization`] may be
/// folded into a `false` decision. An infrastructure fault (interrupted
/// backend, broken store) must surface to the caller, never masquerade
/// as a policy denial.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("authorization failure: {0}")]
    Authorization(#[from] AuthorizationFailure),

    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

/// Policy engine contract.
///
/// Given a resource, the caller's subject, and the roles the identity
/// layer attributes to that subject, the engine returns a [`Verdict`] or
/// fails through one of the two [`EngineError`] channels. Implementations
/// must be shareable across threads; the decision layer invokes them
/// concurrently from many request threads.
pub trait AuthorizationManager: Send + Sync {
    /// Resolve the role group of `subject`. The callback hands the engine
    /// access to the ambient security context; it is allocated fresh for
    /// every check and never cached.
    fn subject_roles(
        &self,
        subject: Option<&CallerSubject>,
        callback: &SecurityContextCallback<'_>,
    ) -> RoleGroup;

    /// Evaluate `resource` for `subject` holding `roles`.
    fn authorize(
        &self,
        resource: &WebResource,
        subject: Option<&CallerSubject>,
        roles: &RoleGroup,
    ) -> Result<Verdict, EngineError>;
}

impl<M> AuthorizationManager for Arc<M>
where
    M: AuthorizationManager + ?Sized,
{
    fn subject_roles(
        &self,
        subject: Option<&CallerSubject>,
        callback: &SecurityContextCallback<'_>,
    ) -> RoleGroup {
        (**self).subject_roles(subject, callback)
    }

    fn authorize(
        &self,
        resource: &WebResource,
        subject: Option<&CallerSubject>,
        roles: &RoleGroup,
    ) -> Result<Verdict, EngineError> {
        (**self).authorize(resource, subject, roles)
    }
}

/// Per-deployment security binding: the security-domain name and the
/// engine evaluating policy for that domain.
///
/// An unbound engine (`authorization_manager() == None`) is a deployment
/// configuration bug, which the checks surface as an error rather than a
/// denial.
pub struct SecurityContext {
    security_domain: String,
    authorization_manager: Option<Arc<dyn AuthorizationManager>>,
}

impl SecurityContext {
    /// A context with no engine bound. Checks against it fail loudly.
    pub fn unbound(security_domain: impl Into<String>) -> Self {
        Self {
            security_domain: security_domain.into(),
            authorization_manager: None,
        }
    }

    pub fn new(
        security_domain: impl Into<String>,
        authorization_manager: Arc<dyn AuthorizationManager>,
    ) -> Self {
        Self {
            security_domain: security_domain.into(),
            authorization_manager: Some(authorization_manager),
        }
    }

    pub fn security_domain(&self) -> &str {
        &self.security_domain
    }

    pub fn authorization_manager(&self) -> Option<&Arc<dyn AuthorizationManager>> {
        self.authorization_manager.as_ref()
    }
}

impl core::fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SecurityContext")
            .field("security_domain", &self.security_domain)
            .field("bound", &self.authorization_manager.is_some())
            .finish()
    }
}

/// Hands the engine access to the security context of the check in
/// flight (role resolution may need the domain or deployment state).
///
/// Allocated per call on purpose: it captures the context current at the
/// moment of the check, never a stale one.
#[derive(Debug, Clone, Copy)]
pub struct SecurityContextCallback<'a> {
    context: &'a SecurityContext,
}

impl<'a> SecurityContextCallback<'a> {
    pub fn new(context: &'a SecurityContext) -> Self {
        Self { context }
    }

    pub fn security_domain(&self) -> &str {
        self.context.security_domain()
    }

    pub fn context(&self) -> &SecurityContext {
        self.context
    }
}
