//! The web-authorization decision helper.
//!
//! One instance is created per security-context binding and holds no
//! per-request state; all three checks are safe to call concurrently.
//! Every check follows the same sequence: validate arguments, build a
//! [`WebResource`], resolve the caller's roles, invoke the engine,
//! translate the verdict, audit, return.
//!
//! - No IO of its own (engine and sink may block)
//! - No panics
//! - No policy logic (the engine decides; this layer marshals)

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::Level;

use webgate_core::{CallerSubject, Principal, Role, RoleGroup};

use crate::audit::{AuditLevel, AuditRecord, AuditSink, CheckKind};
use crate::manager::{
    AuthorizationManager, EngineError, SecurityContext, SecurityContextCallback,
};
use crate::resource::{PolicyRegistration, RequestHandle, ResponseHandle, WebResource};

/// Errors a check surfaces to its caller.
///
/// Only programming and infrastructure faults land here. A policy denial
/// or an authorization-domain failure is *not* an error of the check: it
/// is an `Ok(false)` decision.
#[derive(Debug, Error)]
pub enum CheckError {
    /// A required argument was absent. Raised before any side effect;
    /// no audit record is emitted.
    #[error("required argument missing: {0}")]
    MissingArgument(&'static str),

    /// No engine is bound to the security context. A deployment bug,
    /// not a denial.
    #[error("no authorization manager bound for security domain '{0}'")]
    AuthorizationManagerUnset(String),

    /// The engine failed outside the authorization domain. Propagated so
    /// an infrastructure fault is never mistaken for a policy denial.
    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}

/// Stateless decision helper bound to one security context.
///
/// Composition replaces the abstract-superclass arrangement of classic
/// containers: the audit sink, the audit enable flag, and the policy
/// registration the engine needs are plain fields here.
pub struct WebAuthorizationHelper {
    security_context: Arc<SecurityContext>,
    audit_sink: Arc<dyn AuditSink>,
    enable_audit: bool,
    policy_registration: PolicyRegistration,
}

impl WebAuthorizationHelper {
    pub fn new(
        security_context: Arc<SecurityContext>,
        audit_sink: Arc<dyn AuditSink>,
        enable_audit: bool,
        policy_registration: PolicyRegistration,
    ) -> Self {
        Self {
            security_context,
            audit_sink,
            enable_audit,
            policy_registration,
        }
    }

    /// May the caller invoke `canonical_request_uri` under this
    /// deployment?
    ///
    /// `caller_subject` may be `None` for an anonymous resource check.
    /// Fail-closed: an authorization-domain failure yields `Ok(false)`.
    pub fn check_resource_permission(
        &self,
        context_attributes: &HashMap<String, Value>,
        request: RequestHandle,
        response: ResponseHandle,
        caller_subject: Option<&CallerSubject>,
        context_id: &str,
        canonical_request_uri: &str,
    ) -> Result<bool, CheckError> {
        if context_id.is_empty() {
            return Err(CheckError::MissingArgument("context_id"));
        }
        if canonical_request_uri.is_empty() {
            return Err(CheckError::MissingArgument("canonical_request_uri"));
        }

        let engine = self.engine()?;
        let resource = WebResource::builder(context_id)
            .context_snapshot(context_attributes)
            .servlet_request(request)
            .servlet_response(response)
            .caller_subject(caller_subject.cloned())
            .canonical_request_uri(canonical_request_uri)
            .build();

        let roles = self.resolve_roles(engine.as_ref(), caller_subject);
        self.decide(
            CheckKind::ResourcePermission,
            engine.as_ref(),
            resource,
            caller_subject,
            &roles,
        )
    }

    /// Does the caller hold `role_name` (role-reference check), possibly
    /// scoped to `servlet_name`?
    pub fn has_role(
        &self,
        role_name: &str,
        principal: Option<&Principal>,
        servlet_name: Option<&str>,
        principal_roles: &HashSet<Principal>,
        context_id: &str,
        caller_subject: &CallerSubject,
    ) -> Result<bool, CheckError> {
        if role_name.is_empty() {
            return Err(CheckError::MissingArgument("role_name"));
        }
        if context_id.is_empty() {
            return Err(CheckError::MissingArgument("context_id"));
        }

        let engine = self.engine()?;
        let resource = WebResource::builder(context_id)
            .role_under_test(Role::new(role_name.to_string()))
            .principal_roles(principal_roles.clone())
            .policy_registration(self.policy_registration.clone())
            .principal(principal.cloned())
            .servlet_name(servlet_name.map(str::to_string))
            .caller_subject(Some(caller_subject.clone()))
            .build();

        let roles = self.resolve_roles(engine.as_ref(), Some(caller_subject));
        self.decide(
            CheckKind::RoleRef,
            engine.as_ref(),
            resource,
            Some(caller_subject),
            &roles,
        )
    }

    /// Is the transport adequate for this request (confidentiality and
    /// integrity constraints)?
    ///
    /// The policy registration rides the resource alongside a snapshot of
    /// the caller's attributes; the engine observes both.
    pub fn has_user_data_permission(
        &self,
        context_attributes: &HashMap<String, Value>,
        request: RequestHandle,
        response: ResponseHandle,
        context_id: &str,
        caller_subject: &CallerSubject,
    ) -> Result<bool, CheckError> {
        if context_id.is_empty() {
            return Err(CheckError::MissingArgument("context_id"));
        }

        let engine = self.engine()?;
        let resource = WebResource::builder(context_id)
            .context_snapshot(context_attributes)
            .policy_registration(self.policy_registration.clone())
            .servlet_request(request)
            .servlet_response(response)
            .caller_subject(Some(caller_subject.clone()))
            .build();

        let roles = self.resolve_roles(engine.as_ref(), Some(caller_subject));
        self.decide(
            CheckKind::UserData,
            engine.as_ref(),
            resource,
            Some(caller_subject),
            &roles,
        )
    }

    fn engine(&self) -> Result<&Arc<dyn AuthorizationManager>, CheckError> {
        self.security_context.authorization_manager().ok_or_else(|| {
            CheckError::AuthorizationManagerUnset(
                self.security_context.security_domain().to_string(),
            )
        })
    }

    /// Roles are resolved fresh for every check; the callback captures
    /// the context current at this moment.
    fn resolve_roles(
        &self,
        engine: &dyn AuthorizationManager,
        subject: Option<&CallerSubject>,
    ) -> RoleGroup {
        let callback = SecurityContextCallback::new(&self.security_context);
        engine.subject_roles(subject, &callback)
    }

    /// Shared tail of all three checks: invoke the engine, translate the
    /// verdict, emit at most one audit record, map the outcome.
    fn decide(
        &self,
        kind: CheckKind,
        engine: &dyn AuthorizationManager,
        resource: WebResource,
        subject: Option<&CallerSubject>,
        roles: &RoleGroup,
    ) -> Result<bool, CheckError> {
        match engine.authorize(&resource, subject, roles) {
            Ok(verdict) => {
                let permitted = verdict.is_permit();
                if self.enable_audit {
                    let level = if permitted {
                        AuditLevel::Success
                    } else {
                        AuditLevel::Failure
                    };
                    self.audit_sink
                        .authorization_audit(AuditRecord::new(kind, level, &resource, None));
                }
                Ok(permitted)
            }
            Err(EngineError::Authorization(failure)) => {
                if tracing::enabled!(Level::TRACE) {
                    tracing::trace!(failure = %failure, "{} check failed", kind);
                }
                if self.enable_audit {
                    self.audit_sink.authorization_audit(AuditRecord::new(
                        kind,
                        AuditLevel::Error,
                        &resource,
                        Some(&failure),
                    ));
                }
                Ok(false)
            }
            Err(EngineError::Infrastructure(source)) => Err(CheckError::Engine(source)),
        }
    }
}

impl core::fmt::Debug for WebAuthorizationHelper {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WebAuthorizationHelper")
            .field("security_context", &self.security_context)
            .field("enable_audit", &self.enable_audit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use serde_json::json;

    use crate::audit::InMemoryAuditSink;
    use crate::manager::AuthorizationFailure;
    use crate::verdict::{codes, Verdict};

    /// What the stub engine does when invoked.
    #[derive(Clone, Copy)]
    enum Script {
        Code(i32),
        DomainFailure(&'static str),
        InfraFailure(&'static str),
    }

    /// Engine that follows a script and records every resource it sees.
    struct ScriptedEngine {
        script: Script,
        roles: RoleGroup,
        seen: Mutex<Vec<WebResource>>,
    }

    impl ScriptedEngine {
        fn new(script: Script) -> Self {
            Self {
                script,
                roles: RoleGroup::new(vec![Role::new("user")]),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<WebResource> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl AuthorizationManager for ScriptedEngine {
        fn subject_roles(
            &self,
            _subject: Option<&CallerSubject>,
            _callback: &SecurityContextCallback<'_>,
        ) -> RoleGroup {
            self.roles.clone()
        }

        fn authorize(
            &self,
            resource: &WebResource,
            _subject: Option<&CallerSubject>,
            _roles: &RoleGroup,
        ) -> Result<Verdict, EngineError> {
            self.seen.lock().unwrap().push(resource.clone());
            match self.script {
                Script::Code(code) => Ok(Verdict::from_code(code)),
                Script::DomainFailure(reason) => Err(AuthorizationFailure::new(reason).into()),
                Script::InfraFailure(reason) => Err(anyhow::anyhow!(reason).into()),
            }
        }
    }

    fn fixture(
        script: Script,
        enable_audit: bool,
    ) -> (
        WebAuthorizationHelper,
        Arc<InMemoryAuditSink>,
        Arc<ScriptedEngine>,
    ) {
        let engine = Arc::new(ScriptedEngine::new(script));
        let sink = Arc::new(InMemoryAuditSink::new());
        let context = Arc::new(SecurityContext::new("web-domain", engine.clone()));
        let helper = WebAuthorizationHelper::new(
            context,
            sink.clone(),
            enable_audit,
            PolicyRegistration::new("registration-1"),
        );
        (helper, sink, engine)
    }

    fn subject(name: &'static str) -> CallerSubject {
        CallerSubject::new(vec![Principal::new(name)])
    }

    fn attributes() -> HashMap<String, Value> {
        HashMap::new()
    }

    #[test]
    fn resource_permit_returns_true_with_success_audit() {
        let (helper, sink, _) = fixture(Script::Code(codes::PERMIT), true);

        let permitted = helper
            .check_resource_permission(
                &attributes(),
                RequestHandle::new("req"),
                ResponseHandle::new("resp"),
                Some(&subject("alice")),
                "web-app-1",
                "/admin/home",
            )
            .unwrap();

        assert!(permitted);
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, AuditLevel::Success);
        assert_eq!(records[0].kind, CheckKind::ResourcePermission);
        assert_eq!(records[0].canonical_request_uri.as_deref(), Some("/admin/home"));
        assert!(records[0].failure.is_none());
    }

    #[test]
    fn resource_deny_returns_false_with_failure_audit() {
        let (helper, sink, _) = fixture(Script::Code(codes::DENY), true);

        let permitted = helper
            .check_resource_permission(
                &attributes(),
                RequestHandle::new("req"),
                ResponseHandle::new("resp"),
                Some(&subject("alice")),
                "web-app-1",
                "/admin/home",
            )
            .unwrap();

        assert!(!permitted);
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, AuditLevel::Failure);
        assert!(records[0].failure.is_none());
    }

    #[test]
    fn resource_engine_failure_fails_closed_with_error_audit() {
        let (helper, sink, _) = fixture(Script::DomainFailure("no policy"), true);

        let permitted = helper
            .check_resource_permission(
                &attributes(),
                RequestHandle::new("req"),
                ResponseHandle::new("resp"),
                Some(&subject("alice")),
                "web-app-1",
                "/admin/home",
            )
            .unwrap();

        assert!(!permitted);
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, AuditLevel::Error);
        assert_eq!(records[0].failure.as_deref(), Some("no policy"));
    }

    #[test]
    fn missing_uri_is_rejected_before_any_side_effect() {
        let (helper, sink, engine) = fixture(Script::Code(codes::PERMIT), true);

        let err = helper
            .check_resource_permission(
                &attributes(),
                RequestHandle::new("req"),
                ResponseHandle::new("resp"),
                Some(&subject("alice")),
                "web-app-1",
                "",
            )
            .unwrap_err();

        assert!(matches!(
            err,
            CheckError::MissingArgument("canonical_request_uri")
        ));
        assert!(engine.seen().is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn missing_context_id_is_rejected_first() {
        let (helper, sink, engine) = fixture(Script::Code(codes::PERMIT), true);

        let err = helper
            .check_resource_permission(
                &attributes(),
                RequestHandle::new("req"),
                ResponseHandle::new("resp"),
                None,
                "",
                "/admin/home",
            )
            .unwrap_err();

        assert!(matches!(err, CheckError::MissingArgument("context_id")));
        assert!(engine.seen().is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn anonymous_resource_check_is_allowed() {
        let (helper, _, engine) = fixture(Script::Code(codes::PERMIT), false);

        let permitted = helper
            .check_resource_permission(
                &attributes(),
                RequestHandle::new("req"),
                ResponseHandle::new("resp"),
                None,
                "web-app-1",
                "/public/index",
            )
            .unwrap();

        assert!(permitted);
        assert!(engine.seen()[0].caller_subject().is_none());
    }

    #[test]
    fn unbound_engine_is_an_error_not_a_denial() {
        let sink = Arc::new(InMemoryAuditSink::new());
        let helper = WebAuthorizationHelper::new(
            Arc::new(SecurityContext::unbound("web-domain")),
            sink.clone(),
            true,
            PolicyRegistration::new("registration-1"),
        );

        let err = helper
            .check_resource_permission(
                &attributes(),
                RequestHandle::new("req"),
                ResponseHandle::new("resp"),
                Some(&subject("alice")),
                "web-app-1",
                "/admin/home",
            )
            .unwrap_err();

        assert!(matches!(err, CheckError::AuthorizationManagerUnset(_)));
        assert!(sink.is_empty());
    }

    #[test]
    fn infrastructure_failure_propagates_unaudited() {
        let (helper, sink, _) = fixture(Script::InfraFailure("backend interrupted"), true);

        let err = helper
            .check_resource_permission(
                &attributes(),
                RequestHandle::new("req"),
                ResponseHandle::new("resp"),
                Some(&subject("alice")),
                "web-app-1",
                "/admin/home",
            )
            .unwrap_err();

        assert!(matches!(err, CheckError::Engine(_)));
        assert!(sink.is_empty());
    }

    #[test]
    fn role_check_seeds_reserved_slots() {
        let (helper, sink, engine) = fixture(Script::Code(codes::PERMIT), true);
        let caller = subject("alice");
        let principal_roles: HashSet<Principal> =
            [Principal::new("P1"), Principal::new("P2")].into_iter().collect();

        let held = helper
            .has_role(
                "admin",
                Some(&Principal::new("alice")),
                Some("reports"),
                &principal_roles,
                "web-app-1",
                &caller,
            )
            .unwrap();

        assert!(held);
        let seen = engine.seen();
        let resource = &seen[0];
        assert!(resource.is_roleref_perm_check());
        assert_eq!(resource.role_name().map(Role::as_str), Some("admin"));
        assert_eq!(resource.principal_roles(), Some(&principal_roles));
        assert!(resource.policy_registration().is_some());
        assert_eq!(resource.servlet_name(), Some("reports"));
        assert_eq!(resource.principal().map(Principal::name), Some("alice"));
        assert!(resource.servlet_request().is_none());
        assert!(resource.canonical_request_uri().is_none());

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, CheckKind::RoleRef);
        assert_eq!(records[0].role_name, Some(Role::new("admin")));
    }

    #[test]
    fn empty_role_name_is_rejected() {
        let (helper, sink, engine) = fixture(Script::Code(codes::PERMIT), true);

        let err = helper
            .has_role(
                "",
                None,
                None,
                &HashSet::new(),
                "web-app-1",
                &subject("alice"),
            )
            .unwrap_err();

        assert!(matches!(err, CheckError::MissingArgument("role_name")));
        assert!(engine.seen().is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn user_data_check_carries_attributes_and_registration() {
        let (helper, _, engine) = fixture(Script::Code(codes::PERMIT), false);
        let mut context_attributes = HashMap::new();
        context_attributes.insert("transport".to_string(), json!("CONFIDENTIAL"));

        let permitted = helper
            .has_user_data_permission(
                &context_attributes,
                RequestHandle::new("req"),
                ResponseHandle::new("resp"),
                "web-app-1",
                &subject("alice"),
            )
            .unwrap();

        assert!(permitted);
        let seen = engine.seen();
        let resource = &seen[0];
        assert_eq!(resource.context()["transport"], json!("CONFIDENTIAL"));
        assert!(resource.policy_registration().is_some());
        assert!(resource.servlet_request().is_some());
        assert!(resource.canonical_request_uri().is_none());
        assert!(resource.principal().is_none());
        assert!(resource.servlet_name().is_none());
        // The caller's own map is untouched.
        assert_eq!(context_attributes.len(), 1);
    }

    #[test]
    fn user_data_missing_context_id_is_rejected_before_any_side_effect() {
        let (helper, sink, engine) = fixture(Script::Code(codes::PERMIT), true);

        let err = helper
            .has_user_data_permission(
                &attributes(),
                RequestHandle::new("req"),
                ResponseHandle::new("resp"),
                "",
                &subject("alice"),
            )
            .unwrap_err();

        assert!(matches!(err, CheckError::MissingArgument("context_id")));
        assert!(engine.seen().is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn user_data_engine_failure_fails_closed() {
        let (helper, sink, _) = fixture(Script::DomainFailure("transport mismatch"), true);

        let permitted = helper
            .has_user_data_permission(
                &attributes(),
                RequestHandle::new("req"),
                ResponseHandle::new("resp"),
                "web-app-1",
                &subject("alice"),
            )
            .unwrap();

        assert!(!permitted);
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, CheckKind::UserData);
        assert_eq!(records[0].level, AuditLevel::Error);
        assert_eq!(records[0].failure.as_deref(), Some("transport mismatch"));
    }

    #[test]
    fn audit_disabled_emits_nothing() {
        let (helper, sink, _) = fixture(Script::Code(codes::PERMIT), false);

        let permitted = helper
            .check_resource_permission(
                &attributes(),
                RequestHandle::new("req"),
                ResponseHandle::new("resp"),
                Some(&subject("alice")),
                "web-app-1",
                "/admin/home",
            )
            .unwrap();

        assert!(permitted);
        assert!(sink.is_empty());
    }

    #[test]
    fn non_permit_codes_all_map_to_false() {
        for code in [codes::DENY, codes::NOT_APPLICABLE, 99] {
            let (helper, sink, _) = fixture(Script::Code(code), true);
            let permitted = helper
                .check_resource_permission(
                    &attributes(),
                    RequestHandle::new("req"),
                    ResponseHandle::new("resp"),
                    Some(&subject("alice")),
                    "web-app-1",
                    "/admin/home",
                )
                .unwrap();
            assert!(!permitted, "code {code} must not permit");
            assert_eq!(sink.records()[0].level, AuditLevel::Failure);
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: permit iff the engine code is exactly PERMIT.
            #[test]
            fn verdict_translation_is_permit_iff_permit_code(code in any::<i32>()) {
                let (helper, _, _) = fixture(Script::Code(code), false);
                let permitted = helper
                    .check_resource_permission(
                        &attributes(),
                        RequestHandle::new("req"),
                        ResponseHandle::new("resp"),
                        Some(&subject("alice")),
                        "web-app-1",
                        "/admin/home",
                    )
                    .unwrap();
                prop_assert_eq!(permitted, code == codes::PERMIT);
            }

            /// Property: exactly one audit record iff auditing is enabled,
            /// with the level matching the verdict.
            #[test]
            fn audit_count_matches_enable_flag(code in any::<i32>(), enable in any::<bool>()) {
                let (helper, sink, _) = fixture(Script::Code(code), enable);
                helper
                    .check_resource_permission(
                        &attributes(),
                        RequestHandle::new("req"),
                        ResponseHandle::new("resp"),
                        Some(&subject("alice")),
                        "web-app-1",
                        "/admin/home",
                    )
                    .unwrap();

                let records = sink.records();
                prop_assert_eq!(records.len(), usize::from(enable));
                if enable {
                    let expected = if code == codes::PERMIT {
                        AuditLevel::Success
                    } else {
                        AuditLevel::Failure
                    };
                    prop_assert_eq!(records[0].level, expected);
                }
            }
        }
    }
}
