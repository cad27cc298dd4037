//! Audit emission for authorization decisions.
//!
//! Every completed check hands exactly one [`AuditRecord`] to the
//! configured [`AuditSink`] (when auditing is enabled). Records are
//! serializable so sinks can ship them to downstream audit consumers
//! unchanged. Sinks must never influence the decision outcome.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use webgate_core::{DecisionId, Principal, Role};

use crate::manager::AuthorizationFailure;
use crate::resource::WebResource;

/// Severity of one decision outcome.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditLevel {
    /// Engine permitted the request.
    Success,
    /// Engine returned a non-permit verdict without failing.
    Failure,
    /// Engine signalled an authorization failure (decision fails closed).
    Error,
}

impl core::fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AuditLevel::Success => f.write_str("SUCCESS"),
            AuditLevel::Failure => f.write_str("FAILURE"),
            AuditLevel::Error => f.write_str("ERROR"),
        }
    }
}

/// Which of the three checks produced a record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    ResourcePermission,
    RoleRef,
    UserData,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::ResourcePermission => "resource-permission",
            CheckKind::RoleRef => "role-ref",
            CheckKind::UserData => "user-data",
        }
    }
}

impl core::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decision, flattened for the audit trail.
///
/// Carries the resource data an audit consumer can act on: the policy
/// scope, the slots that identify what was checked, and the pass-through
/// attribute snapshot. The `failure` slot is populated only for
/// [`AuditLevel::Error`] records.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub decision_id: DecisionId,
    pub at: DateTime<Utc>,
    pub level: AuditLevel,
    pub kind: CheckKind,
    pub policy_context_id: String,
    pub canonical_request_uri: Option<String>,
    pub role_name: Option<Role>,
    pub caller: Option<Principal>,
    pub attributes: HashMap<String, Value>,
    pub failure: Option<String>,
}

impl AuditRecord {
    pub fn new(
        kind: CheckKind,
        level: AuditLevel,
        resource: &WebResource,
        failure: Option<&AuthorizationFailure>,
    ) -> Self {
        Self {
            decision_id: DecisionId::new(),
            at: Utc::now(),
            level,
            kind,
            policy_context_id: resource.policy_context_id().to_string(),
            canonical_request_uri: resource.canonical_request_uri().map(str::to_string),
            role_name: resource.role_name().cloned(),
            caller: resource
                .caller_subject()
                .and_then(|subject| subject.primary())
                .cloned(),
            attributes: resource.context().clone(),
            failure: failure.map(|f| f.to_string()),
        }
    }
}

/// Destination for audit records.
///
/// Implementations must be safe to call from many threads at once and
/// must not panic: a broken sink may lose records but cannot be allowed
/// to change a decision.
pub trait AuditSink: Send + Sync {
    fn authorization_audit(&self, record: AuditRecord);
}

impl<S> AuditSink for Arc<S>
where
    S: AuditSink + ?Sized,
{
    fn authorization_audit(&self, record: AuditRecord) {
        (**self).authorization_audit(record)
    }
}

/// Sink that emits each record as a structured `tracing` event.
///
/// `SUCCESS` records log at debug, `FAILURE` at info, `ERROR` at warn.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn authorization_audit(&self, record: AuditRecord) {
        match record.level {
            AuditLevel::Success => tracing::debug!(
                decision_id = %record.decision_id,
                kind = record.kind.as_str(),
                context = %record.policy_context_id,
                "authorization permitted"
            ),
            AuditLevel::Failure => tracing::info!(
                decision_id = %record.decision_id,
                kind = record.kind.as_str(),
                context = %record.policy_context_id,
                "authorization denied"
            ),
            AuditLevel::Error => tracing::warn!(
                decision_id = %record.decision_id,
                kind = record.kind.as_str(),
                context = %record.policy_context_id,
                failure = record.failure.as_deref().unwrap_or(""),
                "authorization check errored"
            ),
        }
    }
}

/// Mutex-buffered sink. Useful for tests and for embedders that drain
/// records on their own schedule.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the buffer, recovering from a poisoned lock. A panic on some
    /// other thread may not turn audit emission into a second panic; the
    /// buffered records themselves are always in a consistent state.
    fn lock(&self) -> MutexGuard<'_, Vec<AuditRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of everything recorded so far, in emission order.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return all buffered records.
    pub fn drain(&self) -> Vec<AuditRecord> {
        std::mem::take(&mut *self.lock())
    }
}

impl AuditSink for InMemoryAuditSink {
    fn authorization_audit(&self, record: AuditRecord) {
        self.lock().push(record);
    }
}
