//! `webgate-authz` — web-authorization decision layer.
//!
//! This crate answers three questions a web request pipeline asks about an
//! authenticated caller:
//!
//! - may the caller invoke this URI under this deployment?
//! - does the caller hold a named role (role-reference check)?
//! - is the transport adequate for this request (user-data check)?
//!
//! Each check builds a canonical [`WebResource`], resolves the caller's
//! roles, consults the bound [`AuthorizationManager`], and maps its
//! [`Verdict`] to a boolean — emitting exactly one audit record per check
//! when auditing is enabled. Authorization-domain failures are
//! **fail-closed** (the check returns `false`); infrastructure faults
//! propagate to the caller so they are never mistaken for denials.
//!
//! The crate holds no policy and no per-request state: the policy engine,
//! identity layer, and audit destination plug in through traits.

pub mod audit;
pub mod helper;
pub mod manager;
pub mod resource;
pub mod verdict;

pub use audit::{AuditLevel, AuditRecord, AuditSink, CheckKind, InMemoryAuditSink, TracingAuditSink};
pub use helper::{CheckError, WebAuthorizationHelper};
pub use manager::{
    AuthorizationFailure, AuthorizationManager, EngineError, SecurityContext,
    SecurityContextCallback,
};
pub use resource::{
    resource_keys, PolicyRegistration, RequestHandle, ResponseHandle, WebResource,
    WebResourceBuilder,
};
pub use verdict::Verdict;
