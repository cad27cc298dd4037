//! `webgate-core` — identity primitives shared by the decision layer.
//!
//! This crate contains **pure domain** values (no IO, no engine knowledge):
//! roles, principals, caller subjects, and decision identifiers.

pub mod id;
pub mod principal;
pub mod role;

pub use id::DecisionId;
pub use principal::{CallerSubject, Principal};
pub use role::{Role, RoleGroup};
