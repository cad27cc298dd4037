//! Roles and role groups.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier.
///
/// Roles are intentionally opaque strings at this layer; what a role
/// *grants* is the policy engine's business, not ours.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The set of roles the identity layer attributes to one subject.
///
/// Built by the authorization manager's role resolution for every check;
/// the decision layer never caches one across calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGroup {
    roles: Vec<Role>,
}

impl RoleGroup {
    /// An empty group (e.g. an anonymous caller).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(roles: Vec<Role>) -> Self {
        Self { roles }
    }

    pub fn contains(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.roles.iter()
    }
}

impl FromIterator<Role> for RoleGroup {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self {
            roles: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_group_contains() {
        let group: RoleGroup = ["admin", "user"].into_iter().map(Role::new).collect();
        assert!(group.contains(&Role::new("admin")));
        assert!(!group.contains(&Role::new("auditor")));
        assert_eq!(group.len(), 2);
    }

    #[test]
    fn empty_group() {
        assert!(RoleGroup::empty().is_empty());
    }
}
