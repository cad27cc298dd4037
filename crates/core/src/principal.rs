//! Principals and caller subjects.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// One named identity inside a caller subject (user name, group name,
/// certificate DN, ...). Opaque to the decision layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(Cow<'static, str>);

impl Principal {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Principal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The authenticated identity bundle on whose behalf a check runs.
///
/// A subject carries zero or more principals; a subject with none
/// represents an anonymous caller. Authentication happened elsewhere —
/// this type only transports its outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerSubject {
    principals: Vec<Principal>,
}

impl CallerSubject {
    pub fn new(principals: Vec<Principal>) -> Self {
        Self { principals }
    }

    /// A subject with no principals (unauthenticated caller).
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.principals.is_empty()
    }

    pub fn principals(&self) -> &[Principal] {
        &self.principals
    }

    /// The first principal, conventionally the caller's primary identity.
    pub fn primary(&self) -> Option<&Principal> {
        self.principals.first()
    }
}

impl FromIterator<Principal> for CallerSubject {
    fn from_iter<I: IntoIterator<Item = Principal>>(iter: I) -> Self {
        Self {
            principals: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_subject_has_no_principals() {
        let subject = CallerSubject::anonymous();
        assert!(subject.is_anonymous());
        assert!(subject.primary().is_none());
    }

    #[test]
    fn primary_is_first_principal() {
        let subject: CallerSubject = [Principal::new("alice"), Principal::new("staff")]
            .into_iter()
            .collect();
        assert_eq!(subject.primary().map(Principal::name), Some("alice"));
        assert!(!subject.is_anonymous());
    }
}
