//! Engine verdicts.

use serde::{Deserialize, Serialize};

/// Raw integer verdict codes, for engines bridging the legacy wire contract.
pub mod codes {
    pub const PERMIT: i32 = 1;
    pub const NOT_APPLICABLE: i32 = 0;
    pub const DENY: i32 = -1;
}

/// Outcome of one engine evaluation.
///
/// Only [`Verdict::Permit`] grants access; every other code the engine can
/// produce (deny, not-applicable, vendor extensions) folds into
/// [`Verdict::NonPermit`] and is treated identically by the decision layer.
/// There is no partial permit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Permit,
    NonPermit(i32),
}

impl Verdict {
    /// Map a raw engine code to a verdict. Anything but `codes::PERMIT`
    /// is non-permit.
    pub fn from_code(code: i32) -> Self {
        if code == codes::PERMIT {
            Verdict::Permit
        } else {
            Verdict::NonPermit(code)
        }
    }

    /// A plain denial.
    pub fn deny() -> Self {
        Verdict::NonPermit(codes::DENY)
    }

    pub fn code(&self) -> i32 {
        match self {
            Verdict::Permit => codes::PERMIT,
            Verdict::NonPermit(code) => *code,
        }
    }

    pub fn is_permit(&self) -> bool {
        matches!(self, Verdict::Permit)
    }
}
