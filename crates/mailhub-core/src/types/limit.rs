//! Limit value types shared by the registry, the stores, and extensions.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of a countable resource category, e.g. `relay_domains_limit`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LimitKind(String);

impl LimitKind {
    /// Creates a kind from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the kind name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the admin-scope parameter holding this kind's default maximum.
    pub fn parameter_name(&self) -> String {
        format!("deflt_{}", self.0)
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LimitKind {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for LimitKind {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for LimitKind {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Maximum value of a limit.
///
/// Stored as a signed integer where any negative value means unlimited.
/// `Fixed(0)` is a real limit that admits nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimitMax {
    /// At most this many resources.
    Fixed(u32),
    /// No maximum.
    Unlimited,
}

impl LimitMax {
    /// Raw value used for storage and configuration (`-1` for unlimited).
    pub fn as_raw(&self) -> i64 {
        match self {
            Self::Fixed(max) => i64::from(*max),
            Self::Unlimited => -1,
        }
    }

    /// Check whether a given usage count has reached this maximum.
    pub fn is_reached_by(&self, current: u32) -> bool {
        match self {
            Self::Fixed(max) => current >= *max,
            Self::Unlimited => false,
        }
    }

    /// Return the numeric limit, or `None` for unlimited.
    pub fn as_max(&self) -> Option<u32> {
        match self {
            Self::Fixed(max) => Some(*max),
            Self::Unlimited => None,
        }
    }
}

impl From<i64> for LimitMax {
    /// Negative values mean unlimited; values above `u32::MAX` saturate.
    fn from(raw: i64) -> Self {
        if raw < 0 {
            Self::Unlimited
        } else {
            Self::Fixed(u32::try_from(raw).unwrap_or(u32::MAX))
        }
    }
}

impl fmt::Display for LimitMax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(max) => write!(f, "{max}"),
            Self::Unlimited => write!(f, "unlimited"),
        }
    }
}

/// Current usage of one limit kind for one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitUsage {
    /// The limit kind.
    pub kind: LimitKind,
    /// Number of resources currently accounted.
    pub current: u32,
    /// Maximum allowed.
    pub max: LimitMax,
}

impl LimitUsage {
    /// Creates a usage record.
    pub fn new(kind: LimitKind, current: u32, max: LimitMax) -> Self {
        Self { kind, current, max }
    }

    /// Whether one more resource may be created.
    pub fn admits_one_more(&self) -> bool {
        !self.max.is_reached_by(self.current)
    }

    /// Whether usage is above the maximum.
    ///
    /// Possible when the maximum was lowered after resources were created, or
    /// when two optimistic admissions raced.
    pub fn is_exceeded(&self) -> bool {
        match self.max {
            LimitMax::Fixed(max) => self.current > max,
            LimitMax::Unlimited => false,
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Admission {
    /// The resource may be created. Carries the usage seen by the check.
    Granted {
        /// Usage after the check (after the increment for reservations).
        usage: LimitUsage,
    },
    /// The limit is reached.
    Denied {
        /// Usage that caused the denial.
        usage: LimitUsage,
    },
}

impl Admission {
    /// Returns whether the admission was granted.
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }

    /// Returns the usage attached to the decision.
    pub fn usage(&self) -> &LimitUsage {
        match self {
            Self::Granted { usage } | Self::Denied { usage } => usage,
        }
    }
}
