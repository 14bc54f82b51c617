//! Account role enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Roles of the administration panel.
///
/// Ordered by privilege level: SuperAdmin > Reseller > DomainAdmin > SimpleUser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Full administrator, never limited.
    SuperAdmin,
    /// Creates domains and domain administrators on behalf of customers.
    Reseller,
    /// Administers the domains assigned to them.
    DomainAdmin,
    /// Mailbox owner without administrative rights.
    SimpleUser,
}

impl UserRole {
    /// Return the privilege level (higher = more privileged).
    pub fn privilege_level(&self) -> u8 {
        match self {
            Self::SuperAdmin => 4,
            Self::Reseller => 3,
            Self::DomainAdmin => 2,
            Self::SimpleUser => 1,
        }
    }

    /// Check if this role has at least the given role's privileges.
    pub fn has_at_least(&self, other: &UserRole) -> bool {
        self.privilege_level() >= other.privilege_level()
    }

    /// Whether accounts with this role get a limit pool.
    pub fn has_limits(&self) -> bool {
        matches!(self, Self::Reseller | Self::DomainAdmin)
    }

    /// Return the role as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Reseller => "reseller",
            Self::DomainAdmin => "domain_admin",
            Self::SimpleUser => "simple_user",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = mailhub_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "super_admin" | "superadmins" => Ok(Self::SuperAdmin),
            "reseller" | "resellers" => Ok(Self::Reseller),
            "domain_admin" | "domainadmins" => Ok(Self::DomainAdmin),
            "simple_user" | "simpleusers" => Ok(Self::SimpleUser),
            _ => Err(mailhub_core::AppError::validation(format!(
                "Invalid user role: '{s}'. Expected one of: super_admin, reseller, domain_admin, simple_user"
            ))),
        }
    }
}
