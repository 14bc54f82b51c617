//! Configurable parameters contributed by extensions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Scope a parameter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLevel {
    /// Site-wide settings edited by administrators (`"A"`).
    Admin,
    /// Per-user preferences (`"U"`).
    User,
}

impl ParameterLevel {
    /// Short code used by the settings forms.
    pub fn as_code(&self) -> &'static str {
        match self {
            Self::Admin => "A",
            Self::User => "U",
        }
    }
}

impl fmt::Display for ParameterLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

impl FromStr for ParameterLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" | "admin" => Ok(Self::Admin),
            "U" | "user" => Ok(Self::User),
            _ => Err(AppError::validation(format!(
                "Invalid parameter level: '{s}'. Expected 'A' or 'U'"
            ))),
        }
    }
}

/// An integer field surfaced in the general parameters form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterField {
    /// Field name, e.g. `deflt_relay_domains_limit`.
    pub name: String,
    /// Human-readable label.
    pub label: String,
    /// Help text shown under the field.
    pub help_text: String,
    /// Initial value.
    pub initial: i64,
}
