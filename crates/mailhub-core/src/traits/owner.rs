//! Owner resolution for administrated objects.

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::result::AppResult;
use crate::types::id::{RelayDomainAliasId, RelayDomainId, UserId};

/// An object whose administrative owner can be looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum OwnedObject {
    /// A relay domain.
    RelayDomain(RelayDomainId),
    /// A relay domain alias.
    RelayDomainAlias(RelayDomainAliasId),
}

impl OwnedObject {
    /// Stable type tag, as persisted in the ownership ledger.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RelayDomain(_) => "relay_domain",
            Self::RelayDomainAlias(_) => "relay_domain_alias",
        }
    }

    /// The object's identifier.
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::RelayDomain(id) => id.into_uuid(),
            Self::RelayDomainAlias(id) => id.into_uuid(),
        }
    }
}

impl std::fmt::Display for OwnedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.type_name(), self.uuid())
    }
}

impl FromStr for OwnedObject {
    type Err = AppError;

    /// Parses the `Display` form, `<type>:<uuid>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| AppError::validation(format!("Expected <type>:<uuid>, got '{s}'")))?;
        let id = Uuid::parse_str(id)
            .map_err(|e| AppError::validation(format!("Invalid object id '{id}': {e}")))?;
        match kind {
            "relay_domain" => Ok(Self::RelayDomain(id.into())),
            "relay_domain_alias" => Ok(Self::RelayDomainAlias(id.into())),
            other => Err(AppError::validation(format!("Unknown object type '{other}'"))),
        }
    }
}

/// Resolves the administrator owning an object.
///
/// `Ok(None)` means the object is already detached from its owner; callers
/// on teardown paths treat it the same as an error and skip the object.
#[async_trait]
pub trait OwnerResolver: Send + Sync + std::fmt::Debug + 'static {
    /// Returns the owner of the object, if it still has one.
    async fn owner_of(&self, object: &OwnedObject) -> AppResult<Option<UserId>>;
}
