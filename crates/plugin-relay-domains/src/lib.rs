//! Relay domain limits extension for MailHub.
//!
//! Counts the relay domains and relay domain aliases each administrator
//! owns, under the `relay_domains_limit` and `relay_domain_aliases_limit`
//! kinds of the limits extension.

pub mod extension;
pub mod hooks;

pub use extension::{
    RELAY_DOMAIN_ALIASES_LIMIT, RELAY_DOMAINS_EXTENSION_ID, RELAY_DOMAINS_LIMIT,
    RelayDomainsExtension,
};
