//! System-level domain events.

use serde::{Deserialize, Serialize};

use crate::types::parameter::ParameterLevel;

/// System-level events (extension lifecycle, settings forms).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemEvent {
    /// An extension finished loading its initial data.
    ///
    /// Delivered only to extensions that declare a dependency on it.
    InitialDataLoaded {
        /// Identifier of the extension that was loaded.
        extension: String,
    },
    /// The settings form of an application asks for extra fields.
    GetExtraParameters {
        /// The application whose form is being built.
        app: String,
        /// The parameter scope.
        level: ParameterLevel,
    },
}
