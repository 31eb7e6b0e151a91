//! How a request reached the server.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Channel through which an action was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessMethod {
    /// SOAP service interface.
    Soap,
    /// Browser-based web interface.
    WebInterface,
    /// Server-internal call.
    #[default]
    Internal,
    /// REST endpoint.
    Rest,
    /// JSON-RPC endpoint.
    Json,
}

impl AccessMethod {
    /// Return the access method as an uppercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Soap => "SOAP",
            Self::WebInterface => "WEB_INTERFACE",
            Self::Internal => "INTERNAL",
            Self::Rest => "REST",
            Self::Json => "JSON",
        }
    }
}

impl fmt::Display for AccessMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
