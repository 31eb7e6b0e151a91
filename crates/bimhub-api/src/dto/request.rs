//! Request DTOs with validation.

use serde::{Deserialize, Serialize};
use validator::Validate;

use bimhub_core::types::id::Uoid;
use bimhub_entity::download::DownloadParameters;
use bimhub_entity::store::AccessMethod;
use bimhub_worker::DownloadRequest;

/// Download submission body.
///
/// The download parameters are inlined next to the acting user, e.g.
/// `{"download_type": "DOWNLOAD_BY_OIDS", "roids": [7], "oids": [101],
/// "uoid": 2, "caller_id": "viewer-1"}`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitDownloadRequest {
    /// What to export.
    #[serde(flatten)]
    pub parameters: DownloadParameters,
    /// Acting user.
    pub uoid: Uoid,
    /// Request channel; REST unless the client says otherwise.
    #[serde(default)]
    pub access_method: Option<AccessMethod>,
    /// Opaque id of the calling client.
    #[validate(length(min = 1, max = 128, message = "caller_id must be 1 to 128 characters"))]
    pub caller_id: String,
}

impl From<SubmitDownloadRequest> for DownloadRequest {
    fn from(request: SubmitDownloadRequest) -> Self {
        Self {
            parameters: request.parameters,
            uoid: request.uoid,
            access_method: request.access_method.unwrap_or(AccessMethod::Rest),
            caller_id: request.caller_id,
        }
    }
}

/// Query for listing a caller's downloads.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ListDownloadsQuery {
    /// Opaque id of the calling client.
    #[validate(length(min = 1, max = 128))]
    pub caller_id: String,
}
