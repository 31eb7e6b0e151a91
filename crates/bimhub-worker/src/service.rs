//! Download service: validates requests and tracks their actions.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use bimhub_cache::DownloadArtifact;
use bimhub_core::error::AppError;
use bimhub_core::result::AppResult;
use bimhub_core::types::id::{Ticket, Uoid};
use bimhub_entity::action::{ActionState, LongActionState};
use bimhub_entity::download::DownloadParameters;
use bimhub_entity::store::AccessMethod;

use crate::action::LongAction;
use crate::action::download::{DownloadDependencies, LongDownloadAction, Requester};
use crate::manager::LongActionManager;

/// A download submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// What to export.
    pub parameters: DownloadParameters,
    /// Acting user.
    pub uoid: Uoid,
    /// How the request arrived.
    #[serde(default)]
    pub access_method: AccessMethod,
    /// Opaque id of the calling client.
    #[serde(default)]
    pub caller_id: String,
}

/// A finished download's artifact and suggested file name.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadResult {
    /// File name derived from the parameters and serializer extension.
    pub file_name: String,
    /// The serialized export.
    pub artifact: DownloadArtifact,
}

/// Entry point for submitting and following downloads.
#[derive(Debug, Clone)]
pub struct DownloadService {
    deps: DownloadDependencies,
    manager: LongActionManager<LongDownloadAction>,
}

impl DownloadService {
    /// Creates a new download service.
    pub fn new(deps: DownloadDependencies, manager: LongActionManager<LongDownloadAction>) -> Self {
        Self { deps, manager }
    }

    /// The action registry.
    pub fn manager(&self) -> &LongActionManager<LongDownloadAction> {
        &self.manager
    }

    /// The shared services downloads run against.
    pub fn dependencies(&self) -> &DownloadDependencies {
        &self.deps
    }

    /// Validate and submit a download. Returns without waiting for the
    /// export.
    ///
    /// When an identical download is already running for another user,
    /// the caller shares its ticket only if they may read its revisions.
    pub async fn submit(&self, request: DownloadRequest) -> AppResult<Ticket> {
        request.parameters.validate()?;
        let parameters = request
            .parameters
            .with_default_serializer(self.deps.plugins.default_serializer_name());
        let caller_id = request.caller_id.clone();
        let action = Arc::new(LongDownloadAction::new(
            parameters,
            Requester {
                uoid: request.uoid,
                access_method: request.access_method,
                caller_id: request.caller_id,
            },
            self.deps.clone(),
        ));
        let ticket = self.manager.submit(Arc::clone(&action), caller_id)?;

        let running = self.manager.get(ticket)?;
        if !Arc::ptr_eq(&running, &action) && running.requester().uoid != request.uoid {
            action
                .check_read_access(request.uoid)
                .await
                .map_err(|e| {
                    warn!(ticket = %ticket, uoid = %request.uoid, error = %e, "Shared download refused");
                    e
                })?;
            debug!(ticket = %ticket, uoid = %request.uoid, "Joined running download");
        }
        info!(ticket = %ticket, uoid = %request.uoid, "Download submitted");
        Ok(ticket)
    }

    /// Current state of a download.
    pub fn poll(&self, ticket: Ticket) -> AppResult<LongActionState> {
        self.manager.state(ticket)
    }

    /// Request cancellation of a download.
    pub fn cancel(&self, ticket: Ticket) -> AppResult<bool> {
        self.manager.cancel(ticket)
    }

    /// Wait for a download to reach a terminal state.
    pub async fn wait(&self, ticket: Ticket) -> AppResult<LongActionState> {
        self.manager.wait(ticket).await
    }

    /// Tickets submitted by a caller.
    pub fn tickets_for(&self, caller_id: &str) -> Vec<Ticket> {
        self.manager.tickets_for(caller_id)
    }

    /// The artifact of a finished download.
    ///
    /// `None` when the download ended without a result (failed, cancelled,
    /// or evicted from the cache since). A download still running is a
    /// conflict.
    pub async fn result(&self, ticket: Ticket) -> AppResult<Option<DownloadResult>> {
        let action = self.manager.get(ticket)?;
        let state = action.state();
        match state.state {
            ActionState::NotStarted | ActionState::Started => {
                return Err(AppError::conflict(format!(
                    "Download {ticket} is still running"
                )));
            }
            ActionState::Failed => return Ok(None),
            ActionState::Finished if state.cancelled => return Ok(None),
            ActionState::Finished => {}
        }
        let params = action.key();
        Ok(self.deps.cache.get(params).await?.map(|artifact| DownloadResult {
            file_name: params.file_name(&artifact.extension),
            artifact,
        }))
    }

    /// Stop accepting downloads and wait for running ones.
    pub async fn shutdown(&self, grace: Duration) {
        self.manager.shutdown(grace).await;
    }
}
