//! Long-running actions.

pub mod database;
pub mod download;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use bimhub_core::error::AppError;
use bimhub_core::result::AppResult;
use bimhub_core::types::id::Uoid;
use bimhub_entity::action::LongActionState;
use bimhub_entity::store::AccessMethod;
use bimhub_plugin::ObjectIdm;

/// A unit of background work tracked by ticket.
///
/// The manager calls [`init`](Self::init) and then
/// [`execute`](Self::execute) exactly once each from a spawned task, or
/// [`fail`](Self::fail) instead of `execute` when `init` errs. Pollers
/// call [`state`](Self::state) concurrently at any time.
#[async_trait]
pub trait LongAction: Send + Sync + std::fmt::Debug + 'static {
    /// Human-readable label.
    fn description(&self) -> &str;

    /// Identity used to share one in-flight action between equal submissions.
    fn dedup_key(&self) -> String;

    /// Prepare the action. Opens whatever resources `execute` needs.
    async fn init(&self) -> AppResult<()>;

    /// Run the action to a terminal state. Never panics on failure; the
    /// outcome is recorded in the state.
    async fn execute(&self);

    /// Record a failure that prevented `execute` from running and release
    /// any resources `init` acquired.
    async fn fail(&self, error: AppError);

    /// A consistent snapshot of the current state.
    fn state(&self) -> LongActionState;

    /// Request cancellation. Returns `false` if the action already reached
    /// a terminal state.
    fn cancel(&self) -> bool;

    /// Cancel because the action ran out of time. Returns `false` if the
    /// action already reached a terminal state.
    fn time_out(&self) -> bool;
}

/// Caller context handed to a running [`DatabaseAction`](database::DatabaseAction).
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// User on whose behalf the action reads.
    pub uoid: Uoid,
    /// How the request arrived.
    pub access_method: AccessMethod,
    /// Object id mapping resolved for the requested serializer.
    pub object_idm: Option<Arc<dyn ObjectIdm>>,
    /// Fired when the action should stop early.
    pub cancel: CancellationToken,
}

impl ActionContext {
    /// A context with no object id mapping and a fresh cancellation token.
    pub fn new(uoid: Uoid, access_method: AccessMethod) -> Self {
        Self {
            uoid,
            access_method,
            object_idm: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the object id mapping.
    pub fn with_object_idm(mut self, object_idm: Option<Arc<dyn ObjectIdm>>) -> Self {
        self.object_idm = object_idm;
        self
    }

    /// Use an existing cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fail with a cancellation error once cancellation was requested.
    pub fn ensure_active(&self) -> AppResult<()> {
        if self.cancel.is_cancelled() {
            return Err(AppError::cancelled("Action was cancelled"));
        }
        Ok(())
    }
}
