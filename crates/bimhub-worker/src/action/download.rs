//! The download action.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use bimhub_cache::{DownloadArtifact, DownloadCache};
use bimhub_core::error::AppError;
use bimhub_core::result::AppResult;
use bimhub_core::types::id::Uoid;
use bimhub_database::{DatabaseSession, ObjectDatabase};
use bimhub_entity::action::{ActionState, LongActionState};
use bimhub_entity::download::DownloadParameters;
use bimhub_entity::store::AccessMethod;
use bimhub_plugin::{ObjectIdm, PluginRegistry, SerializerPlugin};

use super::database::{DatabaseAction, authorize_revisions};
use super::{ActionContext, LongAction};

const DESCRIPTION: &str = "Download";
const TIMEOUT_MESSAGE: &str = "Download exceeded its time budget";

/// Shared services a download reads from and writes to.
#[derive(Debug, Clone)]
pub struct DownloadDependencies {
    /// Object store.
    pub database: Arc<dyn ObjectDatabase>,
    /// Result cache.
    pub cache: Arc<dyn DownloadCache>,
    /// Serializer and object id mapping plugins.
    pub plugins: Arc<PluginRegistry>,
}

/// Who asked for a download and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    /// Acting user.
    pub uoid: Uoid,
    /// How the request arrived.
    pub access_method: AccessMethod,
    /// Opaque id of the calling client, owning the ticket.
    pub caller_id: String,
}

#[derive(Debug, Clone)]
enum Plan {
    /// `init` has not completed.
    Uninitialized,
    /// The result is already cached; nothing to run.
    CacheHit,
    /// A configured action with an open session.
    Ready(Arc<DatabaseAction>),
}

impl Plan {
    fn progress(&self) -> u8 {
        match self {
            Self::Uninitialized => 0,
            Self::CacheHit => 100,
            Self::Ready(action) => action.progress(),
        }
    }
}

#[derive(Debug, Default)]
struct SerializerLookup {
    object_idm: Option<Arc<dyn ObjectIdm>>,
    plugin: Option<String>,
    disabled: bool,
}

#[derive(Debug)]
struct Inner {
    state: ActionState,
    plan: Plan,
    lookup: SerializerLookup,
    cancelled: bool,
    errors: Vec<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

/// A download running in the background.
///
/// `init` either finds the result cached or resolves the object id
/// mapping, opens the export session and picks the [`DatabaseAction`]
/// for the download mode. `execute` runs it, serializes the model, caches
/// the artifact and always closes the session.
#[derive(Debug)]
pub struct LongDownloadAction {
    params: DownloadParameters,
    fingerprint: String,
    requester: Requester,
    deps: DownloadDependencies,
    cancel: CancellationToken,
    timed_out: AtomicBool,
    session: tokio::sync::Mutex<Option<Box<dyn DatabaseSession>>>,
    inner: Mutex<Inner>,
}

impl LongDownloadAction {
    /// Create an action for validated parameters.
    pub fn new(params: DownloadParameters, requester: Requester, deps: DownloadDependencies) -> Self {
        Self {
            fingerprint: params.fingerprint(),
            params,
            requester,
            deps,
            cancel: CancellationToken::new(),
            timed_out: AtomicBool::new(false),
            session: tokio::sync::Mutex::new(None),
            inner: Mutex::new(Inner {
                state: ActionState::NotStarted,
                plan: Plan::Uninitialized,
                lookup: SerializerLookup::default(),
                cancelled: false,
                errors: Vec::new(),
                started_at: None,
                finished_at: None,
            }),
        }
    }

    /// The parameters identifying this download.
    pub fn key(&self) -> &DownloadParameters {
        &self.params
    }

    /// Who submitted the download.
    pub fn requester(&self) -> &Requester {
        &self.requester
    }

    /// Whether `init` found the result already cached.
    pub fn is_cache_hit(&self) -> bool {
        matches!(self.lock().plan, Plan::CacheHit)
    }

    /// Whether an export session is currently held.
    pub async fn has_open_session(&self) -> bool {
        self.session.lock().await.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn serializer_name(&self) -> &str {
        self.params
            .serializer_name()
            .unwrap_or_else(|| self.deps.plugins.default_serializer_name())
    }

    /// Check that `uoid` may read this download's revisions, in a session
    /// of its own. Used when the export was or is being computed for
    /// someone else.
    pub(crate) async fn check_read_access(&self, uoid: Uoid) -> AppResult<()> {
        let session = self
            .cancellable(self.deps.database.create_read_only_session())
            .await?;
        let result = self
            .cancellable(authorize_revisions(session.as_ref(), uoid, self.params.roids()))
            .await;
        if let Err(e) = session.close().await {
            warn!(fingerprint = %self.fingerprint, error = %e, "Failed to close access check session");
        }
        result
    }

    /// Await `future` unless the download is cancelled first.
    async fn cancellable<T>(&self, future: impl Future<Output = AppResult<T>>) -> AppResult<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AppError::cancelled("Download was cancelled")),
            result = future => result,
        }
    }

    /// Look up the serializer record and its object id mapping in a
    /// short-lived session. Failures only cost the mapping.
    async fn lookup_serializer(&self) -> SerializerLookup {
        let name = self.serializer_name();
        let session = match self.deps.database.create_read_only_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(fingerprint = %self.fingerprint, error = %e, "Cannot open lookup session, continuing without object IDM");
                return SerializerLookup::default();
            }
        };
        let result = self.cancellable(session.query_serializer(name)).await;
        if let Err(e) = session.close().await {
            warn!(fingerprint = %self.fingerprint, error = %e, "Failed to close lookup session");
        }

        let record = match result {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(serializer = name, "No serializer record, continuing without object IDM");
                return SerializerLookup::default();
            }
            Err(e) if e.is_cancelled() => return SerializerLookup::default(),
            Err(e) => {
                warn!(
                    fingerprint = %self.fingerprint,
                    serializer = name,
                    error = %e,
                    "Serializer lookup failed, continuing without object IDM"
                );
                return SerializerLookup::default();
            }
        };

        let object_idm = match &record.object_idm {
            Some(idm) => match self.deps.plugins.get_object_idm_by_name(&idm.plugin).await {
                Some(plugin) => Some(plugin.object_idm()),
                None => {
                    warn!(plugin = %idm.plugin, "Object IDM plugin not registered");
                    None
                }
            },
            None => None,
        };
        SerializerLookup {
            object_idm,
            plugin: Some(record.plugin),
            disabled: !record.enabled,
        }
    }

    /// The serializer plugin: the record's plugin, then a plugin named
    /// like the serializer, then the configured default.
    async fn resolve_serializer(&self, record_plugin: Option<&str>) -> AppResult<Arc<dyn SerializerPlugin>> {
        if let Some(plugin) = record_plugin {
            if let Some(found) = self.deps.plugins.get_serializer_by_name(plugin).await {
                return Ok(found);
            }
            warn!(plugin, "Serializer plugin from record not registered");
        }
        if let Some(found) = self.deps.plugins.get_serializer_by_name(self.serializer_name()).await {
            return Ok(found);
        }
        self.deps.plugins.default_serializer().await
    }

    /// Resolve the serializer, pick the database action and open the
    /// export session.
    async fn prepare(&self) -> AppResult<()> {
        match self.deps.cache.contains(&self.params).await {
            Ok(true) => {
                self.check_read_access(self.requester.uoid).await?;
                self.lock().plan = Plan::CacheHit;
                info!(fingerprint = %self.fingerprint, "Download result already cached");
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => {
                warn!(fingerprint = %self.fingerprint, error = %e, "Cache lookup failed, downloading anyway");
            }
        }

        let lookup = self.lookup_serializer().await;
        let action = DatabaseAction::for_parameters(&self.params)?;
        let session = self
            .cancellable(self.deps.database.create_read_only_session())
            .await?;
        *self.session.lock().await = Some(session);

        let mut inner = self.lock();
        inner.lookup = lookup;
        inner.plan = Plan::Ready(Arc::new(action));
        debug!(
            fingerprint = %self.fingerprint,
            download_type = %self.params.download_type(),
            "Download initialized"
        );
        Ok(())
    }

    async fn run(&self, action: &DatabaseAction) -> AppResult<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AppError::cancelled("Download was cancelled")),
            result = self.export(action) => result,
        }
    }

    /// Query, serialize and cache. Dropped as a whole on cancellation.
    async fn export(&self, action: &DatabaseAction) -> AppResult<()> {
        let (object_idm, record_plugin, disabled) = {
            let inner = self.lock();
            (
                inner.lookup.object_idm.clone(),
                inner.lookup.plugin.clone(),
                inner.lookup.disabled,
            )
        };
        if disabled {
            return Err(AppError::plugin(format!(
                "Serializer '{}' is disabled",
                self.serializer_name()
            )));
        }
        let ctx = ActionContext::new(self.requester.uoid, self.requester.access_method)
            .with_object_idm(object_idm)
            .with_cancel(self.cancel.clone());

        let model = {
            let guard = self.session.lock().await;
            let session = guard
                .as_deref()
                .ok_or_else(|| AppError::internal("Download session is not open"))?;
            action.run(session, &ctx).await?
        };
        ctx.ensure_active()?;

        let plugin = self.resolve_serializer(record_plugin.as_deref()).await?;
        let serializer = plugin.create_serializer();
        let content_type = serializer.content_type().to_string();
        let extension = serializer.extension().to_string();
        let object_count = model.len();
        let schema = self.deps.database.schema();
        let access_method = self.requester.access_method;
        let data = tokio::task::spawn_blocking(move || {
            serializer.serialize(&model, &schema, access_method)
        })
        .await
        .map_err(|e| AppError::internal(format!("Serializer task failed: {e}")))??;

        let artifact = DownloadArtifact {
            serializer: plugin.info().name,
            content_type,
            extension,
            object_count,
            data,
        };
        debug!(fingerprint = %self.fingerprint, size = artifact.len(), "Caching download result");
        self.deps.cache.put(&self.params, artifact).await
    }

    async fn close_session(&self) {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            if let Err(e) = session.close().await {
                warn!(fingerprint = %self.fingerprint, error = %e, "Failed to close download session");
            }
        }
    }

    fn finish(&self, outcome: AppResult<()>) {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return;
        }
        match outcome {
            Ok(()) => {
                inner.state = ActionState::Finished;
                info!(fingerprint = %self.fingerprint, "Download finished");
            }
            Err(e) if e.is_cancelled() => {
                inner.state = ActionState::Finished;
                inner.cancelled = true;
                if self.timed_out.load(Ordering::SeqCst) {
                    inner.errors.push(TIMEOUT_MESSAGE.to_string());
                }
                info!(fingerprint = %self.fingerprint, "Download cancelled");
            }
            Err(e) => {
                error!(
                    fingerprint = %self.fingerprint,
                    download_type = %self.params.download_type(),
                    error = %e,
                    "Download failed"
                );
                inner.state = ActionState::Failed;
                inner.errors.push(e.to_string());
            }
        }
        inner.finished_at = Some(Utc::now());
    }
}

#[async_trait]
impl LongAction for LongDownloadAction {
    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn dedup_key(&self) -> String {
        self.fingerprint.clone()
    }

    async fn init(&self) -> AppResult<()> {
        if self.cancel.is_cancelled() {
            return Ok(());
        }
        self.prepare().await
    }

    async fn execute(&self) {
        let plan = {
            let mut inner = self.lock();
            if inner.state.is_terminal() {
                None
            } else {
                inner.state = ActionState::Started;
                inner.started_at = Some(Utc::now());
                Some(inner.plan.clone())
            }
        };
        let Some(plan) = plan else {
            self.close_session().await;
            return;
        };

        info!(
            fingerprint = %self.fingerprint,
            download_type = %self.params.download_type(),
            "Download started"
        );
        let outcome = match plan {
            Plan::Uninitialized => Err(AppError::internal("Download executed before init")),
            Plan::CacheHit => Ok(()),
            Plan::Ready(action) => self.run(&action).await,
        };
        self.close_session().await;
        self.finish(outcome);
    }

    async fn fail(&self, error: AppError) {
        self.close_session().await;
        self.finish(Err(error));
    }

    fn state(&self) -> LongActionState {
        let inner = self.lock();
        let progress = match inner.state {
            ActionState::Finished | ActionState::Failed => 100,
            ActionState::NotStarted => inner.plan.progress(),
            ActionState::Started => inner.plan.progress().min(99),
        };
        LongActionState {
            state: inner.state,
            progress,
            title: DESCRIPTION.to_string(),
            cancelled: inner.cancelled,
            errors: inner.errors.clone(),
            started_at: inner.started_at,
            finished_at: inner.finished_at,
        }
    }

    fn cancel(&self) -> bool {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return false;
        }
        self.cancel.cancel();
        if inner.state == ActionState::NotStarted {
            inner.state = ActionState::Finished;
            inner.cancelled = true;
            if self.timed_out.load(Ordering::SeqCst) {
                inner.errors.push(TIMEOUT_MESSAGE.to_string());
            }
            inner.finished_at = Some(Utc::now());
        }
        info!(fingerprint = %self.fingerprint, "Download cancellation requested");
        true
    }

    fn time_out(&self) -> bool {
        self.timed_out.store(true, Ordering::SeqCst);
        let cancelled = self.cancel();
        if cancelled {
            warn!(fingerprint = %self.fingerprint, "Download timed out");
        }
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimhub_cache::DownloadCacheManager;
    use bimhub_core::config::PluginConfig;
    use bimhub_core::types::id::Roid;
    use bimhub_database::MemoryObjectDatabase;
    use bimhub_entity::model::SchemaDefinition;

    fn action(db: &MemoryObjectDatabase) -> LongDownloadAction {
        LongDownloadAction::new(
            DownloadParameters::revision(Roid::new(1)),
            Requester {
                uoid: Uoid::new(1),
                access_method: AccessMethod::Internal,
                caller_id: "test".to_string(),
            },
            DownloadDependencies {
                database: Arc::new(db.clone()),
                cache: Arc::new(DownloadCacheManager::disabled()),
                plugins: Arc::new(PluginRegistry::with_builtins(&PluginConfig::default())),
            },
        )
    }

    #[tokio::test]
    async fn test_fresh_action_is_not_started() {
        let db = MemoryObjectDatabase::new(SchemaDefinition::ifc2x3_core());
        let action = action(&db);
        let state = action.state();
        assert_eq!(state.state, ActionState::NotStarted);
        assert_eq!(state.progress, 0);
        assert_eq!(state.title, "Download");
        assert_eq!(action.description(), "Download");
    }

    #[tokio::test]
    async fn test_cancel_before_execute_releases_session() {
        let db = MemoryObjectDatabase::new(SchemaDefinition::ifc2x3_core());
        let action = action(&db);
        action.init().await.unwrap();
        assert!(action.has_open_session().await);

        assert!(action.cancel());
        assert!(!action.cancel());
        action.execute().await;

        let state = action.state();
        assert_eq!(state.state, ActionState::Finished);
        assert!(state.cancelled);
        assert_eq!(state.progress, 100);
        assert!(!action.has_open_session().await);
        assert_eq!(db.stats().open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_execute_without_init_fails() {
        let db = MemoryObjectDatabase::new(SchemaDefinition::ifc2x3_core());
        let action = action(&db);
        action.execute().await;
        let state = action.state();
        assert_eq!(state.state, ActionState::Failed);
        assert_eq!(state.progress, 100);
        assert_eq!(state.errors.len(), 1);
    }
}
