//! In-memory object database.
//!
//! Used for development servers and tests. Besides the store itself it
//! counts sessions and queries and can inject failures or hold object and serializer
//! queries, so callers can observe how a download uses the database.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, watch};
use tracing::{debug, info};

use bimhub_core::error::AppError;
use bimhub_core::result::AppResult;
use bimhub_core::types::id::{Poid, Roid, Uoid};
use bimhub_entity::model::{IfcObject, SchemaDefinition};
use bimhub_entity::store::{Project, Revision, SerializerRecord, User};

use crate::condition::Condition;
use crate::session::{DatabaseSession, ObjectDatabase};

#[derive(Debug, Default)]
struct StoreData {
    users: HashMap<Uoid, User>,
    projects: HashMap<Poid, Project>,
    revisions: HashMap<Roid, Revision>,
    objects: HashMap<Roid, Vec<IfcObject>>,
    serializers: HashMap<String, SerializerRecord>,
}

/// Counters describing how the database has been used.
#[derive(Debug, Default)]
pub struct DatabaseStats {
    sessions_opened: AtomicUsize,
    sessions_closed: AtomicUsize,
    object_queries: AtomicUsize,
    serializer_queries: AtomicUsize,
}

impl DatabaseStats {
    /// Sessions opened so far.
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    /// Sessions closed so far.
    pub fn sessions_closed(&self) -> usize {
        self.sessions_closed.load(Ordering::SeqCst)
    }

    /// Sessions opened and not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.sessions_opened().saturating_sub(self.sessions_closed())
    }

    /// Object queries executed so far.
    pub fn object_queries(&self) -> usize {
        self.object_queries.load(Ordering::SeqCst)
    }

    /// Serializer lookups executed so far.
    pub fn serializer_queries(&self) -> usize {
        self.serializer_queries.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct Faults {
    fail_sessions: AtomicBool,
    fail_object_queries: AtomicBool,
    fail_serializer_queries: AtomicBool,
    hold_tx: watch::Sender<bool>,
    hold_serializers_tx: watch::Sender<bool>,
}

impl Default for Faults {
    fn default() -> Self {
        let (hold_tx, _) = watch::channel(false);
        let (hold_serializers_tx, _) = watch::channel(false);
        Self {
            fail_sessions: AtomicBool::new(false),
            fail_object_queries: AtomicBool::new(false),
            fail_serializer_queries: AtomicBool::new(false),
            hold_tx,
            hold_serializers_tx,
        }
    }
}

/// Store contents loadable from a JSON seed file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySeed {
    /// Users.
    #[serde(default)]
    pub users: Vec<User>,
    /// Projects.
    #[serde(default)]
    pub projects: Vec<Project>,
    /// Revisions with their objects.
    #[serde(default)]
    pub revisions: Vec<SeedRevision>,
    /// Serializer records.
    #[serde(default)]
    pub serializers: Vec<SerializerRecord>,
}

/// A revision together with its objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedRevision {
    /// The revision record.
    pub revision: Revision,
    /// Objects contained in the revision.
    #[serde(default)]
    pub objects: Vec<IfcObject>,
}

/// Object database kept entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryObjectDatabase {
    data: Arc<RwLock<StoreData>>,
    schema: Arc<SchemaDefinition>,
    stats: Arc<DatabaseStats>,
    faults: Arc<Faults>,
}

impl MemoryObjectDatabase {
    /// Create an empty database for the given schema.
    pub fn new(schema: SchemaDefinition) -> Self {
        Self {
            data: Arc::new(RwLock::new(StoreData::default())),
            schema: Arc::new(schema),
            stats: Arc::new(DatabaseStats::default()),
            faults: Arc::new(Faults::default()),
        }
    }

    /// Load store contents from a JSON seed file.
    pub async fn load_seed_file(&self, path: impl AsRef<Path>) -> AppResult<()> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await.map_err(|e| {
            AppError::configuration(format!("Cannot read seed file {}: {e}", path.display()))
        })?;
        let seed: MemorySeed = serde_json::from_slice(&raw)?;
        self.load_seed(seed).await;
        info!(path = %path.display(), "Loaded in-memory database seed");
        Ok(())
    }

    /// Load store contents.
    pub async fn load_seed(&self, seed: MemorySeed) {
        for user in seed.users {
            self.add_user(user).await;
        }
        for project in seed.projects {
            self.add_project(project).await;
        }
        for entry in seed.revisions {
            self.add_revision(entry.revision, entry.objects).await;
        }
        for serializer in seed.serializers {
            self.add_serializer(serializer).await;
        }
    }

    /// Insert or replace a user.
    pub async fn add_user(&self, user: User) {
        self.data.write().await.users.insert(user.uoid, user);
    }

    /// Insert or replace a project.
    pub async fn add_project(&self, project: Project) {
        self.data.write().await.projects.insert(project.poid, project);
    }

    /// Insert a revision with its objects and make it the project's latest
    /// revision when its number is the highest seen.
    pub async fn add_revision(&self, revision: Revision, mut objects: Vec<IfcObject>) {
        let mut data = self.data.write().await;
        objects.sort_by_key(|o| o.oid);
        let newest = data
            .projects
            .get(&revision.poid)
            .and_then(|p| p.last_revision)
            .and_then(|roid| data.revisions.get(&roid))
            .is_none_or(|current| current.number <= revision.number);
        if newest {
            if let Some(project) = data.projects.get_mut(&revision.poid) {
                project.last_revision = Some(revision.roid);
            }
        }
        data.objects.insert(revision.roid, objects);
        data.revisions.insert(revision.roid, revision);
    }

    /// Insert or replace a serializer record.
    pub async fn add_serializer(&self, serializer: SerializerRecord) {
        self.data
            .write()
            .await
            .serializers
            .insert(serializer.name.clone(), serializer);
    }

    /// Usage counters.
    pub fn stats(&self) -> &DatabaseStats {
        &self.stats
    }

    /// Make session creation fail.
    pub fn fail_sessions(&self, fail: bool) {
        self.faults.fail_sessions.store(fail, Ordering::SeqCst);
    }

    /// Make object queries fail.
    pub fn fail_object_queries(&self, fail: bool) {
        self.faults.fail_object_queries.store(fail, Ordering::SeqCst);
    }

    /// Make serializer lookups fail.
    pub fn fail_serializer_queries(&self, fail: bool) {
        self.faults
            .fail_serializer_queries
            .store(fail, Ordering::SeqCst);
    }

    /// Block object queries until released with `hold_object_queries(false)`.
    pub fn hold_object_queries(&self, hold: bool) {
        self.faults.hold_tx.send_replace(hold);
    }

    /// Block serializer lookups until released.
    pub fn hold_serializer_queries(&self, hold: bool) {
        self.faults.hold_serializers_tx.send_replace(hold);
    }
}

#[async_trait]
impl ObjectDatabase for MemoryObjectDatabase {
    async fn create_read_only_session(&self) -> AppResult<Box<dyn DatabaseSession>> {
        if self.faults.fail_sessions.load(Ordering::SeqCst) {
            return Err(AppError::database("Injected failure: cannot open session"));
        }
        let id = self.stats.sessions_opened.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(session = id, "Opened read-only memory session");
        Ok(Box::new(MemorySession {
            id,
            data: Arc::clone(&self.data),
            schema: Arc::clone(&self.schema),
            stats: Arc::clone(&self.stats),
            faults: Arc::clone(&self.faults),
            closed: AtomicBool::new(false),
        }))
    }

    fn schema(&self) -> Arc<SchemaDefinition> {
        Arc::clone(&self.schema)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

/// A read-only session over a [`MemoryObjectDatabase`].
#[derive(Debug)]
pub struct MemorySession {
    id: usize,
    data: Arc<RwLock<StoreData>>,
    schema: Arc<SchemaDefinition>,
    stats: Arc<DatabaseStats>,
    faults: Arc<Faults>,
    closed: AtomicBool,
}

impl MemorySession {
    fn ensure_open(&self) -> AppResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AppError::database(format!("Session {} is closed", self.id)));
        }
        Ok(())
    }
}

#[async_trait]
impl DatabaseSession for MemorySession {
    fn schema(&self) -> &SchemaDefinition {
        &self.schema
    }

    async fn get_user(&self, uoid: Uoid) -> AppResult<Option<User>> {
        self.ensure_open()?;
        Ok(self.data.read().await.users.get(&uoid).cloned())
    }

    async fn get_project(&self, poid: Poid) -> AppResult<Option<Project>> {
        self.ensure_open()?;
        Ok(self.data.read().await.projects.get(&poid).cloned())
    }

    async fn get_revision(&self, roid: Roid) -> AppResult<Option<Revision>> {
        self.ensure_open()?;
        Ok(self.data.read().await.revisions.get(&roid).cloned())
    }

    async fn query_objects(&self, roid: Roid, condition: &Condition) -> AppResult<Vec<IfcObject>> {
        self.ensure_open()?;
        let mut hold = self.faults.hold_tx.subscribe();
        // A dropped sender cannot happen while the session holds the faults.
        let _ = hold.wait_for(|held| !*held).await;
        self.stats.object_queries.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_object_queries.load(Ordering::SeqCst) {
            return Err(AppError::database(format!(
                "Injected failure querying revision {roid}"
            )));
        }
        let data = self.data.read().await;
        Ok(data
            .objects
            .get(&roid)
            .map(|objects| {
                objects
                    .iter()
                    .filter(|o| condition.matches(o))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn query_serializer(&self, name: &str) -> AppResult<Option<SerializerRecord>> {
        self.ensure_open()?;
        let mut hold = self.faults.hold_serializers_tx.subscribe();
        let _ = hold.wait_for(|held| !*held).await;
        self.stats.serializer_queries.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_serializer_queries.load(Ordering::SeqCst) {
            return Err(AppError::deadlock(format!(
                "Injected deadlock looking up serializer '{name}'"
            )));
        }
        Ok(self.data.read().await.serializers.get(name).cloned())
    }

    async fn close(&self) -> AppResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.stats.sessions_closed.fetch_add(1, Ordering::SeqCst);
            debug!(session = self.id, "Closed memory session");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimhub_core::types::id::Oid;
    use chrono::Utc;

    fn revision(roid: i64, poid: i64, number: i32) -> Revision {
        Revision {
            roid: Roid::new(roid),
            poid: Poid::new(poid),
            number,
            comment: String::new(),
            created_at: Utc::now(),
        }
    }

    async fn seeded() -> MemoryObjectDatabase {
        let db = MemoryObjectDatabase::new(SchemaDefinition::ifc2x3_core());
        db.add_project(Project {
            poid: Poid::new(1),
            name: "Tower".to_string(),
            last_revision: None,
            authorized_users: vec![],
        })
        .await;
        db.add_revision(
            revision(7, 1, 1),
            vec![
                IfcObject::new(Oid::new(102), "IfcDoor", Uoid::new(1)),
                IfcObject::new(Oid::new(101), "IfcWall", Uoid::new(1)),
            ],
        )
        .await;
        db
    }

    #[tokio::test]
    async fn test_query_objects_sorted_and_filtered() {
        let db = seeded().await;
        let session = db.create_read_only_session().await.unwrap();
        let all = session.query_objects(Roid::new(7), &Condition::All).await.unwrap();
        assert_eq!(all.iter().map(|o| o.oid.value()).collect::<Vec<_>>(), vec![101, 102]);
        let walls = session
            .query_objects(Roid::new(7), &Condition::type_in(["ifcwall"]))
            .await
            .unwrap();
        assert_eq!(walls.len(), 1);
        let unknown = session.query_objects(Roid::new(99), &Condition::All).await.unwrap();
        assert!(unknown.is_empty());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_latest_revision_tracking() {
        let db = seeded().await;
        db.add_revision(revision(9, 1, 3), vec![]).await;
        db.add_revision(revision(8, 1, 2), vec![]).await;
        let session = db.create_read_only_session().await.unwrap();
        let project = session.get_project(Poid::new(1)).await.unwrap().unwrap();
        assert_eq!(project.last_revision, Some(Roid::new(9)));
    }

    #[tokio::test]
    async fn test_closed_session_rejects_queries() {
        let db = seeded().await;
        let session = db.create_read_only_session().await.unwrap();
        session.close().await.unwrap();
        session.close().await.unwrap();
        assert!(session.get_revision(Roid::new(7)).await.is_err());
        assert_eq!(db.stats().sessions_opened(), 1);
        assert_eq!(db.stats().sessions_closed(), 1);
        assert_eq!(db.stats().open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let db = seeded().await;
        db.fail_object_queries(true);
        let session = db.create_read_only_session().await.unwrap();
        let err = session
            .query_objects(Roid::new(7), &Condition::All)
            .await
            .unwrap_err();
        assert!(err.is_database());

        db.fail_sessions(true);
        assert!(db.create_read_only_session().await.is_err());
    }

    #[tokio::test]
    async fn test_seed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        let seed = MemorySeed {
            users: vec![User {
                uoid: Uoid::new(1),
                username: "admin".to_string(),
                user_type: bimhub_entity::store::UserType::Admin,
            }],
            ..MemorySeed::default()
        };
        tokio::fs::write(&path, serde_json::to_vec(&seed).unwrap())
            .await
            .unwrap();

        let db = MemoryObjectDatabase::new(SchemaDefinition::ifc2x3_core());
        db.load_seed_file(&path).await.unwrap();
        let session = db.create_read_only_session().await.unwrap();
        assert!(session.get_user(Uoid::new(1)).await.unwrap().is_some());
    }
}
