//! Shared fixture for download tests: a seeded in-memory store, a memory
//! result cache and the built-in plugins.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Value, json};

use bimhub_cache::{DownloadCache, DownloadCacheManager};
use bimhub_core::config::{CacheConfig, PluginConfig, WorkerConfig};
use bimhub_core::result::AppResult;
use bimhub_core::types::id::{Oid, Poid, Roid, Ticket, Uoid};
use bimhub_database::MemoryObjectDatabase;
use bimhub_entity::action::LongActionState;
use bimhub_entity::download::DownloadParameters;
use bimhub_entity::model::{IfcObject, SchemaDefinition};
use bimhub_entity::store::{
    AccessMethod, ObjectIdmRecord, Project, Revision, SerializerRecord, User, UserType,
};
use bimhub_plugin::PluginRegistry;
use bimhub_worker::{DownloadDependencies, DownloadRequest, DownloadService, LongActionManager};

pub const ADMIN: Uoid = Uoid::new(1);
pub const ALICE: Uoid = Uoid::new(2);
pub const MALLORY: Uoid = Uoid::new(3);

/// Tower, first revision: walls, a slab and a door.
pub const TOWER_V1: Roid = Roid::new(7);
/// Tower, second revision: slab 102 removed, wall 104 added.
pub const TOWER_V2: Roid = Roid::new(8);
/// Bridge, only revision.
pub const BRIDGE_V1: Roid = Roid::new(9);
/// Vault, readable by admins only.
pub const VAULT_V1: Roid = Roid::new(10);
/// Annex, a revision without objects.
pub const ANNEX_V1: Roid = Roid::new(11);

pub fn schema() -> SchemaDefinition {
    SchemaDefinition::new("TEST")
        .with_entity("Element", None)
        .with_entity("Wall", Some("Element"))
        .with_entity("WallStandardCase", Some("Wall"))
        .with_entity("Slab", Some("Element"))
        .with_entity("Door", Some("Element"))
}

fn object(oid: i64, type_name: &str, owner: Uoid) -> IfcObject {
    IfcObject::new(Oid::new(oid), type_name, owner).with_guid(format!("g-{oid}"))
}

fn project(poid: i64, name: &str, authorized_users: Vec<Uoid>) -> Project {
    Project {
        poid: Poid::new(poid),
        name: name.to_string(),
        last_revision: None,
        authorized_users,
    }
}

fn revision(roid: Roid, poid: i64, number: i32) -> Revision {
    Revision {
        roid,
        poid: Poid::new(poid),
        number,
        comment: format!("revision {number}"),
        created_at: Utc::now(),
    }
}

fn user(uoid: Uoid, username: &str, user_type: UserType) -> User {
    User {
        uoid,
        username: username.to_string(),
        user_type,
    }
}

pub struct Fixture {
    pub db: MemoryObjectDatabase,
    pub cache: Arc<DownloadCacheManager>,
    pub service: DownloadService,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_worker(WorkerConfig {
            action_timeout_seconds: 0,
            ..WorkerConfig::default()
        })
        .await
    }

    pub async fn with_worker(worker: WorkerConfig) -> Self {
        let db = MemoryObjectDatabase::new(schema());
        seed(&db).await;

        let cache = Arc::new(
            DownloadCacheManager::new(&CacheConfig::default())
                .await
                .expect("memory cache"),
        );
        let plugins = Arc::new(PluginRegistry::with_builtins(&PluginConfig {
            ignored_fields: vec!["*.Tag".to_string()],
            ..PluginConfig::default()
        }));
        let deps = DownloadDependencies {
            database: Arc::new(db.clone()),
            cache: cache.clone(),
            plugins,
        };
        let service = DownloadService::new(deps, LongActionManager::new(worker));
        Self { db, cache, service }
    }

    pub fn request(&self, parameters: DownloadParameters, uoid: Uoid) -> DownloadRequest {
        DownloadRequest {
            parameters,
            uoid,
            access_method: AccessMethod::Internal,
            caller_id: "test-client".to_string(),
        }
    }

    pub async fn submit(&self, parameters: DownloadParameters) -> Ticket {
        self.submit_as(parameters, ALICE).await.expect("submit")
    }

    pub async fn submit_as(&self, parameters: DownloadParameters, uoid: Uoid) -> AppResult<Ticket> {
        self.service.submit(self.request(parameters, uoid)).await
    }

    /// Submit as Alice and wait for the terminal state.
    pub async fn run(&self, parameters: DownloadParameters) -> (Ticket, LongActionState) {
        self.run_as(parameters, ALICE).await
    }

    pub async fn run_as(
        &self,
        parameters: DownloadParameters,
        uoid: Uoid,
    ) -> (Ticket, LongActionState) {
        let ticket = self.submit_as(parameters, uoid).await.expect("submit");
        let state = self.service.wait(ticket).await.expect("wait");
        (ticket, state)
    }

    /// The exported objects of a finished download.
    pub async fn objects(&self, ticket: Ticket) -> Vec<Value> {
        let result = self
            .service
            .result(ticket)
            .await
            .expect("result")
            .expect("cached artifact");
        let document: Value = serde_json::from_slice(&result.artifact.data).expect("json");
        document["objects"].as_array().cloned().unwrap_or_default()
    }

    pub async fn oids(&self, ticket: Ticket) -> Vec<i64> {
        self.objects(ticket)
            .await
            .iter()
            .filter_map(|o| o["oid"].as_i64())
            .collect()
    }

    /// The `object_count` written in a finished download's header.
    pub async fn object_count(&self, ticket: Ticket) -> u64 {
        let result = self
            .service
            .result(ticket)
            .await
            .expect("result")
            .expect("cached artifact");
        let document: Value = serde_json::from_slice(&result.artifact.data).expect("json");
        document["header"]["object_count"].as_u64().expect("object count")
    }

    /// Forget the latest revision of the Annex project.
    pub async fn clear_annex_latest_revision(&self) {
        self.db.add_project(project(4, "Annex", vec![ALICE])).await;
    }

    pub async fn is_cached(&self, parameters: &DownloadParameters) -> bool {
        self.cache.contains(parameters).await.expect("cache lookup")
    }

    /// Poll until `predicate` holds for the download's state.
    pub async fn wait_until<F>(&self, ticket: Ticket, predicate: F) -> LongActionState
    where
        F: Fn(&LongActionState) -> bool,
    {
        for _ in 0..500 {
            let state = self.service.poll(ticket).expect("poll");
            if predicate(&state) {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("download {ticket} never reached the expected state");
    }
}

async fn seed(db: &MemoryObjectDatabase) {
    db.add_user(user(ADMIN, "admin", UserType::Admin)).await;
    db.add_user(user(ALICE, "alice", UserType::User)).await;
    db.add_user(user(MALLORY, "mallory", UserType::User)).await;

    db.add_project(project(1, "Tower", vec![ALICE])).await;
    db.add_project(project(2, "Bridge", vec![ALICE])).await;
    db.add_project(project(3, "Vault", vec![])).await;
    db.add_project(project(4, "Annex", vec![ALICE])).await;

    let north_wall = object(101, "Wall", ALICE)
        .with_name("North wall")
        .with_attribute("Tag", json!("W-01"))
        .with_attribute("Height", json!(3.2));
    let slab = object(102, "Slab", MALLORY);
    let door = object(103, "Door", ALICE).with_name("Entrance");
    let standard_wall = object(105, "WallStandardCase", ALICE).with_name("East wall");

    db.add_revision(
        revision(TOWER_V1, 1, 1),
        vec![north_wall.clone(), slab, door.clone(), standard_wall.clone()],
    )
    .await;
    db.add_revision(
        revision(TOWER_V2, 1, 2),
        vec![
            north_wall,
            door,
            standard_wall,
            object(104, "Wall", ALICE).with_name("South wall"),
        ],
    )
    .await;
    db.add_revision(revision(BRIDGE_V1, 2, 1), vec![object(201, "Wall", ALICE)])
        .await;
    db.add_revision(revision(VAULT_V1, 3, 1), vec![object(301, "Door", ADMIN)])
        .await;
    db.add_revision(revision(ANNEX_V1, 4, 1), vec![]).await;

    db.add_serializer(SerializerRecord {
        name: "JsonSerializer".to_string(),
        plugin: "JsonSerializer".to_string(),
        enabled: true,
        object_idm: Some(ObjectIdmRecord {
            name: "ignore-tags".to_string(),
            plugin: "FieldIgnoreObjectIdm".to_string(),
        }),
    })
    .await;
    db.add_serializer(SerializerRecord {
        name: "Retired".to_string(),
        plugin: "JsonSerializer".to_string(),
        enabled: false,
        object_idm: None,
    })
    .await;
}
