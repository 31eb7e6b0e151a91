//! `DOWNLOAD_COMPARE`: differences between two revisions.

use std::collections::BTreeMap;

use bimhub_core::result::AppResult;
use bimhub_core::types::id::Roid;
use bimhub_database::{Condition, DatabaseSession};
use bimhub_entity::download::{CompareIdentifier, CompareType};
use bimhub_entity::model::{ChangeKind, IfcModel, IfcObject};

use super::{ActionContext, Progress, acting_user, query_mapped, required_revision};

/// Compares `older` against `newer`, pairing objects by GUID or name.
///
/// The result holds added and modified objects as they are in `newer`
/// and deleted objects as they were in `older`, each annotated with its
/// [`ChangeKind`]. Objects lacking the identifier are not compared.
#[derive(Debug)]
pub struct DownloadCompareAction {
    older: Roid,
    newer: Roid,
    identifier: CompareIdentifier,
    compare_type: CompareType,
    progress: Progress,
}

impl DownloadCompareAction {
    /// Configure the action.
    pub fn new(
        older: Roid,
        newer: Roid,
        identifier: CompareIdentifier,
        compare_type: CompareType,
    ) -> Self {
        Self {
            older,
            newer,
            identifier,
            compare_type,
            progress: Progress::default(),
        }
    }

    /// Percent complete.
    pub fn progress(&self) -> u8 {
        self.progress.get()
    }

    /// Read both revisions and diff them.
    pub async fn run(
        &self,
        session: &dyn DatabaseSession,
        ctx: &ActionContext,
    ) -> AppResult<IfcModel> {
        let user = acting_user(session, ctx).await?;
        required_revision(session, &user, self.older).await?;
        required_revision(session, &user, self.newer).await?;
        self.progress.set(5);

        ctx.ensure_active()?;
        let older = query_mapped(session, ctx, self.older, &Condition::All).await?;
        self.progress.set(35);

        ctx.ensure_active()?;
        let newer = query_mapped(session, ctx, self.newer, &Condition::All).await?;
        self.progress.set(70);

        ctx.ensure_active()?;
        let model = self.diff(older, newer);
        self.progress.set(100);
        Ok(model)
    }

    /// Diff two object lists, keeping only the changes selected by the
    /// compare type.
    pub fn diff(&self, older: Vec<IfcObject>, newer: Vec<IfcObject>) -> IfcModel {
        let mut before = self.index(older);
        let after = self.index(newer);
        let mut model = IfcModel::new();

        for (key, object) in after {
            let kind = match before.remove(&key) {
                None => Some(ChangeKind::Added),
                Some(previous) if differs(&previous, &object) => Some(ChangeKind::Modified),
                Some(_) => None,
            };
            if let Some(kind) = kind.filter(|k| self.compare_type.includes(*k)) {
                model.add_change(object, kind);
            }
        }
        if self.compare_type.includes(ChangeKind::Deleted) {
            for object in before.into_values() {
                model.add_change(object, ChangeKind::Deleted);
            }
        }
        model
    }

    /// Objects keyed by identifier. Lists arrive ordered by oid, so the
    /// lowest oid wins when an identifier repeats.
    fn index(&self, objects: Vec<IfcObject>) -> BTreeMap<String, IfcObject> {
        let mut index = BTreeMap::new();
        for object in objects {
            let key = match self.identifier {
                CompareIdentifier::GuidId => object.guid.clone(),
                CompareIdentifier::NameId => object.name.clone(),
            };
            if let Some(key) = key {
                index.entry(key).or_insert(object);
            }
        }
        index
    }
}

fn differs(a: &IfcObject, b: &IfcObject) -> bool {
    a.name != b.name || !a.type_name.eq_ignore_ascii_case(&b.type_name) || a.attributes != b.attributes
}
