//! `DOWNLOAD_OF_TYPE`: objects of given types, optionally with subtypes.

use std::collections::BTreeSet;

use bimhub_core::result::AppResult;
use bimhub_core::types::id::Roid;
use bimhub_database::{Condition, DatabaseSession};
use bimhub_entity::model::{IfcModel, SchemaDefinition};

use super::{ActionContext, Progress, acting_user, fill_model, query_mapped, readable_revision};

/// Downloads every object whose type is one of the requested names.
#[derive(Debug)]
pub struct DownloadOfTypeAction {
    roids: Vec<Roid>,
    class_names: BTreeSet<String>,
    include_all_subtypes: bool,
    progress: Progress,
}

impl DownloadOfTypeAction {
    /// Configure the action.
    pub fn new(roids: Vec<Roid>, class_names: BTreeSet<String>, include_all_subtypes: bool) -> Self {
        Self {
            roids,
            class_names,
            include_all_subtypes,
            progress: Progress::default(),
        }
    }

    /// Percent complete.
    pub fn progress(&self) -> u8 {
        self.progress.get()
    }

    /// Requested type names, expanded with their transitive subtypes when
    /// asked to.
    pub fn resolve_types(&self, schema: &SchemaDefinition) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self.class_names.clone();
        if self.include_all_subtypes {
            for name in &self.class_names {
                names.extend(schema.subtypes_of(name));
            }
        }
        names
    }

    /// Read the matching objects.
    pub async fn run(
        &self,
        session: &dyn DatabaseSession,
        ctx: &ActionContext,
    ) -> AppResult<IfcModel> {
        let mut model = IfcModel::new();
        if self.class_names.is_empty() {
            self.progress.set(100);
            return Ok(model);
        }
        let user = acting_user(session, ctx).await?;
        let condition = Condition::type_in(self.resolve_types(session.schema()));
        let total = self.roids.len();

        for (i, roid) in self.roids.iter().copied().enumerate() {
            ctx.ensure_active()?;
            if readable_revision(session, &user, roid).await?.is_none() {
                continue;
            }
            let objects = query_mapped(session, ctx, roid, &condition).await?;
            fill_model(&mut model, objects, &self.progress, Progress::slot(i, total), ctx)?;
        }
        self.progress.set(100);
        Ok(model)
    }
}
