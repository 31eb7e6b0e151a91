//! `DOWNLOAD_BY_OIDS`: explicit objects across revisions.

use std::collections::BTreeSet;

use bimhub_core::result::AppResult;
use bimhub_core::types::id::{Oid, Roid};
use bimhub_database::{Condition, DatabaseSession};
use bimhub_entity::model::IfcModel;

use super::{ActionContext, Progress, acting_user, fill_model, query_mapped, readable_revision};

/// Downloads the objects with the given oids from each revision.
/// Unknown revisions and oids are skipped.
#[derive(Debug)]
pub struct DownloadByOidsAction {
    roids: Vec<Roid>,
    oids: BTreeSet<Oid>,
    progress: Progress,
}

impl DownloadByOidsAction {
    /// Configure the action.
    pub fn new(roids: Vec<Roid>, oids: BTreeSet<Oid>) -> Self {
        Self {
            roids,
            oids,
            progress: Progress::default(),
        }
    }

    /// Percent complete.
    pub fn progress(&self) -> u8 {
        self.progress.get()
    }

    /// Read the selected objects.
    pub async fn run(
        &self,
        session: &dyn DatabaseSession,
        ctx: &ActionContext,
    ) -> AppResult<IfcModel> {
        let mut model = IfcModel::new();
        if self.oids.is_empty() {
            self.progress.set(100);
            return Ok(model);
        }
        let user = acting_user(session, ctx).await?;
        let condition = Condition::OidIn(self.oids.clone());
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
