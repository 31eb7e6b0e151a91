//! `DOWNLOAD_PROJECTS`: latest revisions of whole projects.

use std::collections::BTreeSet;

use tracing::debug;

use bimhub_core::result::AppResult;
use bimhub_core::types::id::Roid;
use bimhub_database::{Condition, DatabaseSession};
use bimhub_entity::model::IfcModel;

use super::{ActionContext, Progress, acting_user, authorize, fill_model, query_mapped};

/// Downloads the latest revision of every project owning one of the
/// given revisions. Each project is read once.
#[derive(Debug)]
pub struct DownloadProjectsAction {
    roids: Vec<Roid>,
    progress: Progress,
}

impl DownloadProjectsAction {
    /// Configure the action.
    pub fn new(roids: Vec<Roid>) -> Self {
        Self {
            roids,
            progress: Progress::default(),
        }
    }

    /// Percent complete.
    pub fn progress(&self) -> u8 {
        self.progress.get()
    }

    /// Read the projects.
    pub async fn run(
        &self,
        session: &dyn DatabaseSession,
        ctx: &ActionContext,
    ) -> AppResult<IfcModel> {
        let user = acting_user(session, ctx).await?;

        let mut latest = BTreeSet::new();
        for roid in self.roids.iter().copied() {
            ctx.ensure_active()?;
            let Some(revision) = session.get_revision(roid).await? else {
                debug!(roid = %roid, "Skipping unknown revision");
                continue;
            };
            let project = authorize(session, &user, &revision).await?;
            match project.last_revision {
                Some(last) => {
                    latest.insert(last);
                }
                None => debug!(poid = %project.poid, "Project has no revisions"),
            }
        }
        self.progress.set(10);

        // Lookups take the first tenth; reading the snapshots the rest.
        let scale = |p: u8| 10 + u8::try_from(u16::from(p) * 9 / 10).unwrap_or(90);
        let mut model = IfcModel::new();
        let total = latest.len();
        for (i, roid) in latest.into_iter().enumerate() {
            ctx.ensure_active()?;
            let objects = query_mapped(session, ctx, roid, &Condition::All).await?;
            let (from, to) = Progress::slot(i, total);
            fill_model(&mut model, objects, &self.progress, (scale(from), scale(to)), ctx)?;
        }
        self.progress.set(100);
        Ok(model)
    }
}
