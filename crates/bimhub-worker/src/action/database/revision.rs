//! `DOWNLOAD_REVISION`: every object of one revision.

use bimhub_core::result::AppResult;
use bimhub_core::types::id::{Roid, Uoid};
use bimhub_database::{Condition, DatabaseSession};
use bimhub_entity::model::IfcModel;

use super::{ActionContext, Progress, acting_user, fill_model, query_mapped, required_revision};

/// Downloads a complete revision, optionally leaving out the objects of
/// one owner.
#[derive(Debug)]
pub struct DownloadByRevisionAction {
    roid: Roid,
    ignore_uoid: Option<Uoid>,
    progress: Progress,
}

impl DownloadByRevisionAction {
    /// Configure the action.
    pub fn new(roid: Roid, ignore_uoid: Option<Uoid>) -> Self {
        Self {
            roid,
            ignore_uoid,
            progress: Progress::default(),
        }
    }

    /// Percent complete.
    pub fn progress(&self) -> u8 {
        self.progress.get()
    }

    /// Read the revision.
    pub async fn run(
        &self,
        session: &dyn DatabaseSession,
        ctx: &ActionContext,
    ) -> AppResult<IfcModel> {
        let user = acting_user(session, ctx).await?;
        required_revision(session, &user, self.roid).await?;
        self.progress.set(10);
        ctx.ensure_active()?;

        let condition = match self.ignore_uoid {
            Some(uoid) => Condition::OwnerIsNot(uoid),
            None => Condition::All,
        };
        let objects = query_mapped(session, ctx, self.roid, &condition).await?;
        self.progress.set(50);

        let mut model = IfcModel::new();
        fill_model(&mut model, objects, &self.progress, (50, 100), ctx)?;
        Ok(model)
    }
}
