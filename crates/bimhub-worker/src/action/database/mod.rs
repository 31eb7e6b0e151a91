//! Database actions: one per download mode.
//!
//! Each action reads from a session, reports monotonic progress and
//! produces an [`IfcModel`]. [`DatabaseAction`] is the single dispatch
//! point used both to run an action and to read its progress.

pub mod by_guids;
pub mod by_oids;
pub mod compare;
pub mod of_type;
pub mod projects;
pub mod revision;

use std::sync::atomic::{AtomicU8, Ordering};

use tracing::debug;

use bimhub_core::error::AppError;
use bimhub_core::result::AppResult;
use bimhub_core::types::id::{Roid, Uoid};
use bimhub_database::{Condition, DatabaseSession};
use bimhub_entity::download::{DownloadParameters, DownloadType};
use bimhub_entity::model::{IfcModel, IfcObject};
use bimhub_entity::store::{Project, Revision, User};

use super::ActionContext;

pub use by_guids::DownloadByGuidsAction;
pub use by_oids::DownloadByOidsAction;
pub use compare::DownloadCompareAction;
pub use of_type::DownloadOfTypeAction;
pub use projects::DownloadProjectsAction;
pub use revision::DownloadByRevisionAction;

/// Percent-complete counter that never moves backwards.
#[derive(Debug, Default)]
pub struct Progress(AtomicU8);

impl Progress {
    /// Current value, 0 to 100.
    pub fn get(&self) -> u8 {
        self.0.load(Ordering::Acquire)
    }

    /// Raise the counter to `percent`; lower values are ignored.
    pub fn set(&self, percent: u8) {
        self.0.fetch_max(percent.min(100), Ordering::AcqRel);
    }

    /// The share of `0..100` belonging to step `index` of `total`.
    pub fn slot(index: usize, total: usize) -> (u8, u8) {
        let total = total.max(1);
        let bound = |k: usize| u8::try_from(k.min(total) * 100 / total).unwrap_or(100);
        (bound(index), bound(index + 1))
    }

    /// Set the counter to `done / total` of the span `from..to`.
    pub fn span(&self, from: u8, to: u8, done: usize, total: usize) {
        if total == 0 {
            self.set(to);
            return;
        }
        let width = usize::from(to.saturating_sub(from));
        let step = width * done.min(total) / total;
        self.set(from.saturating_add(u8::try_from(step).unwrap_or(u8::MAX)));
    }
}

/// One configured, not yet run, database action.
#[derive(Debug)]
pub enum DatabaseAction {
    /// `DOWNLOAD_REVISION`.
    Revision(DownloadByRevisionAction),
    /// `DOWNLOAD_BY_OIDS`.
    ByOids(DownloadByOidsAction),
    /// `DOWNLOAD_BY_GUIDS`.
    ByGuids(DownloadByGuidsAction),
    /// `DOWNLOAD_OF_TYPE`.
    OfType(DownloadOfTypeAction),
    /// `DOWNLOAD_PROJECTS`.
    Projects(DownloadProjectsAction),
    /// `DOWNLOAD_COMPARE`.
    Compare(DownloadCompareAction),
}

impl DatabaseAction {
    /// Build the action matching the download mode of `params`.
    ///
    /// `params` must have passed [`DownloadParameters::validate`].
    pub fn for_parameters(params: &DownloadParameters) -> AppResult<Self> {
        let roids = params.roids().to_vec();
        let action = match params.download_type() {
            DownloadType::Revision => {
                let roid = params.roid().ok_or_else(|| {
                    AppError::validation("DOWNLOAD_REVISION requires a revision")
                })?;
                Self::Revision(DownloadByRevisionAction::new(roid, params.ignore_uoid()))
            }
            DownloadType::ByOids => {
                Self::ByOids(DownloadByOidsAction::new(roids, params.oids().clone()))
            }
            DownloadType::ByGuids => {
                Self::ByGuids(DownloadByGuidsAction::new(roids, params.guids().clone()))
            }
            DownloadType::OfType => Self::OfType(DownloadOfTypeAction::new(
                roids,
                params.class_names().clone(),
                params.include_all_subtypes(),
            )),
            DownloadType::Projects => Self::Projects(DownloadProjectsAction::new(roids)),
            DownloadType::Compare => {
                let (Some(identifier), Some(compare_type), [older, newer]) = (
                    params.compare_identifier(),
                    params.compare_type(),
                    params.roids(),
                ) else {
                    return Err(AppError::validation(
                        "DOWNLOAD_COMPARE requires two revisions, an identifier and a type",
                    ));
                };
                Self::Compare(DownloadCompareAction::new(
                    *older,
                    *newer,
                    identifier,
                    compare_type,
                ))
            }
        };
        Ok(action)
    }

    /// The download mode this action implements.
    pub fn download_type(&self) -> DownloadType {
        match self {
            Self::Revision(_) => DownloadType::Revision,
            Self::ByOids(_) => DownloadType::ByOids,
            Self::ByGuids(_) => DownloadType::ByGuids,
            Self::OfType(_) => DownloadType::OfType,
            Self::Projects(_) => DownloadType::Projects,
            Self::Compare(_) => DownloadType::Compare,
        }
    }

    /// Percent complete of the running action.
    pub fn progress(&self) -> u8 {
        match self {
            Self::Revision(a) => a.progress(),
            Self::ByOids(a) => a.progress(),
            Self::ByGuids(a) => a.progress(),
            Self::OfType(a) => a.progress(),
            Self::Projects(a) => a.progress(),
            Self::Compare(a) => a.progress(),
        }
    }

    /// Run the action against `session`.
    pub async fn run(
        &self,
        session: &dyn DatabaseSession,
        ctx: &ActionContext,
    ) -> AppResult<IfcModel> {
        debug!(download_type = %self.download_type(), "Running database action");
        match self {
            Self::Revision(a) => a.run(session, ctx).await,
            Self::ByOids(a) => a.run(session, ctx).await,
            Self::ByGuids(a) => a.run(session, ctx).await,
            Self::OfType(a) => a.run(session, ctx).await,
            Self::Projects(a) => a.run(session, ctx).await,
            Self::Compare(a) => a.run(session, ctx).await,
        }
    }
}

/// The user the action reads for. Unknown users may read nothing.
pub(crate) async fn acting_user(
    session: &dyn DatabaseSession,
    ctx: &ActionContext,
) -> AppResult<User> {
    known_user(session, ctx.uoid).await
}

async fn known_user(session: &dyn DatabaseSession, uoid: Uoid) -> AppResult<User> {
    session
        .get_user(uoid)
        .await?
        .ok_or_else(|| AppError::authorization(format!("Unknown user {uoid}")))
}

/// Check that `uoid` may read every known revision in `roids`.
///
/// Used when a user receives an export computed without them: a cached
/// result or a download already running for someone else.
pub async fn authorize_revisions(
    session: &dyn DatabaseSession,
    uoid: Uoid,
    roids: &[Roid],
) -> AppResult<()> {
    let user = known_user(session, uoid).await?;
    for roid in roids {
        readable_revision(session, &user, *roid).await?;
    }
    Ok(())
}

/// Check that `user` may read the project owning `revision`.
pub(crate) async fn authorize(
    session: &dyn DatabaseSession,
    user: &User,
    revision: &Revision,
) -> AppResult<Project> {
    let project = session
        .get_project(revision.poid)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Project {} not found", revision.poid)))?;
    if !project.has_read_access(user) {
        return Err(AppError::authorization(format!(
            "User '{}' has no read access to project {}",
            user.username, project.poid
        )));
    }
    Ok(project)
}

/// The revision if it exists and `user` may read it. Unknown revisions
/// yield `None`; unreadable ones are an authorization error.
pub(crate) async fn readable_revision(
    session: &dyn DatabaseSession,
    user: &User,
    roid: Roid,
) -> AppResult<Option<Revision>> {
    let Some(revision) = session.get_revision(roid).await? else {
        debug!(roid = %roid, "Skipping unknown revision");
        return Ok(None);
    };
    authorize(session, user, &revision).await?;
    Ok(Some(revision))
}

/// Like [`readable_revision`] but an unknown revision is an error.
pub(crate) async fn required_revision(
    session: &dyn DatabaseSession,
    user: &User,
    roid: Roid,
) -> AppResult<Revision> {
    readable_revision(session, user, roid)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Revision {roid} not found")))
}

/// Query objects and apply the context's object id mapping.
pub(crate) async fn query_mapped(
    session: &dyn DatabaseSession,
    ctx: &ActionContext,
    roid: Roid,
    condition: &Condition,
) -> AppResult<Vec<IfcObject>> {
    if condition.is_empty_selection() {
        return Ok(Vec::new());
    }
    let objects = session.query_objects(roid, condition).await?;
    Ok(apply_object_idm(ctx, objects))
}

/// Drop objects and fields excluded by the context's object id mapping.
pub(crate) fn apply_object_idm(ctx: &ActionContext, objects: Vec<IfcObject>) -> Vec<IfcObject> {
    let Some(idm) = ctx.object_idm.as_deref() else {
        return objects;
    };
    objects
        .into_iter()
        .filter(|o| idm.should_include_object(&o.type_name))
        .map(|mut o| {
            o.remove_fields(|type_name, field| idm.should_ignore_field(type_name, field));
            o
        })
        .collect()
}

/// Add `objects` to `model`, advancing `progress` across `from..to` and
/// stopping early on cancellation.
pub(crate) fn fill_model(
    model: &mut IfcModel,
    objects: Vec<IfcObject>,
    progress: &Progress,
    (from, to): (u8, u8),
    ctx: &ActionContext,
) -> AppResult<()> {
    const CHECK_EVERY: usize = 256;
    let total = objects.len();
    for (i, object) in objects.into_iter().enumerate() {
        if i % CHECK_EVERY == 0 {
            ctx.ensure_active()?;
            progress.span(from, to, i, total);
        }
        model.add(object);
    }
    progress.span(from, to, total, total);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimhub_core::types::id::{Oid, Uoid};
    use bimhub_entity::download::{CompareIdentifier, CompareType};
    use bimhub_entity::store::AccessMethod;
    use bimhub_plugin::builtin::FieldIgnoreObjectIdm;
    use std::sync::Arc;

    #[test]
    fn test_progress_is_monotonic() {
        let progress = Progress::default();
        progress.set(40);
        progress.set(10);
        assert_eq!(progress.get(), 40);
        progress.set(250);
        assert_eq!(progress.get(), 100);
    }

    #[test]
    fn test_progress_span() {
        let progress = Progress::default();
        progress.span(20, 60, 1, 4);
        assert_eq!(progress.get(), 30);
        progress.span(20, 60, 4, 4);
        assert_eq!(progress.get(), 60);
        assert_eq!(Progress::slot(1, 4), (25, 50));
        assert_eq!(Progress::slot(0, 1), (0, 100));
        let empty = Progress::default();
        empty.span(0, 50, 0, 0);
        assert_eq!(empty.get(), 50);
    }

    #[test]
    fn test_dispatch_matches_download_type() {
        let cases = [
            DownloadParameters::revision(Roid::new(1)),
            DownloadParameters::by_oids(vec![Roid::new(1)], [Oid::new(1)]),
            DownloadParameters::by_guids(vec![Roid::new(1)], ["g"]),
            DownloadParameters::of_type(vec![Roid::new(1)], ["IfcWall"], true),
            DownloadParameters::projects(vec![Roid::new(1)]),
            DownloadParameters::compare(
                Roid::new(1),
                Roid::new(2),
                CompareIdentifier::GuidId,
                CompareType::All,
            ),
        ];
        for params in cases {
            let action = DatabaseAction::for_parameters(&params).unwrap();
            assert_eq!(action.download_type(), params.download_type());
            assert_eq!(action.progress(), 0);
        }
    }

    #[test]
    fn test_object_idm_filters_objects_and_fields() {
        let ctx = ActionContext::new(Uoid::new(1), AccessMethod::Internal).with_object_idm(Some(
            Arc::new(FieldIgnoreObjectIdm::new(["IfcSpace", "*.Tag"])),
        ));
        let objects = vec![
            IfcObject::new(Oid::new(1), "IfcWall", Uoid::new(1))
                .with_attribute("Tag", serde_json::json!("W-1"))
                .with_attribute("Height", serde_json::json!(3.0)),
            IfcObject::new(Oid::new(2), "IfcSpace", Uoid::new(1)),
        ];
        let mapped = apply_object_idm(&ctx, objects);
        assert_eq!(mapped.len(), 1);
        assert!(!mapped[0].attributes.contains_key("Tag"));
        assert!(mapped[0].attributes.contains_key("Height"));
    }

    #[test]
    fn test_fill_model_stops_when_cancelled() {
        let ctx = ActionContext::new(Uoid::new(1), AccessMethod::Internal);
        ctx.cancel.cancel();
        let mut model = IfcModel::new();
        let objects = vec![IfcObject::new(Oid::new(1), "IfcWall", Uoid::new(1))];
        let err = fill_model(&mut model, objects, &Progress::default(), (0, 100), &ctx).unwrap_err();
        assert!(err.is_cancelled());
        assert!(model.is_empty());
    }
}
