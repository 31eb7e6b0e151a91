//! Project and revision records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bimhub_core::types::id::{Poid, Roid, Uoid};

use super::user::User;

/// A project: a named series of revisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project identifier.
    pub poid: Poid,
    /// Project name.
    pub name: String,
    /// Most recent revision, if any has been checked in.
    pub last_revision: Option<Roid>,
    /// Users with read access besides administrators.
    pub authorized_users: Vec<Uoid>,
}

impl Project {
    /// Check whether the given user may read this project.
    pub fn has_read_access(&self, user: &User) -> bool {
        user.is_admin() || self.authorized_users.contains(&user.uoid)
    }
}

/// An immutable, numbered snapshot of a project's model data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Revision identifier.
    pub roid: Roid,
    /// Owning project.
    pub poid: Poid,
    /// Sequence number within the project.
    pub number: i32,
    /// Check-in comment.
    pub comment: String,
    /// Check-in time.
    pub created_at: DateTime<Utc>,
}
