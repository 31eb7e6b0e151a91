//! User records.

use serde::{Deserialize, Serialize};

use bimhub_core::types::id::Uoid;

/// Role of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    /// Administrator with read access to every project.
    Admin,
    /// Regular user, restricted to projects they are authorized on.
    User,
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier.
    pub uoid: Uoid,
    /// Login name.
    pub username: String,
    /// Role.
    pub user_type: UserType,
}

impl User {
    /// Check whether the user has administrator rights.
    pub fn is_admin(&self) -> bool {
        self.user_type == UserType::Admin
    }
}
