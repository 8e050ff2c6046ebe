//! User directory types.

use serde::{Deserialize, Serialize};

/// Backend-assigned user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wraps a backend identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A read-only copy of a backend user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Backend identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Avatar URL or reference, may be empty.
    #[serde(default)]
    pub avatar: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,
}

/// A task's reference to an assigned user.
///
/// The task list endpoint populates name, email and avatar; other call
/// sites may return only the identifier, in which case the display fields
/// are empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssigneeRef {
    /// Identifier of the assigned user.
    pub id: UserId,
    /// Display name, empty if not populated.
    #[serde(default)]
    pub name: String,
    /// Email, empty if not populated.
    #[serde(default)]
    pub email: String,
    /// Avatar, empty if not populated.
    #[serde(default)]
    pub avatar: String,
}

impl AssigneeRef {
    /// An assignee reference with only the identifier known.
    #[must_use]
    pub const fn bare(id: UserId) -> Self {
        Self {
            id,
            name: String::new(),
            email: String::new(),
            avatar: String::new(),
        }
    }

    /// Label for display: the name if populated, otherwise the identifier.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            self.id.as_str()
        } else {
            &self.name
        }
    }
}

impl From<&User> for AssigneeRef {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

/// Response body of the login and register endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthGrant {
    /// Bearer token for subsequent requests.
    pub token: String,
    /// The authenticated user.
    pub user: User,
}
