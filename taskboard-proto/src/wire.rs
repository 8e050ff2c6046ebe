//! Decoding of backend JSON into normalized model types.
//!
//! The backend names its identifier `_id` on some call sites and `id` on
//! others. This module is the only place that looks at both: it resolves
//! one canonical identifier (`_id` first) and everything downstream sees a
//! single `id` field.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::task::{Priority, Task, TaskId, TaskStatus};
use crate::user::{AssigneeRef, AuthGrant, User, UserId};

/// Errors produced while decoding backend responses.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WireError {
    /// The body is not valid JSON or does not have the expected shape.
    #[error("malformed response body: {0}")]
    Json(String),
    /// An entity carried neither identifier field.
    #[error("{entity} has neither `_id` nor `id`")]
    MissingId {
        /// Which kind of entity was being decoded.
        entity: &'static str,
    },
    /// A due date could not be parsed as a calendar date or timestamp.
    #[error("invalid due date `{0}`")]
    InvalidDate(String),
}

impl From<serde_json::Error> for WireError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

/// Picks the canonical identifier from the two fields the backend may use.
///
/// `primary` is the backend's own `_id` field and wins whenever it is
/// present and non-empty; `secondary` (`id`) is the fallback.
#[must_use]
pub fn resolve_id(primary: Option<&str>, secondary: Option<&str>) -> Option<String> {
    primary
        .filter(|s| !s.trim().is_empty())
        .or_else(|| secondary.filter(|s| !s.trim().is_empty()))
        .map(str::to_string)
}

/// Parses a due date given as `YYYY-MM-DD` or as an RFC 3339 timestamp.
///
/// Timestamps are reduced to their UTC calendar date. An empty string
/// means "no due date".
///
/// # Errors
///
/// Returns [`WireError::InvalidDate`] if the string is neither form.
pub fn parse_due_date(raw: &str) -> Result<Option<NaiveDate>, WireError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(Some(date));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| Some(dt.with_timezone(&Utc).date_naive()))
        .map_err(|_| WireError::InvalidDate(raw.to_string()))
}

#[derive(Debug, Deserialize)]
struct RawUser {
    #[serde(rename = "_id", default)]
    primary_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    skills: Vec<String>,
}

impl RawUser {
    fn into_user(self) -> Result<User, WireError> {
        let id = resolve_id(self.primary_id.as_deref(), self.id.as_deref())
            .ok_or(WireError::MissingId { entity: "user" })?;
        Ok(User {
            id: UserId::new(id),
            name: self.name.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            avatar: self.avatar.unwrap_or_default(),
            role: self.role,
            phone: self.phone,
            location: self.location,
            skills: self.skills,
        })
    }
}

/// Assignees arrive populated (objects) from the list endpoint and as bare
/// identifier strings from some mutation responses.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAssignee {
    Id(String),
    Populated(RawUser),
}

impl RawAssignee {
    fn into_assignee(self) -> Result<AssigneeRef, WireError> {
        match self {
            Self::Id(id) if !id.trim().is_empty() => Ok(AssigneeRef::bare(UserId::new(id))),
            Self::Id(_) => Err(WireError::MissingId { entity: "assignee" }),
            Self::Populated(raw) => raw.into_user().map(|u| AssigneeRef::from(&u)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTask {
    #[serde(rename = "_id", default)]
    primary_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<TaskStatus>,
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    assignees: Vec<RawAssignee>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl RawTask {
    fn into_task(self) -> Result<Task, WireError> {
        let id = resolve_id(self.primary_id.as_deref(), self.id.as_deref())
            .ok_or(WireError::MissingId { entity: "task" })?;
        let due_date = match self.due_date.as_deref() {
            Some(raw) => parse_due_date(raw)?,
            None => None,
        };
        let assignees = self
            .assignees
            .into_iter()
            .map(RawAssignee::into_assignee)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Task {
            id: TaskId::new(id),
            title: self.title,
            description: self.description.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            priority: self.priority.unwrap_or_default(),
            due_date,
            assignees,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawGrant {
    token: String,
    user: RawUser,
}

/// Decodes a single task object.
///
/// # Errors
///
/// Returns [`WireError`] if the body is malformed, carries no identifier,
/// or has an unparseable due date.
pub fn task_from_json(bytes: &[u8]) -> Result<Task, WireError> {
    serde_json::from_slice::<RawTask>(bytes)?.into_task()
}

/// Decodes an array of task objects.
///
/// # Errors
///
/// Fails on the first task that cannot be decoded.
pub fn tasks_from_json(bytes: &[u8]) -> Result<Vec<Task>, WireError> {
    serde_json::from_slice::<Vec<RawTask>>(bytes)?
        .into_iter()
        .map(RawTask::into_task)
        .collect()
}

/// Decodes an array of user objects.
///
/// # Errors
///
/// Fails on the first user that cannot be decoded.
pub fn users_from_json(bytes: &[u8]) -> Result<Vec<User>, WireError> {
    serde_json::from_slice::<Vec<RawUser>>(bytes)?
        .into_iter()
        .map(RawUser::into_user)
        .collect()
}

/// Decodes a `{token, user}` response from the auth endpoints.
///
/// # Errors
///
/// Returns [`WireError`] if the body is malformed or the user has no
/// identifier.
pub fn auth_grant_from_json(bytes: &[u8]) -> Result<AuthGrant, WireError> {
    let raw: RawGrant = serde_json::from_slice(bytes)?;
    Ok(AuthGrant {
        token: raw.token,
        user: raw.user.into_user()?,
    })
}

/// Extracts the `message` field from an error or acknowledgement body.
///
/// Returns `None` if the body is not a JSON object with a string `message`.
#[must_use]
pub fn message_from_json(bytes: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct Body {
        message: String,
    }
    serde_json::from_slice::<Body>(bytes).ok().map(|b| b.message)
}
