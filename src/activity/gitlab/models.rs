use chrono::{DateTime, Utc};
use serde::Deserialize;

/// The authenticated user as returned by `GET /user`.
#[derive(Debug, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A user event as returned by `GET /events`. Only the fields we use are deserialized.
#[derive(Debug, Deserialize)]
pub struct Event {
    pub id: u64,
    pub action_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub project_id: Option<u64>,
}
