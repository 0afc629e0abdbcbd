pub mod gitlab;

use super::Result;
use crate::AppConfig;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use gitlab::GitLabClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Kind of a user activity record.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// Code was pushed to the host.
    Push,
    /// Anything else: comments, merges, issue updates and so on.
    Other,
}

/// A single observed activity record.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ContributionEvent {
    /// When the event happened.
    pub created_at: DateTime<Utc>,
    /// What happened.
    pub kind: EventKind,
}

impl ContributionEvent {
    /// Creates a push event at the given time.
    pub fn push(created_at: DateTime<Utc>) -> ContributionEvent {
        ContributionEvent {
            created_at,
            kind: EventKind::Push,
        }
    }

    /// The UTC calendar date of the event.
    pub fn date(&self) -> NaiveDate {
        self.created_at.date_naive()
    }

    pub fn is_push(&self) -> bool {
        self.kind == EventKind::Push
    }
}

/// Trait that needs to be implemented by a source of user activity.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Checks that the source is reachable and accepts our credentials.
    async fn probe(&self) -> Result<()>;

    /// Fetches all push events on or after `since`, ordered by time.
    async fn fetch_push_events(&self, since: NaiveDate) -> Result<Vec<ContributionEvent>>;
}

/// An `ActivitySource` that returns events from a static list.
pub struct StaticActivitySource {
    events: Vec<ContributionEvent>,
}

impl StaticActivitySource {
    /// Creates a new `StaticActivitySource` from an iterator.
    pub fn new<I>(iter: I) -> StaticActivitySource
    where
        I: IntoIterator,
        I::Item: Into<ContributionEvent>,
    {
        StaticActivitySource {
            events: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ActivitySource for StaticActivitySource {
    async fn probe(&self) -> Result<()> {
        Ok(())
    }

    async fn fetch_push_events(&self, since: NaiveDate) -> Result<Vec<ContributionEvent>> {
        Ok(push_events_since(self.events.clone(), since))
    }
}

/// Keeps push events dated on or after `since` and sorts them by time.
pub(crate) fn push_events_since(
    events: Vec<ContributionEvent>,
    since: NaiveDate,
) -> Vec<ContributionEvent> {
    let mut events: Vec<_> = events
        .into_iter()
        .filter(|event| event.is_push() && event.date() >= since)
        .collect();

    events.sort_by_key(|event| event.created_at);
    events
}

/// Push events of the authenticated GitLab user.
#[derive(Debug)]
pub struct GitLabActivitySource {
    client: GitLabClient,
}

impl GitLabActivitySource {
    pub fn new(client: GitLabClient) -> GitLabActivitySource {
        GitLabActivitySource { client }
    }

    /// Creates a new `GitLabActivitySource` from configuration.
    pub fn from_config(config: &AppConfig) -> Result<GitLabActivitySource> {
        Ok(GitLabActivitySource::new(GitLabClient::new(
            config.host_url.clone(),
            &config.access_token,
            config.timeout,
            config.per_page,
        )?))
    }
}

#[async_trait]
impl ActivitySource for GitLabActivitySource {
    async fn probe(&self) -> Result<()> {
        let user = self.client.current_user().await?;
        log::info!("authenticated as {}", user.username);
        Ok(())
    }

    async fn fetch_push_events(&self, since: NaiveDate) -> Result<Vec<ContributionEvent>> {
        let events = self.client.get_all_push_events(since).await?;
        let events = events.into_iter().map(Into::into).collect();

        Ok(push_events_since(events, since))
    }
}

impl From<gitlab::models::Event> for ContributionEvent {
    fn from(ev: gitlab::models::Event) -> Self {
        let kind = if ev.action_name.starts_with("pushed") {
            EventKind::Push
        } else {
            EventKind::Other
        };

        Self {
            created_at: ev.created_at,
            kind,
        }
    }
}

#[async_trait]
impl<T> ActivitySource for Box<T>
where
    T: ActivitySource + ?Sized,
{
    async fn probe(&self) -> Result<()> {
        (**self).probe().await
    }

    async fn fetch_push_events(&self, since: NaiveDate) -> Result<Vec<ContributionEvent>> {
        (**self).fetch_push_events(since).await
    }
}

#[async_trait]
impl<T> ActivitySource for Arc<T>
where
    T: ActivitySource + ?Sized,
{
    async fn probe(&self) -> Result<()> {
        (**self).probe().await
    }

    async fn fetch_push_events(&self, since: NaiveDate) -> Result<Vec<ContributionEvent>> {
        (**self).fetch_push_events(since).await
    }
}
