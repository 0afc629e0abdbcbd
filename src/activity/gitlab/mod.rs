pub mod models;

use chrono::{Duration as ChronoDuration, NaiveDate};
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Request, Response, StatusCode, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next};
use std::time::Duration;
use task_local_extensions::Extensions;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Error while making a http request.
    #[error("failure requesting remote resource: {0}")]
    Request(#[from] reqwest::Error),

    /// Error while executing some middleware code.
    #[error("request middleware failed with: {0}")]
    RequestMiddleware(#[from] reqwest_middleware::Error),

    /// Error while building http headers.
    #[error("encountered invalid HTTP header value: {0}")]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),

    /// Error while parsing a JSON response.
    #[error("failed to parse response as JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The host rejected the access token.
    #[error("authentication failed with status {0}")]
    Unauthorized(StatusCode),

    /// The host answered with an unexpected status.
    #[error("unexpected response status {0}")]
    Status(StatusCode),

    /// A response header did not have the expected format.
    #[error("invalid `{name}` header: {value:?}")]
    InvalidHeader { name: &'static str, value: String },

    /// An API endpoint could not be derived from the host URL.
    #[error("invalid API URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Returns `true` for failures that mean the host is unreachable or does not accept our
    /// credentials.
    pub fn is_unavailable(&self) -> bool {
        match self {
            ClientError::Unauthorized(_) => true,
            ClientError::Request(err) => is_connection_error(err),
            ClientError::RequestMiddleware(reqwest_middleware::Error::Reqwest(err)) => {
                is_connection_error(err)
            }
            _ => false,
        }
    }
}

fn is_connection_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

impl From<ClientError> for reqwest_middleware::Error {
    fn from(err: ClientError) -> Self {
        reqwest_middleware::Error::Middleware(anyhow::Error::new(err))
    }
}

/// Adds the personal access token to every request.
struct AuthMiddleware {
    token: String,
}

impl AuthMiddleware {
    fn new(token: &str) -> AuthMiddleware {
        AuthMiddleware {
            token: token.to_owned(),
        }
    }
}

#[async_trait::async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let mut header = HeaderValue::from_str(&self.token).map_err(ClientError::from)?;
        header.set_sensitive(true);
        req.headers_mut()
            .insert(HeaderName::from_static("private-token"), header);
        next.run(req, extensions).await
    }
}

/// GitLab REST client for the endpoints needed to build the contribution graph.
#[derive(Debug)]
pub struct GitLabClient {
    client: ClientWithMiddleware,
    user_url: Url,
    events_url: Url,
    per_page: u32,
}

impl GitLabClient {
    /// Creates a new GitLab client for the instance at `host_url`, authenticating with a personal
    /// access token. `timeout` applies to each request separately; `per_page` is the page size
    /// used when listing events.
    pub fn new(
        host_url: Url,
        access_token: &str,
        timeout: Duration,
        per_page: u32,
    ) -> Result<GitLabClient, ClientError> {
        let api_url = api_base_url(host_url)?;
        let join = |path: &str| {
            api_url
                .join(path)
                .map_err(|err| ClientError::InvalidUrl(err.to_string()))
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("contribgraph/{}", env!("CARGO_PKG_VERSION")))?,
        );

        let client = ClientBuilder::new(
            reqwest::Client::builder()
                .default_headers(headers)
                .timeout(timeout)
                .build()?,
        )
        .with(AuthMiddleware::new(access_token))
        .build();

        Ok(GitLabClient {
            client,
            user_url: join("user")?,
            events_url: join("events")?,
            per_page,
        })
    }

    /// Fetches the user the access token belongs to. This doubles as a connectivity and
    /// credential check.
    pub async fn current_user(&self) -> Result<models::User, ClientError> {
        let response = self.client.get(self.user_url.clone()).send().await?;
        let body = check_status(response)?.text().await?;

        Ok(serde_json::from_str(&body)?)
    }

    /// Fetches a single page of push events created on or after `since`. Returns the events and
    /// the number of the next page, if there is one.
    pub async fn get_push_events(
        &self,
        since: NaiveDate,
        page: u32,
    ) -> Result<(Vec<models::Event>, Option<u32>), ClientError> {
        let query = build_query_parameters(since, self.per_page, page);

        let response = self
            .client
            .get(self.events_url.clone())
            .query(&query)
            .send()
            .await?;
        let response = check_status(response)?;
        let headers = response.headers().clone();
        let body = response.text().await?;

        let events: Vec<models::Event> = serde_json::from_str(&body)?;
        let next_page = next_page(&headers, page, self.per_page, events.len())?;

        log::debug!("fetched {} events from page {}", events.len(), page);

        Ok((events, next_page))
    }

    /// Fetches push events created on or after `since`, following pagination until the last page.
    pub async fn get_all_push_events(
        &self,
        since: NaiveDate,
    ) -> Result<Vec<models::Event>, ClientError> {
        let mut events = Vec::new();
        let mut page = 1;

        loop {
            let (mut batch, next_page) = self.get_push_events(since, page).await?;
            events.append(&mut batch);

            match next_page {
                Some(next) => page = next,
                None => break,
            }
        }

        log::debug!("fetched {} events in {} pages", events.len(), page);

        Ok(events)
    }
}

/// Returns `{host_url}/api/v4/` and keeps any path prefix the instance is served under.
fn api_base_url(mut host_url: Url) -> Result<Url, ClientError> {
    if !host_url.path().ends_with('/') {
        let path = format!("{}/", host_url.path());
        host_url.set_path(&path);
    }

    host_url
        .join("api/v4/")
        .map_err(|err| ClientError::InvalidUrl(err.to_string()))
}

fn check_status(response: Response) -> Result<Response, ClientError> {
    match response.status() {
        status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
            Err(ClientError::Unauthorized(status))
        }
        status if !status.is_success() => Err(ClientError::Status(status)),
        _ => Ok(response),
    }
}

fn build_query_parameters(
    since: NaiveDate,
    per_page: u32,
    page: u32,
) -> IndexMap<&'static str, String> {
    // `after` is exclusive, so ask for everything after the previous day.
    // see: https://docs.gitlab.com/ee/api/events.html
    let after = since - ChronoDuration::days(1);

    IndexMap::from([
        // only push events
        ("action", "pushed".to_owned()),
        ("after", after.to_string()),
        // oldest first
        ("sort", "asc".to_owned()),
        ("per_page", per_page.to_string()),
        ("page", page.to_string()),
    ])
}

/// Determines the page following `page`. GitLab reports it in `X-Next-Page`, which is empty on
/// the last page. Without the header a full page means there may be more.
fn next_page(
    headers: &HeaderMap,
    page: u32,
    per_page: u32,
    received: usize,
) -> Result<Option<u32>, ClientError> {
    let Some(value) = headers.get("x-next-page") else {
        return Ok((received >= per_page as usize)
            .then(|| page.checked_add(1))
            .flatten());
    };

    let invalid = || ClientError::InvalidHeader {
        name: "x-next-page",
        value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
    };

    let value = value.to_str().map_err(|_| invalid())?.trim();
    if value.is_empty() {
        return Ok(None);
    }

    let next = value.parse::<u32>().map_err(|_| invalid())?;

    // A next page that does not advance would loop forever.
    Ok((next > page).then_some(next))
}
