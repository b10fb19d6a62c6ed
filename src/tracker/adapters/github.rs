//! GitHub Issues adapter.
//!
//! Talks to the REST API directly. Native hierarchy uses the sub-issues
//! endpoints; repositories without them report `Unsupported` and the linker
//! falls back to cross-reference notes.

use crate::graph::domain::NodeId;
use crate::tracker::{
    domain::{ItemBody, ItemDraft, ItemId, ItemState, ItemUpdate, RepositoryFullName, TrackerItem},
    ports::{NativeHierarchy, TrackerClient, TrackerError, TrackerResult},
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{ACCEPT, HeaderMap, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::debug;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const CLIENT_NAME: &str = concat!("plansync/", env!("CARGO_PKG_VERSION"));
const PAGE_SIZE: usize = 100;
/// GitHub serves at most this many results for one search query.
pub(crate) const SEARCH_RESULT_CAP: u64 = 1000;

/// GitHub REST tracker for a single repository.
#[derive(Debug, Clone)]
pub struct GitHubTracker {
    client: Client,
    base: Url,
    repository: RepositoryFullName,
    token: String,
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    id: u64,
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    labels: Vec<LabelResponse>,
    state: String,
}

#[derive(Debug, Deserialize)]
struct LabelResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    total_count: u64,
    #[serde(default)]
    incomplete_results: bool,
    items: Vec<IssueResponse>,
}

/// Next step after one page of search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SearchProgress {
    /// Fetch this page next.
    Fetch(u32),
    /// Every match has been read.
    Done,
}

/// Decides whether a search needs another page.
///
/// A search GitHub could not finish, or one matching more results than it
/// serves, is an error: treating the missing matches as absent would create
/// duplicate items.
pub(crate) fn after_search_page(
    page: u32,
    fetched: usize,
    received: usize,
    total_count: u64,
    incomplete: bool,
) -> TrackerResult<SearchProgress> {
    if incomplete {
        return Err(TrackerError::transient(
            "search timed out before covering every match",
        ));
    }
    if total_count > SEARCH_RESULT_CAP {
        return Err(TrackerError::Rejected(format!(
            "search matched {total_count} issues, more than the {SEARCH_RESULT_CAP} GitHub returns"
        )));
    }
    let fetched = u64::try_from(fetched).unwrap_or(u64::MAX);
    if received == 0 || fetched >= total_count {
        return Ok(SearchProgress::Done);
    }
    Ok(SearchProgress::Fetch(page.saturating_add(1)))
}

/// Search qualifiers for items whose metadata names `node_id`.
///
/// Search ignores punctuation, so the phrase matches the `"node_id":"<id>"`
/// field of the metadata block and not `parent_id` or link notes.
pub(crate) fn metadata_query(node_id: &NodeId) -> String {
    format!("in:body \"plansync:metadata\" \"node_id {node_id}\"")
}

#[derive(Debug, Serialize)]
struct CreateIssue<'a> {
    title: &'a str,
    body: &'a str,
    labels: &'a BTreeSet<String>,
}

#[derive(Debug, Serialize)]
struct EditIssue<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<&'a BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_reason: Option<&'a str>,
}

impl IssueResponse {
    fn into_item(self) -> TrackerResult<TrackerItem> {
        Ok(TrackerItem {
            id: item_id(self.number)?,
            title: self.title,
            body: self.body.unwrap_or_default(),
            labels: self.labels.into_iter().map(|label| label.name).collect(),
            state: ItemState::try_from(self.state.as_str()).map_err(TrackerError::transient)?,
        })
    }
}

fn item_id(number: u64) -> TrackerResult<ItemId> {
    ItemId::new(number).map_err(|err| TrackerError::Rejected(err.to_string()))
}

fn transport_error(err: &reqwest::Error) -> TrackerError {
    if err.is_connect() {
        TrackerError::Unreachable(err.to_string())
    } else {
        TrackerError::transient(err)
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
    if let Some(seconds) = header(RETRY_AFTER.as_str()).and_then(|value| value.parse::<u64>().ok())
    {
        return Some(Duration::from_secs(seconds));
    }
    let reset = header("x-ratelimit-reset").and_then(|value| value.parse::<i64>().ok())?;
    let wait = reset.saturating_sub(Utc::now().timestamp()).max(0);
    u64::try_from(wait).ok().map(Duration::from_secs)
}

async fn status_error(response: Response) -> TrackerError {
    let status = response.status();
    let headers = response.headers().clone();
    let message = response.text().await.unwrap_or_default();
    classify_status(status, &headers, message)
}

/// Maps an unsuccessful response onto the tracker error taxonomy.
pub(crate) fn classify_status(status: StatusCode, headers: &HeaderMap, message: String) -> TrackerError {
    let exhausted = headers
        .get("x-ratelimit-remaining")
        .and_then(|value| value.to_str().ok())
        == Some("0");
    let hint = retry_after(headers);
    match status {
        StatusCode::UNAUTHORIZED => TrackerError::Unauthorized(message),
        StatusCode::TOO_MANY_REQUESTS => TrackerError::RateLimited { retry_after: hint },
        StatusCode::FORBIDDEN if exhausted || hint.is_some() => {
            TrackerError::RateLimited { retry_after: hint }
        }
        _ if status.is_server_error() => TrackerError::Transient(format!("{status}: {message}")),
        _ => TrackerError::Rejected(format!("{status}: {message}")),
    }
}

impl GitHubTracker {
    /// Creates an adapter for `repository` at `api_base`
    /// (normally `https://api.github.com`).
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Rejected`] when the base URL is invalid or the
    /// HTTP client cannot be built.
    pub fn new(
        api_base: &str,
        repository: RepositoryFullName,
        token: impl Into<String>,
        call_timeout: Duration,
    ) -> TrackerResult<Self> {
        let base = Url::parse(api_base).map_err(|err| TrackerError::Rejected(err.to_string()))?;
        let client = Client::builder()
            .timeout(call_timeout)
            .build()
            .map_err(|err| TrackerError::Rejected(err.to_string()))?;
        Ok(Self {
            client,
            base,
            repository,
            token: token.into(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> TrackerResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| TrackerError::Rejected(format!("invalid API base {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn issue_endpoint(&self, id: ItemId, tail: &[&str]) -> TrackerResult<Url> {
        let number = id.value().to_string();
        let mut segments = vec![
            "repos",
            self.repository.owner(),
            self.repository.name(),
            "issues",
            number.as_str(),
        ];
        segments.extend_from_slice(tail);
        self.endpoint(&segments)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(USER_AGENT, CLIENT_NAME)
    }

    async fn send(&self, request: RequestBuilder) -> TrackerResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|err| transport_error(&err))?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(status_error(response).await)
    }

    /// Sends a request, mapping `404 Not Found` to `None`.
    async fn send_optional(&self, request: RequestBuilder) -> TrackerResult<Option<Response>> {
        let response = request
            .send()
            .await
            .map_err(|err| transport_error(&err))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if response.status().is_success() {
            return Ok(Some(response));
        }
        Err(status_error(response).await)
    }

    async fn fetch_issue(&self, id: ItemId) -> TrackerResult<Option<IssueResponse>> {
        let url = self.issue_endpoint(id, &[])?;
        let Some(response) = self.send_optional(self.request(Method::GET, url)).await? else {
            return Ok(None);
        };
        response.json().await.map(Some).map_err(|err| transport_error(&err))
    }

    /// Runs a search and reads every page of results.
    async fn search(&self, qualifiers: &str) -> TrackerResult<Vec<IssueResponse>> {
        let url = self.endpoint(&["search", "issues"])?;
        let query = format!("repo:{} is:issue {qualifiers}", self.repository);
        let per_page = PAGE_SIZE.to_string();
        let mut issues = Vec::new();
        let mut page: u32 = 1;
        loop {
            debug!(%query, page, "searching tracker");
            let page_number = page.to_string();
            let response = self
                .send(self.request(Method::GET, url.clone()).query(&[
                    ("q", query.as_str()),
                    ("per_page", per_page.as_str()),
                    ("page", page_number.as_str()),
                ]))
                .await?;
            let results: SearchResponse =
                response.json().await.map_err(|err| transport_error(&err))?;
            let received = results.items.len();
            issues.extend(results.items);
            match after_search_page(
                page,
                issues.len(),
                received,
                results.total_count,
                results.incomplete_results,
            )? {
                SearchProgress::Fetch(next) => page = next,
                SearchProgress::Done => return Ok(issues),
            }
        }
    }

    async fn edit(&self, id: ItemId, edit: &EditIssue<'_>) -> TrackerResult<()> {
        let url = self.issue_endpoint(id, &[])?;
        self.send_optional(self.request(Method::PATCH, url).json(edit))
            .await?
            .map(|_| ())
            .ok_or(TrackerError::NotFound(id))
    }
}

#[async_trait]
impl TrackerClient for GitHubTracker {
    async fn create_item(&self, draft: &ItemDraft) -> TrackerResult<ItemId> {
        let url = self.endpoint(&[
            "repos",
            self.repository.owner(),
            self.repository.name(),
            "issues",
        ])?;
        let payload = CreateIssue {
            title: draft.title(),
            body: draft.body(),
            labels: draft.labels(),
        };
        let response = self
            .send(self.request(Method::POST, url).json(&payload))
            .await?;
        let issue: IssueResponse = response.json().await.map_err(|err| transport_error(&err))?;
        item_id(issue.number)
    }

    async fn update_item(&self, id: ItemId, update: &ItemUpdate) -> TrackerResult<()> {
        if update.is_empty() {
            return Ok(());
        }
        let edit = EditIssue {
            title: update.title.as_deref(),
            body: update.body.as_deref(),
            labels: update.labels.as_ref(),
            state: None,
            state_reason: None,
        };
        self.edit(id, &edit).await
    }

    async fn add_label(&self, id: ItemId, label: &str) -> TrackerResult<()> {
        let url = self.issue_endpoint(id, &["labels"])?;
        let payload = serde_json::json!({ "labels": [label] });
        self.send_optional(self.request(Method::POST, url).json(&payload))
            .await?
            .map(|_| ())
            .ok_or(TrackerError::NotFound(id))
    }

    async fn remove_label(&self, id: ItemId, label: &str) -> TrackerResult<()> {
        let url = self.issue_endpoint(id, &["labels", label])?;
        // GitHub answers 404 when the label is not applied.
        self.send_optional(self.request(Method::DELETE, url))
            .await
            .map(|_| ())
    }

    async fn get_item(&self, id: ItemId) -> TrackerResult<Option<TrackerItem>> {
        self.fetch_issue(id)
            .await?
            .map(IssueResponse::into_item)
            .transpose()
    }

    async fn get_item_state(&self, id: ItemId) -> TrackerResult<Option<ItemState>> {
        Ok(self.get_item(id).await?.map(|item| item.state))
    }

    async fn find_items_by_metadata_id(&self, node_id: &NodeId) -> TrackerResult<Vec<ItemId>> {
        let issues = self.search(&metadata_query(node_id)).await?;
        let mut ids = Vec::new();
        for issue in issues {
            let matches = ItemBody::parse(issue.body.as_deref().unwrap_or_default())
                .ok()
                .and_then(|body| body.metadata().map(|meta| meta.node_id == *node_id))
                .unwrap_or(false);
            if matches {
                ids.push(item_id(issue.number)?);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    async fn find_items_by_title(&self, title: &str) -> TrackerResult<Vec<ItemId>> {
        let escaped = title.replace('"', "");
        let issues = self.search(&format!("in:title \"{escaped}\"")).await?;
        let mut ids = issues
            .into_iter()
            .filter(|issue| issue.title == title)
            .map(|issue| item_id(issue.number))
            .collect::<TrackerResult<Vec<_>>>()?;
        ids.sort_unstable();
        Ok(ids)
    }

    async fn comment(&self, id: ItemId, text: &str) -> TrackerResult<()> {
        let url = self.issue_endpoint(id, &["comments"])?;
        let payload = serde_json::json!({ "body": text });
        self.send(self.request(Method::POST, url).json(&payload))
            .await
            .map(|_| ())
    }

    async fn close_item(&self, id: ItemId) -> TrackerResult<()> {
        let edit = EditIssue {
            title: None,
            body: None,
            labels: None,
            state: Some("closed"),
            state_reason: Some("not_planned"),
        };
        self.edit(id, &edit).await
    }
}

#[async_trait]
impl NativeHierarchy for GitHubTracker {
    async fn add_child(&self, parent: ItemId, child: ItemId) -> TrackerResult<()> {
        let child_issue = self
            .fetch_issue(child)
            .await?
            .ok_or(TrackerError::NotFound(child))?;
        let url = self.issue_endpoint(parent, &["sub_issues"])?;
        let payload = serde_json::json!({ "sub_issue_id": child_issue.id });
        self.send_optional(self.request(Method::POST, url).json(&payload))
            .await?
            .map(|_| ())
            .ok_or_else(|| TrackerError::Unsupported("sub-issues".to_owned()))
    }

    async fn children(&self, parent: ItemId) -> TrackerResult<Vec<ItemId>> {
        let url = self.issue_endpoint(parent, &["sub_issues"])?;
        let per_page = PAGE_SIZE.to_string();
        let mut children = Vec::new();
        let mut page: u32 = 1;
        loop {
            let page_number = page.to_string();
            let Some(response) = self
                .send_optional(self.request(Method::GET, url.clone()).query(&[
                    ("per_page", per_page.as_str()),
                    ("page", page_number.as_str()),
                ]))
                .await?
            else {
                return Err(TrackerError::Unsupported("sub-issues".to_owned()));
            };
            let issues: Vec<IssueResponse> =
                response.json().await.map_err(|err| transport_error(&err))?;
            let received = issues.len();
            for issue in issues {
                children.push(item_id(issue.number)?);
            }
            if received < PAGE_SIZE {
                return Ok(children);
            }
            page = page.saturating_add(1);
        }
    }
}
