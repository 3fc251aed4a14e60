use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::GitHubError;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const API_TIMEOUT_SECS: u64 = 60;
const PER_PAGE: usize = 100;
const USER_AGENT: &str = "patchloop";

/// Maximum length for error body content in error messages
const MAX_ERROR_BODY_LEN: usize = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub html_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    pub user: User,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewComment {
    pub path: String,
    #[serde(default)]
    pub position: Option<u64>,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub branch: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
    pub head: GitRef,
    pub base: GitRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullFile {
    pub filename: String,
    pub status: String,
    /// Absent for binary or very large files
    #[serde(default)]
    pub patch: Option<String>,
}

#[derive(Serialize)]
struct CreatePrRequest<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

#[derive(Serialize)]
struct CreateCommentRequest<'a> {
    body: &'a str,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Thin client for the GitHub REST API (v3)
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_base", &self.api_base)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Result<Self, GitHubError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
            token,
        })
    }

    /// Point at another API root (GitHub Enterprise, tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub async fn get_issue(&self, owner: &str, repo: &str, number: u64) -> Result<Issue, GitHubError> {
        let n = number.to_string();
        self.get_json(&["repos", owner, repo, "issues", &n], &[]).await
    }

    pub async fn list_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<IssueComment>, GitHubError> {
        let n = number.to_string();
        self.get_paginated(&["repos", owner, repo, "issues", &n, "comments"], &[])
            .await
    }

    /// Works for pull requests too; they share the issue comment thread
    pub async fn create_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<(), GitHubError> {
        let n = number.to_string();
        let _: serde_json::Value = self
            .send_json(
                Method::POST,
                &["repos", owner, repo, "issues", &n, "comments"],
                &CreateCommentRequest { body },
            )
            .await?;
        Ok(())
    }

    pub async fn remove_label(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        name: &str,
    ) -> Result<(), GitHubError> {
        let n = number.to_string();
        let request = self.request(Method::DELETE, &["repos", owner, repo, "issues", &n, "labels", name], &[])?;
        check_status(request.send().await?).await?;
        Ok(())
    }

    pub async fn get_pull(&self, owner: &str, repo: &str, number: u64) -> Result<PullRequest, GitHubError> {
        let n = number.to_string();
        self.get_json(&["repos", owner, repo, "pulls", &n], &[]).await
    }

    pub async fn list_pull_files(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<PullFile>, GitHubError> {
        let n = number.to_string();
        self.get_paginated(&["repos", owner, repo, "pulls", &n, "files"], &[])
            .await
    }

    /// Inline comments on the diff
    pub async fn list_review_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<ReviewComment>, GitHubError> {
        let n = number.to_string();
        self.get_paginated(&["repos", owner, repo, "pulls", &n, "comments"], &[])
            .await
    }

    /// Open pull requests from `head` (`owner:branch`) into `base`
    pub async fn list_open_pulls(
        &self,
        owner: &str,
        repo: &str,
        head: &str,
        base: &str,
    ) -> Result<Vec<PullRequest>, GitHubError> {
        self.get_paginated(
            &["repos", owner, repo, "pulls"],
            &[("state", "open"), ("head", head), ("base", base)],
        )
        .await
    }

    pub async fn create_pull(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequest, GitHubError> {
        self.send_json(
            Method::POST,
            &["repos", owner, repo, "pulls"],
            &CreatePrRequest {
                title,
                body,
                head,
                base,
            },
        )
        .await
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<RequestBuilder, GitHubError> {
        let mut url = url::Url::parse(&self.api_base)
            .map_err(|_| GitHubError::InvalidUrl(self.api_base.clone()))?;
        url.path_segments_mut()
            .map_err(|_| GitHubError::InvalidUrl(self.api_base.clone()))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        debug!(%method, path = url.path(), "GitHub API request");
        let mut builder = self
            .http
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, GitHubError> {
        let response = self.request(Method::GET, segments, query)?.send().await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<T, GitHubError> {
        let response = self.request(method, segments, &[])?.json(body).send().await?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Follow `page=N` until a short page comes back
    async fn get_paginated<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, GitHubError> {
        let per_page = PER_PAGE.to_string();
        let mut items = Vec::new();
        let mut page = 1usize;
        loop {
            let page_str = page.to_string();
            let mut params = query.to_vec();
            params.push(("per_page", per_page.as_str()));
            params.push(("page", page_str.as_str()));

            let batch: Vec<T> = self.get_json(segments, &params).await?;
            let done = batch.len() < PER_PAGE;
            items.extend(batch);
            if done {
                return Ok(items);
            }
            page += 1;
        }
    }
}

async fn check_status(response: Response) -> Result<Response, GitHubError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GitHubError::PermissionDenied {
            status: status.as_u16(),
            message,
        },
        StatusCode::NOT_FOUND => GitHubError::NotFound(message),
        _ => GitHubError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

fn error_message(body: &str) -> String {
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(body) {
        let detail = api_error
            .errors
            .first()
            .and_then(|e| e.message.clone())
            .unwrap_or_default();
        return if detail.is_empty() {
            api_error.message
        } else {
            format!("{}: {}", api_error.message, detail)
        };
    }
    sanitize_error_body(body)
}

/// Truncate a raw error body and redact it when it may carry credentials
fn sanitize_error_body(body: &str) -> String {
    const SECRET_PATTERNS: &[&str] = &[
        "token",
        "secret",
        "password",
        "credential",
        "bearer",
        "ghp_",
        "gho_",
        "ghs_",
        "github_pat_",
    ];

    let truncated = if body.len() > MAX_ERROR_BODY_LEN {
        let mut end = MAX_ERROR_BODY_LEN;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    };

    let lower = truncated.to_lowercase();
    if SECRET_PATTERNS.iter().any(|p| lower.contains(p)) {
        return "(error details redacted - may contain sensitive data)".to_string();
    }
    truncated
}
