//! GitHub webhook signature checks and event routing.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

use crate::runner::FlowRequest;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const EVENT_HEADER: &str = "x-github-event";

const SIGNATURE_PREFIX: &str = "sha256=";
const FIX_COMMAND: &str = "/fix";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing signature header")]
    Missing,

    #[error("Invalid signature")]
    Invalid,
}

/// Check `X-Hub-Signature-256` against the HMAC-SHA256 of the raw body
pub fn verify_signature(secret: &[u8], body: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?;
    let hex_digest = header
        .trim()
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or(SignatureError::Invalid)?;
    let expected = hex::decode(hex_digest).map_err(|_| SignatureError::Invalid)?;

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::Invalid)?;
    mac.update(body);
    // Constant-time comparison
    mac.verify_slice(&expected).map_err(|_| SignatureError::Invalid)
}

/// Work to start for a delivery, on which repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub repository: String,
    pub clone_url: String,
    pub request: FlowRequest,
}

/// How a delivery was classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routed {
    pub status: &'static str,
    pub dispatch: Option<Dispatch>,
}

impl Routed {
    fn ignored() -> Self {
        Self {
            status: "ignored",
            dispatch: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Payload {
    action: Option<String>,
    repository: Option<Repository>,
    issue: Option<IssuePayload>,
    label: Option<Label>,
    comment: Option<CommentPayload>,
    pull_request: Option<PullPayload>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    full_name: String,
    clone_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IssuePayload {
    html_url: String,
    /// Present only when the issue is a pull request
    pull_request: Option<PullLink>,
}

#[derive(Debug, Deserialize)]
struct PullLink {
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Label {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CommentPayload {
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PullPayload {
    html_url: String,
}

/// Map an event name and its JSON payload to a flow.
///
/// `issues`/`labeled` with the ready label creates a change, a `/fix` comment
/// on a pull request runs the fix loop, an opened or updated pull request is
/// reviewed. Everything else is ignored.
pub fn route_event(event: &str, body: &[u8], ready_label: &str) -> Result<Routed, serde_json::Error> {
    if event == "ping" {
        return Ok(Routed {
            status: "pong",
            dispatch: None,
        });
    }

    let payload: Payload = serde_json::from_slice(body)?;
    let action = payload.action.as_deref().unwrap_or_default();
    let Some(repo) = payload.repository else {
        return Ok(Routed::ignored());
    };

    let routed = match (event, action) {
        ("issues", "labeled") => {
            let labeled_ready = payload.label.is_some_and(|l| l.name == ready_label);
            match payload.issue {
                Some(issue) if labeled_ready => Some((
                    "processing_issue",
                    FlowRequest::CreateChange {
                        task: issue.html_url,
                    },
                )),
                _ => None,
            }
        }
        ("issue_comment", "created") => {
            let asks_fix = payload
                .comment
                .and_then(|c| c.body)
                .is_some_and(|b| b.contains(FIX_COMMAND));
            match payload.issue {
                Some(IssuePayload {
                    html_url,
                    pull_request: Some(link),
                }) if asks_fix => Some((
                    "processing_comment",
                    FlowRequest::ApplyFix {
                        change: link.html_url.unwrap_or_else(|| html_url.clone()),
                        task: html_url,
                    },
                )),
                _ => None,
            }
        }
        ("pull_request", "opened" | "synchronize") => payload.pull_request.map(|pr| {
            (
                "processing_pr",
                FlowRequest::Review {
                    change: pr.html_url.clone(),
                    task: pr.html_url,
                },
            )
        }),
        _ => None,
    };

    Ok(match routed {
        Some((status, request)) => {
            let clone_url = repo
                .clone_url
                .unwrap_or_else(|| format!("https://github.com/{}.git", repo.full_name));
            Routed {
                status,
                dispatch: Some(Dispatch {
                    repository: repo.full_name,
                    clone_url,
                    request,
                }),
            }
        }
        None => Routed::ignored(),
    })
}
