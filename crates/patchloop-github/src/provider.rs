use async_trait::async_trait;
use patchloop_core::{ChangeRequestStore, StoreError, Task, TaskStore};
use patchloop_git::WorkTree;
use tracing::{debug, info, warn};

use crate::url::{parse_item_url, parse_remote_url};
use crate::{GitHubClient, GitHubError};

/// GitHub issues and pull requests, backed by a local clone
pub struct GitHubProvider {
    client: GitHubClient,
    worktree: WorkTree,
}

impl GitHubProvider {
    pub fn new(client: GitHubClient, worktree: WorkTree) -> Self {
        Self { client, worktree }
    }

    pub fn worktree(&self) -> &WorkTree {
        &self.worktree
    }

    fn repo_slug(&self) -> Result<(String, String), GitHubError> {
        let remote = self.worktree.remote_url()?;
        parse_remote_url(&remote).ok_or(GitHubError::InvalidUrl(remote))
    }
}

#[async_trait]
impl TaskStore for GitHubProvider {
    async fn get(&self, task_url: &str) -> Result<Task, StoreError> {
        let item = parse_item_url(task_url)?;
        let issue = self
            .client
            .get_issue(&item.owner, &item.repo, item.number)
            .await?;
        Ok(Task::new(task_url, issue.title, issue.body.unwrap_or_default()))
    }

    async fn get_comments(&self, task_url: &str) -> Result<Vec<String>, StoreError> {
        let item = parse_item_url(task_url)?;
        let comments = self
            .client
            .list_issue_comments(&item.owner, &item.repo, item.number)
            .await?;
        Ok(comments
            .into_iter()
            .filter_map(|c| c.body)
            .filter(|b| !b.trim().is_empty())
            .collect())
    }

    async fn post_comment(&self, target_url: &str, body: &str) -> Result<(), StoreError> {
        let item = parse_item_url(target_url)?;
        self.client
            .create_issue_comment(&item.owner, &item.repo, item.number, body)
            .await?;
        debug!(target = target_url, "Posted comment");
        Ok(())
    }

    /// A label that is already gone is not an error
    async fn remove_label(&self, task_url: &str, name: &str) -> Result<(), StoreError> {
        let item = parse_item_url(task_url)?;
        match self
            .client
            .remove_label(&item.owner, &item.repo, item.number, name)
            .await
        {
            Ok(()) => Ok(()),
            Err(GitHubError::NotFound(message)) => {
                warn!(label = name, task = task_url, %message, "Label was not present");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ChangeRequestStore for GitHubProvider {
    async fn switch_to_base(&self, base: &str) -> Result<(), StoreError> {
        self.worktree.switch_to_base(base, self.client.token())?;
        Ok(())
    }

    async fn create_branch(&self, name: &str) -> Result<(), StoreError> {
        self.worktree.create_branch(name)?;
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<bool, StoreError> {
        Ok(self.worktree.commit_all(message)?)
    }

    async fn push_and_open(&self, title: &str, body: &str, base: &str) -> Result<String, StoreError> {
        let branch = self.worktree.current_branch()?;
        self.worktree
            .push(&branch, self.client.token())
            .map_err(GitHubError::from)?;

        let (owner, repo) = self.repo_slug()?;
        let head = format!("{}:{}", owner, branch);
        let open = self.client.list_open_pulls(&owner, &repo, &head, base).await?;
        if let Some(existing) = open.into_iter().next() {
            info!(url = %existing.html_url, branch = %branch, "Change request already open");
            return Ok(existing.html_url);
        }

        let created = self
            .client
            .create_pull(&owner, &repo, title, body, &branch, base)
            .await?;
        info!(url = %created.html_url, branch = %branch, "Opened change request");
        Ok(created.html_url)
    }

    async fn get_diff(&self, change_url: &str) -> Result<String, StoreError> {
        let item = parse_item_url(change_url)?;
        let files = self
            .client
            .list_pull_files(&item.owner, &item.repo, item.number)
            .await?;

        let mut diff = String::new();
        for file in files {
            diff.push_str(&format!(
                "File: {}\nStatus: {}\nPatch:\n{}\n---\n",
                file.filename,
                file.status,
                file.patch.as_deref().unwrap_or("(no textual patch)")
            ));
        }
        Ok(diff)
    }

    async fn get_comments(&self, change_url: &str) -> Result<String, StoreError> {
        let item = parse_item_url(change_url)?;
        let review = self
            .client
            .list_review_comments(&item.owner, &item.repo, item.number)
            .await?;
        let general = self
            .client
            .list_issue_comments(&item.owner, &item.repo, item.number)
            .await?;

        let mut text = String::new();
        for comment in review {
            let position = comment
                .position
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            text.push_str(&format!(
                "[Review Comment] {}:{}\n{}\n---\n",
                comment.path, position, comment.body
            ));
        }
        for comment in general {
            text.push_str(&format!(
                "[General Comment] {}: {}\n---\n",
                comment.user.login,
                comment.body.unwrap_or_default()
            ));
        }
        Ok(text)
    }

    async fn checkout(&self, change_url: &str) -> Result<String, StoreError> {
        let item = parse_item_url(change_url)?;
        let pull = self
            .client
            .get_pull(&item.owner, &item.repo, item.number)
            .await?;
        let branch = pull.head.branch;
        self.worktree.checkout_branch(&branch, self.client.token())?;
        info!(branch = %branch, change = change_url, "Checked out change request branch");
        Ok(branch)
    }
}
