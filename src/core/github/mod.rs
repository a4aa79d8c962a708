// ─── Repository Metadata ───
// Branch lookup across candidate repositories, tree listings and the
// advisory rate-limit probe. File bodies are NOT fetched here; that is
// the CDN fetcher's job.

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::{info, warn};

use crate::core::error::{UnlockError, UnlockResult};

const GITHUB_API_BASE: &str = "https://api.github.com";

/// The repository selected as the source for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    /// `owner/name` repository identifier.
    pub name: String,
    /// Commit timestamp of the matching branch head.
    pub last_update: DateTime<Utc>,
    /// Revision hash of the branch head.
    pub sha: String,
    /// Tree listing URL taken from the same branch reply.
    pub tree_url: String,
}

/// One entry of a tree listing. Only the path matters.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntry {
    pub path: String,
}

/// Remaining metadata-API quota. Advisory only, never blocks a call.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateSnapshot {
    pub remaining: u64,
    /// Reset time as epoch seconds.
    pub reset: i64,
}

// ── Wire formats ────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct BranchReply {
    commit: BranchCommit,
}

#[derive(Debug, Deserialize)]
struct BranchCommit {
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    author: CommitAuthor,
    tree: TreeRef,
}

#[derive(Debug, Deserialize)]
struct CommitAuthor {
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TreeRef {
    url: String,
}

#[derive(Debug, Deserialize)]
struct TreeReply {
    tree: Vec<TreeEntry>,
}

#[derive(Debug, Deserialize)]
struct RateLimitReply {
    rate: RateSnapshot,
}

// ── API client ──────────────────────────────────────────

pub struct GitHubApi {
    client: Client,
    token: Option<String>,
}

impl GitHubApi {
    pub fn new(client: Client, token: Option<String>) -> Self {
        Self { client, token }
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Check the remaining request quota and log it.
    /// Failures are swallowed; this never blocks the run.
    pub async fn check_rate_limit(&self) -> Option<RateSnapshot> {
        let url = format!("{GITHUB_API_BASE}/rate_limit");
        let reply: RateLimitReply = match self.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json().await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!("rate limit reply unreadable: {e}");
                    return None;
                }
            },
            Ok(resp) => {
                warn!("rate limit check failed: HTTP {}", resp.status());
                return None;
            }
            Err(e) => {
                warn!("rate limit check failed: {e}");
                return None;
            }
        };

        let snapshot = reply.rate;
        info!("remaining metadata API requests: {}", snapshot.remaining);
        if snapshot.remaining == 0 {
            let reset = DateTime::<Utc>::from_timestamp(snapshot.reset, 0)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| snapshot.reset.to_string());
            warn!("metadata API quota exhausted, resets at {reset}");
        }

        Some(snapshot)
    }

    /// Look up `app_id` as a branch of every candidate in order and return
    /// the repository whose branch head is the most recent.
    ///
    /// Candidates that error out or have no matching branch are skipped
    /// with a warning. Equal timestamps keep the earlier candidate, so the
    /// input order doubles as a priority order.
    pub async fn resolve_repo(&self, candidates: &[String], app_id: &str) -> Option<RepoInfo> {
        let mut found = Vec::new();

        for repo in candidates {
            match self.lookup_branch(repo, app_id).await {
                Ok(Some(info)) => found.push(info),
                Ok(None) => warn!("repository {repo} has no branch for {app_id}"),
                Err(e) => warn!("failed to check repository {repo}: {e}"),
            }
        }

        select_latest(found)
    }

    async fn lookup_branch(&self, repo: &str, app_id: &str) -> UnlockResult<Option<RepoInfo>> {
        let url = format!("{GITHUB_API_BASE}/repos/{repo}/branches/{app_id}");
        let resp = self.get(&url).send().await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(UnlockError::RequestFailed {
                url,
                status: resp.status().as_u16(),
            });
        }

        let reply: BranchReply = resp.json().await?;
        Ok(Some(RepoInfo {
            name: repo.to_string(),
            last_update: reply.commit.commit.author.date,
            sha: reply.commit.sha,
            tree_url: reply.commit.commit.tree.url,
        }))
    }

    /// Fetch the file-tree listing for a resolved source.
    ///
    /// A single direct metadata call; endpoint failover does not apply.
    pub async fn fetch_tree(&self, source: &RepoInfo) -> UnlockResult<Vec<TreeEntry>> {
        let resp = self.get(&source.tree_url).send().await?;
        if !resp.status().is_success() {
            return Err(UnlockError::RequestFailed {
                url: source.tree_url.clone(),
                status: resp.status().as_u16(),
            });
        }

        let reply: TreeReply = resp.json().await?;
        Ok(reply.tree)
    }
}

/// Pick the entry with the greatest timestamp; ties keep the earliest.
fn select_latest(found: Vec<RepoInfo>) -> Option<RepoInfo> {
    let mut best: Option<RepoInfo> = None;
    for info in found {
        let newer = best
            .as_ref()
            .map_or(true, |current| info.last_update > current.last_update);
        if newer {
            best = Some(info);
        }
    }
    best
}
