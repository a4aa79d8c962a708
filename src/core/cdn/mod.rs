// ─── CDN Fetcher ───
// Retrieves single files through an ordered list of endpoint templates.
// The retry policy is a bounded double loop: up to MAX_PASSES passes over
// the template list, first HTTP 200 short-circuits, exhaustion is fatal
// for the requested path.

use std::future::Future;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::core::error::{UnlockError, UnlockResult};

/// Endpoint templates used when the run is on a domestic network.
/// Order is failover priority.
const DOMESTIC_ENDPOINTS: &[&str] = &[
    "https://cdn.jsdmirror.com/gh/{repo}@{sha}/{path}",
    "https://raw.gitmirror.com/{repo}/{sha}/{path}",
    "https://raw.dgithub.xyz/{repo}/{sha}/{path}",
    "https://gh.akass.cn/{repo}/{sha}/{path}",
];

/// Endpoint templates used everywhere else.
const GLOBAL_ENDPOINTS: &[&str] = &["https://raw.githubusercontent.com/{repo}/{sha}/{path}"];

const MAX_PASSES: usize = 3;

/// Capability to fetch one file of a pinned source revision.
///
/// The assembler only depends on this trait, so it can be exercised
/// against an in-memory implementation in tests.
#[async_trait]
pub trait FileFetcher: Send + Sync {
    async fn fetch(&self, repo: &str, sha: &str, path: &str) -> UnlockResult<Vec<u8>>;
}

// ── Attempt schedule ────────────────────────────────────

/// One cell of the retry grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub pass: usize,
    pub template: usize,
}

/// Iterator over the full retry grid in order: every template of pass 0,
/// then every template of pass 1, and so on. Yields exactly
/// `passes * templates` attempts, which makes the retry bound testable
/// without any network.
#[derive(Debug)]
pub struct AttemptSchedule {
    passes: usize,
    templates: usize,
    pass: usize,
    template: usize,
}

impl AttemptSchedule {
    pub fn new(passes: usize, templates: usize) -> Self {
        Self {
            passes,
            templates,
            pass: 0,
            template: 0,
        }
    }
}

impl Iterator for AttemptSchedule {
    type Item = Attempt;

    fn next(&mut self) -> Option<Attempt> {
        if self.templates == 0 || self.pass >= self.passes {
            return None;
        }

        let item = Attempt {
            pass: self.pass,
            template: self.template,
        };

        self.template += 1;
        if self.template == self.templates {
            self.template = 0;
            self.pass += 1;
        }

        Some(item)
    }
}

/// Drive attempts until one succeeds or the schedule runs dry.
/// The first `Some` short-circuits; no further attempts are issued.
async fn run_attempts<T, F, Fut>(schedule: AttemptSchedule, mut attempt: F) -> Option<T>
where
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for cell in schedule {
        if let Some(value) = attempt(cell).await {
            return Some(value);
        }
    }
    None
}

fn render_template(template: &str, repo: &str, sha: &str, path: &str) -> String {
    template
        .replace("{repo}", repo)
        .replace("{sha}", sha)
        .replace("{path}", path)
}

// ── Fetcher ─────────────────────────────────────────────

pub struct CdnFetcher {
    client: Client,
    templates: &'static [&'static str],
}

impl CdnFetcher {
    /// `domestic` selects which ordered endpoint list is active; it comes
    /// from the external region probe.
    pub fn new(client: Client, domestic: bool) -> Self {
        let templates = if domestic {
            DOMESTIC_ENDPOINTS
        } else {
            GLOBAL_ENDPOINTS
        };
        Self { client, templates }
    }
}

#[async_trait]
impl FileFetcher for CdnFetcher {
    async fn fetch(&self, repo: &str, sha: &str, path: &str) -> UnlockResult<Vec<u8>> {
        let schedule = AttemptSchedule::new(MAX_PASSES, self.templates.len());

        let body = run_attempts(schedule, |cell| {
            let url = render_template(self.templates[cell.template], repo, sha, path);
            let client = &self.client;
            async move {
                match client.get(&url).send().await {
                    Ok(resp) if resp.status().is_success() => {
                        resp.bytes().await.ok().map(|b| b.to_vec())
                    }
                    Ok(resp) => {
                        debug!("endpoint {url} answered HTTP {} (pass {})", resp.status(), cell.pass);
                        None
                    }
                    Err(e) => {
                        debug!("endpoint {url} unreachable (pass {}): {e}", cell.pass);
                        None
                    }
                }
            }
        })
        .await;

        body.ok_or_else(|| UnlockError::Retrieval {
            path: path.to_string(),
        })
    }
}
