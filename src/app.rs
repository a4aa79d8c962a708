// ─── Application Flow ───
// Wires resolution, retrieval and assembly together for one run and
// hands the result to the selected unlock strategy.

use std::path::PathBuf;

use reqwest::Client;
use tracing::{error, info};

use crate::core::assembler::{Assembler, DepotInfo, VersionMap};
use crate::core::cdn::CdnFetcher;
use crate::core::config::AppConfig;
use crate::core::error::{UnlockError, UnlockResult};
use crate::core::github::GitHubApi;
use crate::core::http::build_http_client;
use crate::core::region::RegionDetector;
use crate::core::steam::locate_steam;
use crate::core::tools::{SetupOptions, Tool, ToolKind};

pub struct App {
    config: AppConfig,
    client: Client,
    github: GitHubApi,
    steam_path: PathBuf,
}

impl App {
    pub fn new(config: AppConfig) -> UnlockResult<Self> {
        let client = build_http_client()?;
        let steam_path = locate_steam(&config)?;
        let github = GitHubApi::new(client.clone(), config.token().map(str::to_string));

        Ok(Self {
            config,
            client,
            github,
            steam_path,
        })
    }

    /// Resolve the freshest source for `app_id` and assemble its depot
    /// credentials and version map into the local manifest cache.
    pub async fn fetch_depot_data(
        &self,
        app_id: &str,
    ) -> UnlockResult<(Vec<DepotInfo>, VersionMap)> {
        self.github.check_rate_limit().await;

        let source = self
            .github
            .resolve_repo(&self.config.repos, app_id)
            .await
            .ok_or_else(|| UnlockError::NoRepository(app_id.to_string()))?;

        info!("selected manifest repository: https://github.com/{}", source.name);
        info!("branch last updated: {}", source.last_update.to_rfc3339());

        let domestic = RegionDetector::new(self.client.clone()).is_domestic().await;
        let fetcher = CdnFetcher::new(self.client.clone(), domestic);

        let depot_cache = self.steam_path.join("depotcache");
        Assembler::assemble(&self.github, &fetcher, &source, &depot_cache).await
    }

    /// One full run. Returns whether the unlock configuration was
    /// written successfully.
    pub async fn run(
        &self,
        app_id: &str,
        tool_kind: ToolKind,
        version_lock: bool,
    ) -> UnlockResult<bool> {
        info!("processing app {app_id}...");
        let (depots, version_map) = self.fetch_depot_data(app_id).await?;

        if depots.is_empty() {
            error!("no credentials found for {app_id}");
            return Ok(false);
        }

        let tool = Tool::new(tool_kind, self.steam_path.clone());
        let options = SetupOptions {
            version_map: Some(&version_map),
            version_lock,
        };

        let ok = tool.setup(&depots, app_id, options).await;
        if ok {
            info!("unlock configuration written; restart Steam to apply");
        } else {
            error!("unlock configuration failed");
        }
        Ok(ok)
    }
}
