use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{UnlockError, UnlockResult};

/// Candidate manifest repositories, queried in priority order.
/// Earlier entries win timestamp ties during resolution.
const DEFAULT_REPOS: &[&str] = &[
    "SteamAutoCracks/ManifestHub",
    "Auiowu/ManifestAutoUpdate",
    "tymolu233/ManifestAutoUpdate-fix",
];

/// On-disk application configuration.
///
/// Loaded once at startup and passed into component constructors;
/// there is no ambient configuration state anywhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Personal access token for the metadata API. Optional, but
    /// strongly recommended when going through a proxy.
    pub github_token: String,
    /// Overrides Steam installation discovery when set.
    pub steam_path: Option<PathBuf>,
    /// Enables debug-level logging for this crate.
    pub debug: bool,
    /// Candidate repositories in priority order.
    pub repos: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            github_token: String::new(),
            steam_path: None,
            debug: false,
            repos: DEFAULT_REPOS.iter().map(|r| r.to_string()).collect(),
        }
    }
}

impl AppConfig {
    /// Load the configuration file, generating a default one on first run.
    ///
    /// Returns the configuration and whether the file was just created,
    /// so the caller can tell the user to fill it in.
    pub fn load_or_init(path: &Path) -> UnlockResult<(Self, bool)> {
        if !path.exists() {
            let defaults = Self::default();
            defaults.save(path)?;
            return Ok((defaults, true));
        }

        let text = std::fs::read_to_string(path).map_err(|source| UnlockError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: AppConfig = serde_json::from_str(&text).map_err(|e| {
            UnlockError::Config(format!("invalid configuration at {}: {e}", path.display()))
        })?;

        Ok((config, false))
    }

    pub fn save(&self, path: &Path) -> UnlockResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| UnlockError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| UnlockError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Token to present to the metadata API, if one is configured.
    pub fn token(&self) -> Option<&str> {
        let token = self.github_token.trim();
        (!token.is_empty()).then_some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_load_generates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let (config, created) = AppConfig::load_or_init(&path).unwrap();
        assert!(created);
        assert!(path.exists());
        assert!(config.token().is_none());
        assert!(!config.repos.is_empty());

        let (reloaded, created) = AppConfig::load_or_init(&path).unwrap();
        assert!(!created);
        assert_eq!(reloaded.repos, config.repos);
    }

    #[test]
    fn blank_token_reads_as_none() {
        let config = AppConfig {
            github_token: "   ".into(),
            ..AppConfig::default()
        };
        assert!(config.token().is_none());

        let config = AppConfig {
            github_token: "ghp_abc".into(),
            ..AppConfig::default()
        };
        assert_eq!(config.token(), Some("ghp_abc"));
    }
}
