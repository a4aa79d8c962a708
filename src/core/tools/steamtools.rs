use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{SetupOptions, UnlockTool};
use crate::core::assembler::DepotInfo;
use crate::core::error::{UnlockError, UnlockResult};

/// SteamTools strategy: one Lua script per title under
/// `config/stplug-in/`, registering every depot with its key and
/// optionally pinning each depot to its newest manifest id.
pub struct SteamTools {
    steam_path: PathBuf,
}

impl SteamTools {
    pub fn new(steam_path: PathBuf) -> Self {
        Self { steam_path }
    }

    fn unlock_script(depots: &[DepotInfo], app_id: &str, options: SetupOptions<'_>) -> String {
        let mut lines = vec![format!("addappid({app_id})")];

        for depot in depots {
            lines.push(format!(
                "addappid({}, 1, \"{}\")",
                depot.depot_id, depot.decryption_key
            ));

            if options.version_lock {
                // The version map is newest-first, so pinning takes the
                // first entry.
                let latest = options
                    .version_map
                    .and_then(|map| map.get(&depot.depot_id))
                    .and_then(|ids| ids.first());
                if let Some(manifest_id) = latest {
                    lines.push(format!(
                        "setManifestid({}, \"{manifest_id}\")",
                        depot.depot_id
                    ));
                }
            }
        }

        lines.join("\n") + "\n"
    }

    async fn write_script(&self, script: &str, app_id: &str) -> UnlockResult<()> {
        let dir = self.steam_path.join("config").join("stplug-in");
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| UnlockError::Io {
                path: dir.clone(),
                source,
            })?;

        let path = dir.join(format!("{app_id}.lua"));
        tokio::fs::write(&path, script)
            .await
            .map_err(|source| UnlockError::Io { path, source })
    }
}

#[async_trait]
impl UnlockTool for SteamTools {
    async fn setup(
        &self,
        depots: &[DepotInfo],
        app_id: &str,
        options: SetupOptions<'_>,
    ) -> bool {
        let script = Self::unlock_script(depots, app_id, options);

        if let Err(e) = self.write_script(&script, app_id).await {
            warn!("failed to write unlock script: {e}");
            return false;
        }

        info!(
            "SteamTools configured for {app_id} ({} depots{})",
            depots.len(),
            if options.version_lock { ", version locked" } else { "" }
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::core::assembler::VersionMap;

    fn depot(id: &str, key: &str) -> DepotInfo {
        DepotInfo {
            depot_id: id.into(),
            decryption_key: key.into(),
            manifest_ids: Vec::new(),
        }
    }

    #[test]
    fn script_registers_every_depot() {
        let script = SteamTools::unlock_script(
            &[depot("11", "aa"), depot("22", "bb")],
            "730",
            SetupOptions::default(),
        );

        assert!(script.starts_with("addappid(730)\n"));
        assert!(script.contains("addappid(11, 1, \"aa\")"));
        assert!(script.contains("addappid(22, 1, \"bb\")"));
        assert!(!script.contains("setManifestid"));
    }

    #[test]
    fn version_lock_pins_newest_manifest() {
        let map: VersionMap =
            HashMap::from([("11".to_string(), vec!["300".to_string(), "200".to_string()])]);
        let options = SetupOptions {
            version_map: Some(&map),
            version_lock: true,
        };

        let script = SteamTools::unlock_script(&[depot("11", "aa"), depot("22", "bb")], "730", options);

        assert!(script.contains("setManifestid(11, \"300\")"));
        // No known manifest for depot 22: registered but not pinned.
        assert!(script.contains("addappid(22, 1, \"bb\")"));
        assert!(!script.contains("setManifestid(22"));
    }

    #[tokio::test]
    async fn setup_writes_script_file() {
        let dir = tempfile::tempdir().unwrap();
        let tool = SteamTools::new(dir.path().to_path_buf());

        let ok = tool
            .setup(&[depot("11", "aa")], "730", SetupOptions::default())
            .await;
        assert!(ok);

        let script = std::fs::read_to_string(
            dir.path().join("config").join("stplug-in").join("730.lua"),
        )
        .unwrap();
        assert!(script.contains("addappid(11, 1, \"aa\")"));
    }
}
