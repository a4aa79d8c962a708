use std::borrow::Cow;
use std::path::PathBuf;

use async_trait::async_trait;
use keyvalues_parser::{Obj, Value, Vdf};
use tracing::{info, warn};

use super::{SetupOptions, UnlockTool};
use crate::core::assembler::DepotInfo;
use crate::core::error::{UnlockError, UnlockResult};

const DEPOTS_KEY: &str = "depots";
const DECRYPTION_KEY: &str = "DecryptionKey";

/// GreenLuma strategy: one marker file per depot in `AppList/` plus the
/// decryption keys merged into the Steam key store.
pub struct GreenLuma {
    steam_path: PathBuf,
}

impl GreenLuma {
    pub fn new(steam_path: PathBuf) -> Self {
        Self { steam_path }
    }

    /// Clear the previous marker files and write one per depot, named by
    /// a 1-based sequence number. The directory always reflects exactly
    /// the latest assembled set.
    async fn write_app_list(&self, depots: &[DepotInfo]) -> UnlockResult<()> {
        let dir = self.steam_path.join("AppList");
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| UnlockError::Io {
                path: dir.clone(),
                source,
            })?;

        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|source| UnlockError::Io {
                path: dir.clone(),
                source,
            })?;
        while let Some(entry) = entries.next_entry().await.map_err(|source| UnlockError::Io {
            path: dir.clone(),
            source,
        })? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "txt") {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|source| UnlockError::Io { path, source })?;
            }
        }

        for (idx, depot) in depots.iter().enumerate() {
            let path = dir.join(format!("{}.txt", idx + 1));
            tokio::fs::write(&path, &depot.depot_id)
                .await
                .map_err(|source| UnlockError::Io { path, source })?;
        }

        Ok(())
    }

    /// Merge decryption keys into a key store document, leaving every
    /// unrelated field untouched.
    fn merge_key_store(content: &str, depots: &[DepotInfo]) -> UnlockResult<String> {
        let mut root =
            Vdf::parse(content).map_err(|e| UnlockError::KeyStore(e.to_string()))?;

        let Value::Obj(store) = &mut root.value else {
            return Err(UnlockError::KeyStore(
                "store root is not an object".into(),
            ));
        };

        let slot = store.entry(Cow::from(DEPOTS_KEY)).or_default();
        if !slot.iter().any(|v| matches!(v, Value::Obj(_))) {
            slot.push(Value::Obj(Obj::new()));
        }
        let Some(Value::Obj(depot_obj)) = slot.iter_mut().find(|v| matches!(v, Value::Obj(_)))
        else {
            return Err(UnlockError::KeyStore("depots slot is not an object".into()));
        };

        for depot in depots {
            let mut entry = Obj::new();
            entry.insert(
                Cow::from(DECRYPTION_KEY.to_string()),
                vec![Value::Str(Cow::from(depot.decryption_key.clone()))],
            );
            depot_obj.insert(
                Cow::from(depot.depot_id.clone()),
                vec![Value::Obj(entry)],
            );
        }

        Ok(root.to_string())
    }

    async fn update_key_store(&self, depots: &[DepotInfo]) -> UnlockResult<()> {
        let path = self.steam_path.join("config").join("config.vdf");
        let content =
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| UnlockError::Io {
                    path: path.clone(),
                    source,
                })?;

        let merged = Self::merge_key_store(&content, depots)?;

        tokio::fs::write(&path, merged)
            .await
            .map_err(|source| UnlockError::Io { path, source })
    }
}

#[async_trait]
impl UnlockTool for GreenLuma {
    async fn setup(
        &self,
        depots: &[DepotInfo],
        app_id: &str,
        _options: SetupOptions<'_>,
    ) -> bool {
        if let Err(e) = self.write_app_list(depots).await {
            warn!("failed to write app list: {e}");
            return false;
        }

        if let Err(e) = self.update_key_store(depots).await {
            warn!("failed to update key store: {e}");
            return false;
        }

        info!("GreenLuma configured for {app_id} ({} depots)", depots.len());
        true
    }
}
