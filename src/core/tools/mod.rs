// ─── Unlock Tools ───
// Strategies that turn an assembled credential set into local unlock
// configuration. Every variant reports plain success or failure; errors
// never escape a strategy.

pub mod greenluma;
pub mod steamtools;

pub use greenluma::GreenLuma;
pub use steamtools::SteamTools;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::assembler::{DepotInfo, VersionMap};

/// Which unlock mechanism is installed locally. Chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    SteamTools,
    GreenLuma,
}

/// Extra inputs a strategy may consume. The reference variant ignores
/// them; version pinning needs both.
#[derive(Debug, Default, Clone, Copy)]
pub struct SetupOptions<'a> {
    pub version_map: Option<&'a VersionMap>,
    pub version_lock: bool,
}

#[async_trait]
pub trait UnlockTool: Send + Sync {
    /// Write local unlock configuration for the given credentials.
    /// Returns whether the whole operation succeeded.
    async fn setup(&self, depots: &[DepotInfo], app_id: &str, options: SetupOptions<'_>) -> bool;
}

/// Dispatcher sin Box<dyn>
pub enum Tool {
    SteamTools(SteamTools),
    GreenLuma(GreenLuma),
}

impl Tool {
    pub fn new(kind: ToolKind, steam_path: PathBuf) -> Self {
        match kind {
            ToolKind::SteamTools => Self::SteamTools(SteamTools::new(steam_path)),
            ToolKind::GreenLuma => Self::GreenLuma(GreenLuma::new(steam_path)),
        }
    }

    pub async fn setup(
        &self,
        depots: &[DepotInfo],
        app_id: &str,
        options: SetupOptions<'_>,
    ) -> bool {
        match self {
            Tool::SteamTools(t) => t.setup(depots, app_id, options).await,
            Tool::GreenLuma(t) => t.setup(depots, app_id, options).await,
        }
    }
}
