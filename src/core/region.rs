// ─── Region Probe ───
// One JSON call decides whether the run is on a domestic network, which
// in turn selects the active CDN endpoint list. Any failure falls back
// to domestic mode.

use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::core::error::UnlockResult;

const REGION_PROBE_URL: &str = "https://mips.kugou.com/check/iscn?&format=json";

#[derive(Debug, Deserialize)]
struct RegionReply {
    #[serde(default)]
    flag: Option<serde_json::Value>,
    #[serde(default)]
    country: Option<String>,
}

pub struct RegionDetector {
    client: Client,
}

impl RegionDetector {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Whether the current network is domestic. Defaults to `true` when
    /// the probe cannot be reached or read.
    pub async fn is_domestic(&self) -> bool {
        match self.probe().await {
            Ok(reply) => {
                let domestic = reply.flag.as_ref().map_or(true, flag_is_set);
                let country = reply.country.as_deref().unwrap_or("unknown");
                if domestic {
                    info!("domestic network detected ({country}), using mirror endpoints");
                } else {
                    info!("network region {country}, using the official endpoint");
                }
                domestic
            }
            Err(e) => {
                warn!("region probe failed, assuming domestic network: {e}");
                true
            }
        }
    }

    async fn probe(&self) -> UnlockResult<RegionReply> {
        let reply = self
            .client
            .get(REGION_PROBE_URL)
            .send()
            .await?
            .json()
            .await?;
        Ok(reply)
    }
}

// The probe reports the flag as a bool or a 0/1 number depending on the
// endpoint revision.
fn flag_is_set(flag: &serde_json::Value) -> bool {
    match flag {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_i64().map_or(true, |n| n != 0),
        _ => true,
    }
}
