use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the whole backend.
/// Every module returns `Result<T, UnlockError>`.
#[derive(Debug, Error)]
pub enum UnlockError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request failed for {url}: HTTP {status}")]
    RequestFailed { url: String, status: u16 },

    /// Every endpoint template was tried for every pass and none
    /// produced the file.
    #[error("All download endpoints exhausted for {path}")]
    Retrieval { path: String },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Key store ───────────────────────────────────────
    #[error("Key store error: {0}")]
    KeyStore(String),

    // ── Configuration ───────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Steam installation not found: {0}")]
    SteamNotFound(String),

    // ── Resolution ──────────────────────────────────────
    #[error("No candidate repository has a branch for {0}")]
    NoRepository(String),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type UnlockResult<T> = Result<T, UnlockError>;

impl From<std::io::Error> for UnlockError {
    fn from(source: std::io::Error) -> Self {
        UnlockError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}
