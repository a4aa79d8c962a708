// ─── Artifact Assembler ───
// Walks the tree listing of a resolved source, persists versioned
// manifest files into the local cache and folds credential files into a
// per-depot credential list plus a recency-ordered version map.

pub mod keyfile;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::cdn::FileFetcher;
use crate::core::error::{UnlockError, UnlockResult};
use crate::core::github::{GitHubApi, RepoInfo, TreeEntry};

const MANIFEST_SUFFIX: &str = ".manifest";
const KEY_FILE_MARKER: &str = "key.vdf";

/// How many manifest downloads may be in flight at once. Results are
/// still folded into the accumulators by this task alone.
const MANIFEST_CONCURRENCY: usize = 8;

/// One unlockable depot: its id, decryption key and known manifest ids,
/// newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepotInfo {
    pub depot_id: String,
    pub decryption_key: String,
    #[serde(default)]
    pub manifest_ids: Vec<String>,
}

/// Depot id to manifest ids, each list strictly descending by numeric
/// value. Only fully numeric ids are ever inserted.
pub type VersionMap = HashMap<String, Vec<String>>;

pub struct Assembler;

impl Assembler {
    /// Fetch the tree listing for `source` and assemble everything under
    /// it into `dest`.
    pub async fn assemble<F: FileFetcher>(
        github: &GitHubApi,
        fetcher: &F,
        source: &RepoInfo,
        dest: &Path,
    ) -> UnlockResult<(Vec<DepotInfo>, VersionMap)> {
        let entries = github.fetch_tree(source).await?;
        Self::assemble_entries(fetcher, source, &entries, dest).await
    }

    /// Assemble an already-listed tree. Manifest bodies are fetched
    /// concurrently (bounded, order-preserving); credential files are
    /// processed sequentially in tree order so that a later file's record
    /// overwrites an earlier one with the same depot id.
    pub async fn assemble_entries<F: FileFetcher>(
        fetcher: &F,
        source: &RepoInfo,
        entries: &[TreeEntry],
        dest: &Path,
    ) -> UnlockResult<(Vec<DepotInfo>, VersionMap)> {
        let mut manifest_paths = Vec::new();
        let mut key_paths = Vec::new();
        for entry in entries {
            if entry.path.ends_with(MANIFEST_SUFFIX) {
                manifest_paths.push(entry.path.as_str());
            } else if entry.path.to_ascii_lowercase().contains(KEY_FILE_MARKER) {
                key_paths.push(entry.path.as_str());
            }
        }

        // Versioned manifest files.
        let results: Vec<UnlockResult<Option<(String, String)>>> = stream::iter(manifest_paths)
            .map(|path| process_manifest(fetcher, source, path, dest))
            .buffered(MANIFEST_CONCURRENCY)
            .collect()
            .await;

        let mut version_map = VersionMap::new();
        for result in results {
            if let Some((depot_id, manifest_id)) = result? {
                version_map.entry(depot_id).or_default().push(manifest_id);
            }
        }

        // Credential files, in tree order.
        let mut depots: Vec<DepotInfo> = Vec::new();
        for path in key_paths {
            let bytes = fetcher.fetch(&source.name, &source.sha, path).await?;
            let records = keyfile::parse_key_file(&bytes);
            if records.is_empty() {
                warn!("credential file {path} yielded no records");
            }
            for record in records {
                merge_credential(&mut depots, record);
            }
        }

        for ids in version_map.values_mut() {
            sort_versions_descending(ids);
        }
        for depot in &mut depots {
            if let Some(ids) = version_map.get(&depot.depot_id) {
                depot.manifest_ids = ids.clone();
            }
        }

        Ok((depots, version_map))
    }
}

/// Download one manifest file unless it is already cached, and report its
/// `(depot_id, manifest_id)` pair.
///
/// The pair is parsed whether or not the body was fetched, so a re-run
/// over a warm cache rebuilds the exact same version map without issuing
/// a single download.
async fn process_manifest<F: FileFetcher>(
    fetcher: &F,
    source: &RepoInfo,
    path: &str,
    dest_dir: &Path,
) -> UnlockResult<Option<(String, String)>> {
    let pair = parse_manifest_filename(path);

    let target = dest_dir.join(path);
    if target.exists() {
        info!("manifest already cached: {path}");
        return Ok(pair);
    }

    let bytes = fetcher.fetch(&source.name, &source.sha, path).await?;
    write_atomic(&target, &bytes).await?;
    info!("manifest downloaded: {path}");

    Ok(pair)
}

/// Write via a temp name plus rename so an interrupted run never leaves a
/// truncated file in the cache.
async fn write_atomic(path: &Path, bytes: &[u8]) -> UnlockResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| UnlockError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".part");
    let tmp = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|source| UnlockError::Io {
            path: tmp.clone(),
            source,
        })?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|source| UnlockError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Split a manifest filename into `(depot_id, manifest_id)`.
///
/// The stem must consist of exactly two `_`-separated, fully numeric
/// segments; anything else is excluded from the version map.
pub fn parse_manifest_filename(name: &str) -> Option<(String, String)> {
    let stem = name.strip_suffix(MANIFEST_SUFFIX)?;
    let (depot_id, manifest_id) = stem.split_once('_')?;
    if !is_numeric(depot_id) || !is_numeric(manifest_id) {
        return None;
    }
    Some((depot_id.to_string(), manifest_id.to_string()))
}

fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Later records overwrite earlier ones with the same depot id, keeping
/// the first-seen position in the list.
fn merge_credential(depots: &mut Vec<DepotInfo>, record: DepotInfo) {
    match depots.iter_mut().find(|d| d.depot_id == record.depot_id) {
        Some(existing) => *existing = record,
        None => depots.push(record),
    }
}

/// Numeric descending order. Lexical order would be wrong for ids of
/// differing digit counts, so compare parsed values; the stable sort
/// keeps insertion order among numeric ties.
fn sort_versions_descending(ids: &mut [String]) {
    ids.sort_by(|a, b| numeric_value(b).cmp(&numeric_value(a)));
}

fn numeric_value(id: &str) -> u128 {
    id.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn manifest_filename_round_trip() {
        assert_eq!(
            parse_manifest_filename("123_456.manifest"),
            Some(("123".into(), "456".into()))
        );
        assert_eq!(parse_manifest_filename("abc.manifest"), None);
        assert_eq!(parse_manifest_filename("123.manifest"), None);
        assert_eq!(parse_manifest_filename("123_abc.manifest"), None);
        assert_eq!(parse_manifest_filename("123_456.txt"), None);
        assert_eq!(parse_manifest_filename("1_2_3.manifest"), None);
        assert_eq!(parse_manifest_filename("_123.manifest"), None);
    }

    #[test]
    fn version_sort_is_numeric_not_lexical() {
        let mut ids = vec!["9".to_string(), "10".to_string(), "00010".to_string()];
        sort_versions_descending(&mut ids);
        // 10 == 00010 numerically; the stable sort keeps their insertion
        // order, and 9 sorts last despite being lexically greatest.
        assert_eq!(ids, vec!["10", "00010", "9"]);
    }

    #[test]
    fn later_credential_overwrites_earlier() {
        let mut depots = Vec::new();
        merge_credential(
            &mut depots,
            DepotInfo {
                depot_id: "10".into(),
                decryption_key: "old".into(),
                manifest_ids: Vec::new(),
            },
        );
        merge_credential(
            &mut depots,
            DepotInfo {
                depot_id: "20".into(),
                decryption_key: "other".into(),
                manifest_ids: Vec::new(),
            },
        );
        merge_credential(
            &mut depots,
            DepotInfo {
                depot_id: "10".into(),
                decryption_key: "new".into(),
                manifest_ids: Vec::new(),
            },
        );

        assert_eq!(depots.len(), 2);
        assert_eq!(depots[0].depot_id, "10");
        assert_eq!(depots[0].decryption_key, "new");
        assert_eq!(depots[1].depot_id, "20");
    }

    // ── Assembly against an in-memory source ────────────

    struct MemoryFetcher {
        files: HashMap<String, Vec<u8>>,
        calls: Mutex<Vec<String>>,
    }

    impl MemoryFetcher {
        fn new(files: Vec<(&str, Vec<u8>)>) -> Self {
            Self {
                files: files
                    .into_iter()
                    .map(|(path, bytes)| (path.to_string(), bytes))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls_for(&self, path: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.as_str() == path)
                .count()
        }
    }

    #[async_trait]
    impl FileFetcher for MemoryFetcher {
        async fn fetch(&self, _repo: &str, _sha: &str, path: &str) -> UnlockResult<Vec<u8>> {
            self.calls.lock().unwrap().push(path.to_string());
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| UnlockError::Retrieval {
                    path: path.to_string(),
                })
        }
    }

    fn source() -> RepoInfo {
        RepoInfo {
            name: "owner/repo".into(),
            last_update: Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap(),
            sha: "0f4a9c".into(),
            tree_url: "https://example.com/tree".into(),
        }
    }

    fn entries(paths: &[&str]) -> Vec<TreeEntry> {
        paths
            .iter()
            .map(|p| TreeEntry {
                path: p.to_string(),
            })
            .collect()
    }

    const KEY_FILE: &str = r#"
"depots"
{
	"11"
	{
		"DecryptionKey"		"aaaa"
	}
}
"#;

    #[tokio::test]
    async fn assembly_is_idempotent_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MemoryFetcher::new(vec![
            ("11_222.manifest", b"manifest-body".to_vec()),
            ("11_9.manifest", b"older-body".to_vec()),
            ("Key.vdf", KEY_FILE.as_bytes().to_vec()),
        ]);
        let listing = entries(&["11_222.manifest", "11_9.manifest", "Key.vdf", "README.md"]);

        let (depots, first_map) =
            Assembler::assemble_entries(&fetcher, &source(), &listing, dir.path())
                .await
                .unwrap();

        assert_eq!(depots.len(), 1);
        assert_eq!(depots[0].depot_id, "11");
        assert_eq!(depots[0].manifest_ids, vec!["222", "9"]);
        assert_eq!(first_map["11"], vec!["222", "9"]);
        assert!(dir.path().join("11_222.manifest").exists());
        assert_eq!(fetcher.calls_for("11_222.manifest"), 1);

        let (_, second_map) =
            Assembler::assemble_entries(&fetcher, &source(), &listing, dir.path())
                .await
                .unwrap();

        // Second run: no manifest re-fetches, identical map.
        assert_eq!(fetcher.calls_for("11_222.manifest"), 1);
        assert_eq!(fetcher.calls_for("11_9.manifest"), 1);
        assert_eq!(second_map, first_map);
    }

    #[tokio::test]
    async fn missing_manifest_aborts_assembly() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MemoryFetcher::new(vec![("Key.vdf", KEY_FILE.as_bytes().to_vec())]);
        let listing = entries(&["11_222.manifest", "Key.vdf"]);

        let result =
            Assembler::assemble_entries(&fetcher, &source(), &listing, dir.path()).await;

        assert!(matches!(
            result,
            Err(UnlockError::Retrieval { path }) if path == "11_222.manifest"
        ));
    }

    #[tokio::test]
    async fn malformed_names_are_excluded_but_cached() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MemoryFetcher::new(vec![
            ("oddly_named_file.manifest", b"body".to_vec()),
            ("Key.vdf", KEY_FILE.as_bytes().to_vec()),
        ]);
        let listing = entries(&["oddly_named_file.manifest", "Key.vdf"]);

        let (_, map) = Assembler::assemble_entries(&fetcher, &source(), &listing, dir.path())
            .await
            .unwrap();

        assert!(map.is_empty());
        // The file itself is still persisted to the cache.
        assert!(dir.path().join("oddly_named_file.manifest").exists());
    }
}
