// ─── Steam Environment ───
// Locates the Steam installation and normalizes user-supplied app ids.

use std::path::PathBuf;

use crate::core::config::AppConfig;
use crate::core::error::{UnlockError, UnlockResult};

/// Resolve the Steam installation directory.
///
/// A configured override wins; otherwise platform discovery runs. An
/// override that points nowhere is an error rather than a silent
/// fallback.
pub fn locate_steam(config: &AppConfig) -> UnlockResult<PathBuf> {
    if let Some(custom) = &config.steam_path {
        if custom.is_dir() {
            return Ok(custom.clone());
        }
        return Err(UnlockError::SteamNotFound(format!(
            "configured path does not exist: {}",
            custom.display()
        )));
    }

    discover_steam().ok_or_else(|| {
        UnlockError::SteamNotFound("no installation discovered; set steam_path in the configuration".into())
    })
}

#[cfg(windows)]
fn discover_steam() -> Option<PathBuf> {
    use winreg::enums::HKEY_CURRENT_USER;
    use winreg::RegKey;

    let key = RegKey::predef(HKEY_CURRENT_USER)
        .open_subkey("Software\\Valve\\Steam")
        .ok()?;
    let path: String = key.get_value("SteamPath").ok()?;
    let path = PathBuf::from(path);
    path.is_dir().then_some(path)
}

#[cfg(not(windows))]
fn discover_steam() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    [
        home.join(".steam/steam"),
        home.join(".local/share/Steam"),
        home.join("Library/Application Support/Steam"),
    ]
    .into_iter()
    .find(|p| p.is_dir())
}

/// Extract the app id from user input.
///
/// Inputs like `"123-456"` (app id plus a DLC suffix) resolve to the
/// first fully numeric segment.
pub fn normalize_app_id(raw: &str) -> Option<String> {
    raw.split('-')
        .map(str::trim)
        .find(|segment| !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_numeric_id() {
        assert_eq!(normalize_app_id("730"), Some("730".into()));
        assert_eq!(normalize_app_id(" 730 "), Some("730".into()));
    }

    #[test]
    fn first_numeric_segment_wins() {
        assert_eq!(normalize_app_id("123-456"), Some("123".into()));
        assert_eq!(normalize_app_id("abc-789"), Some("789".into()));
    }

    #[test]
    fn non_numeric_input_is_rejected() {
        assert_eq!(normalize_app_id("abc"), None);
        assert_eq!(normalize_app_id(""), None);
        assert_eq!(normalize_app_id("12a"), None);
    }

    #[test]
    fn configured_override_must_exist() {
        let config = AppConfig {
            steam_path: Some(PathBuf::from("/definitely/not/here")),
            ..AppConfig::default()
        };
        assert!(matches!(
            locate_steam(&config),
            Err(UnlockError::SteamNotFound(_))
        ));
    }

    #[test]
    fn configured_override_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            steam_path: Some(dir.path().to_path_buf()),
            ..AppConfig::default()
        };
        assert_eq!(locate_steam(&config).unwrap(), dir.path());
    }
}
