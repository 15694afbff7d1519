//! Storage configuration.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;

/// Primary database name.
pub const DEFAULT_DATABASE_NAME: &str = "grayframe";

/// Primary schema version. Bumped only when the `kv` table itself changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Prefix applied to every key written to the fallback store.
pub const FALLBACK_NAMESPACE: &str = "gf:";

/// Debounce window for autosave.
pub const DEFAULT_SAVE_DEBOUNCE: Duration = Duration::from_millis(150);

/// Database names deleted by a wipe when the data directory cannot be listed.
pub const KNOWN_DATABASES: &[&str] = &["grayframe", "grayframe-db", "pinia", "pinia-db", "app-db"];

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding the primary database and the fallback file.
    pub data_dir: PathBuf,

    /// Directory holding disposable cached data.
    pub cache_dir: PathBuf,

    /// Primary database name (file stem).
    pub database_name: String,

    /// Primary schema version.
    pub schema_version: u32,

    /// Fallback store file name inside `data_dir`.
    pub fallback_file: String,

    /// Key namespace inside the fallback store.
    pub fallback_namespace: String,

    /// Maximum bytes the fallback store may hold.
    pub fallback_quota_bytes: u64,

    /// Quota reported by usage estimation. `None` means unsupported.
    pub storage_quota_bytes: Option<u64>,

    /// Databases to delete when enumeration fails.
    pub known_databases: Vec<String>,

    /// Quiescence window before an autosave flushes.
    pub save_debounce: Duration,

    /// Whether to use the SQLite backend at all.
    pub primary_enabled: bool,
}

impl StorageConfig {
    /// Create a configuration rooted at `data_dir` with default settings.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            cache_dir: data_dir.join("cache"),
            data_dir,
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            schema_version: SCHEMA_VERSION,
            fallback_file: "fallback-store.json".to_string(),
            fallback_namespace: FALLBACK_NAMESPACE.to_string(),
            fallback_quota_bytes: 5 * 1024 * 1024, // 5 MiB
            storage_quota_bytes: Some(256 * 1024 * 1024), // 256 MiB
            known_databases: KNOWN_DATABASES.iter().map(|s| s.to_string()).collect(),
            save_debounce: DEFAULT_SAVE_DEBOUNCE,
            primary_enabled: true,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// The cache lives under the data directory whenever `GRAYFRAME_DATA_DIR`
    /// is set, unless `GRAYFRAME_CACHE_DIR` names one explicitly.
    pub fn from_env() -> Self {
        let platform = ProjectDirs::from("com", "grayframe", "grayframe")
            .map(|d| (d.data_dir().to_path_buf(), d.cache_dir().to_path_buf()));
        let (data_dir, cache_dir) = resolve_dirs(
            std::env::var_os("GRAYFRAME_DATA_DIR").map(PathBuf::from),
            std::env::var_os("GRAYFRAME_CACHE_DIR").map(PathBuf::from),
            platform,
        );

        let mut config = Self::new(data_dir);
        config.cache_dir = cache_dir;

        if let Some(ms) = env_parse::<u64>("GRAYFRAME_SAVE_DEBOUNCE_MS") {
            config.save_debounce = Duration::from_millis(ms);
        }

        if let Some(bytes) = env_parse::<u64>("GRAYFRAME_FALLBACK_QUOTA_BYTES") {
            config.fallback_quota_bytes = bytes;
        }

        // 0 disables usage estimation
        if let Some(bytes) = env_parse::<u64>("GRAYFRAME_STORAGE_QUOTA_BYTES") {
            config.storage_quota_bytes = (bytes > 0).then_some(bytes);
        }

        if let Some(enabled) = env_parse::<bool>("GRAYFRAME_PRIMARY_ENABLED") {
            config.primary_enabled = enabled;
        }

        config
    }

    /// Path of the primary database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.sqlite3", self.database_name))
    }

    /// Path of the fallback store file.
    pub fn fallback_path(&self) -> PathBuf {
        self.data_dir.join(&self.fallback_file)
    }
}

/// Pick `(data_dir, cache_dir)` from explicit overrides and the platform
/// directories.
fn resolve_dirs(
    data_override: Option<PathBuf>,
    cache_override: Option<PathBuf>,
    platform: Option<(PathBuf, PathBuf)>,
) -> (PathBuf, PathBuf) {
    match (data_override, platform) {
        (Some(data), _) => {
            let cache = cache_override.unwrap_or_else(|| data.join("cache"));
            (data, cache)
        }
        (None, Some((data, platform_cache))) => (data, cache_override.unwrap_or(platform_cache)),
        (None, None) => {
            let data = PathBuf::from(".grayframe");
            let cache = cache_override.unwrap_or_else(|| data.join("cache"));
            (data, cache)
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_derive_from_data_dir() {
        let config = StorageConfig::new("/tmp/gf");
        assert_eq!(config.database_path(), PathBuf::from("/tmp/gf/grayframe.sqlite3"));
        assert_eq!(config.fallback_path(), PathBuf::from("/tmp/gf/fallback-store.json"));
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/gf/cache"));
        assert_eq!(config.save_debounce, Duration::from_millis(150));
    }

    #[test]
    fn test_cache_follows_overridden_data_dir() {
        let platform = Some((
            PathBuf::from("/home/u/.local/share/gf"),
            PathBuf::from("/home/u/.cache/gf"),
        ));

        let (data, cache) = resolve_dirs(Some("/srv/gf".into()), None, platform.clone());
        assert_eq!(data, PathBuf::from("/srv/gf"));
        assert_eq!(cache, PathBuf::from("/srv/gf/cache"));

        let (_, cache) =
            resolve_dirs(Some("/srv/gf".into()), Some("/tmp/c".into()), platform.clone());
        assert_eq!(cache, PathBuf::from("/tmp/c"));

        let (data, cache) = resolve_dirs(None, None, platform);
        assert_eq!(data, PathBuf::from("/home/u/.local/share/gf"));
        assert_eq!(cache, PathBuf::from("/home/u/.cache/gf"));

        let (data, cache) = resolve_dirs(None, None, None);
        assert_eq!(cache, data.join("cache"));
    }
}
