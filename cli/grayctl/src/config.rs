//! CLI configuration.
//!
//! Storage settings come from the environment (see
//! [`StorageConfig::from_env`]); command-line flags override them.

use std::path::PathBuf;

use grayframe_storage::StorageConfig;

/// Load storage settings, applying a `--data-dir` override.
pub fn load(data_dir: Option<PathBuf>) -> StorageConfig {
    let cache_from_env = std::env::var_os("GRAYFRAME_CACHE_DIR").is_some();
    with_data_dir(StorageConfig::from_env(), data_dir, cache_from_env)
}

/// Point `config` at `data_dir`. The cache moves along with it unless it was
/// set explicitly.
fn with_data_dir(
    mut config: StorageConfig,
    data_dir: Option<PathBuf>,
    cache_pinned: bool,
) -> StorageConfig {
    if let Some(dir) = data_dir {
        if !cache_pinned {
            config.cache_dir = dir.join("cache");
        }
        config.data_dir = dir;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_dir_override_moves_cache() {
        let base = StorageConfig::new("/var/lib/gf");
        let config = with_data_dir(base.clone(), Some("/tmp/other".into()), false);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/other"));
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/other/cache"));

        let pinned = with_data_dir(base.clone(), Some("/tmp/other".into()), true);
        assert_eq!(pinned.cache_dir, base.cache_dir);

        let untouched = with_data_dir(base.clone(), None, false);
        assert_eq!(untouched.data_dir, base.data_dir);
    }
}
