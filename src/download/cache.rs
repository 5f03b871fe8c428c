use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let cache_dir = match custom_dir {
            Some(dir) => dir,
            None => {
                let proj_dirs = ProjectDirs::from("", "", "spansh-galaxy-store")
                    .context("Could not determine cache directory")?;
                proj_dirs.cache_dir().to_path_buf()
            }
        };

        fs::create_dir_all(&cache_dir).context("Failed to create cache directory")?;

        Ok(Self { cache_dir })
    }

    /// Get the cache directory path
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Where the compressed dump for `dataset` lives, e.g. `galaxy_1day.json.gz`
    pub fn dataset_path(&self, dataset: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json.gz", dataset))
    }

    /// A finished download is non-empty; partial files use a `.part` suffix
    pub fn is_cached(&self, dataset: &str) -> bool {
        fs::metadata(self.dataset_path(dataset))
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    /// Remove partial downloads left behind by an interrupted run
    pub fn cleanup_partial(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "part") {
                fs::remove_file(&path).ok();
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_path_and_cache_state() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(Some(dir.path().join("cache"))).unwrap();
        let path = cache.dataset_path("galaxy_1day");
        assert!(path.ends_with("galaxy_1day.json.gz"));
        assert!(!cache.is_cached("galaxy_1day"));

        fs::write(&path, b"").unwrap();
        assert!(!cache.is_cached("galaxy_1day"));
        fs::write(&path, b"data").unwrap();
        assert!(cache.is_cached("galaxy_1day"));
    }

    #[test]
    fn test_cleanup_partial() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(Some(dir.path().to_path_buf())).unwrap();
        fs::write(dir.path().join("galaxy.json.gz.part"), b"x").unwrap();
        fs::write(cache.dataset_path("galaxy"), b"x").unwrap();

        assert_eq!(cache.cleanup_partial().unwrap(), 1);
        assert!(cache.is_cached("galaxy"));
    }
}
