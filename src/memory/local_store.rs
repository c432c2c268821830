//! 本地偏好文件
//!
//! 单个 UTF-8 JSON 文件，内容为 key→文本 对象。读取永不失败（缺失/损坏均视为空），
//! 写入失败只记日志；本地文件是偏好的权威副本。

use std::path::{Path, PathBuf};

use crate::memory::PreferenceSet;

/// 默认存储路径（相对工作目录）
pub const DEFAULT_PREFERENCES_PATH: &str = "data/preferences.json";

/// JSON 文件存储：load 返回 PreferenceSet，save 整体覆盖写入
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 从文件加载；文件不存在、不可读或 JSON 非法时返回空集合
    pub fn load(&self) -> PreferenceSet {
        if !self.path.exists() {
            return PreferenceSet::new();
        }
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Could not read preferences file {:?}: {}", self.path, e);
                return PreferenceSet::new();
            }
        };
        match serde_json::from_str(&data) {
            Ok(set) => set,
            Err(e) => {
                tracing::warn!(
                    "Preferences file {:?} is corrupt, treating as empty: {}",
                    self.path,
                    e
                );
                PreferenceSet::new()
            }
        }
    }

    /// 覆盖写入整个集合；父目录不存在时自动创建。失败只记 warn
    pub fn save(&self, preferences: &PreferenceSet) {
        if let Err(e) = self.write(preferences) {
            tracing::warn!("Could not save preferences to {:?}: {}", self.path, e);
        }
    }

    fn write(&self, preferences: &PreferenceSet) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(preferences)?)?;
        Ok(())
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new(DEFAULT_PREFERENCES_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path().join("nope.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(LocalStore::new(&path).load().is_empty());

        std::fs::write(&path, r#"{"style": ["casual"]}"#).unwrap();
        assert!(LocalStore::new(&path).load().is_empty());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("nested").join("preferences.json");
        let store = LocalStore::new(&path);

        let set: PreferenceSet = [("style", "casual")].into_iter().collect();
        store.save(&set);

        assert!(path.exists());
        assert_eq!(store.load(), set);
    }

    #[test]
    fn test_save_load_round_trip_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path().join("preferences.json"));

        let set: PreferenceSet = (0..1000)
            .map(|i| (format!("key_{i}"), format!("value \"{i}\" ☂")))
            .collect();
        store.save(&set);

        let loaded = store.load();
        store.save(&loaded);
        let reloaded = store.load();

        assert_eq!(loaded, set);
        assert_eq!(reloaded, set);
    }

    #[test]
    fn test_save_failure_is_swallowed() {
        let dir = TempDir::new().unwrap();
        // 目标路径是目录，写入必然失败
        let store = LocalStore::new(dir.path());
        store.save(&[("a", "b")].into_iter().collect());
        assert!(store.load().is_empty());
    }
}
