use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ReaderError, Result};

const APP_DIR: &str = "offline-reader";
const CONFIG_FILE: &str = "config.toml";
const DB_FILE: &str = "library.db";

/// 删除书籍时使用的默认口令
///
/// 仅作为界面上的简单确认，不做哈希也不做任何服务端校验
pub const DEFAULT_DELETE_PASSWORD: &str = "truyenaidichdayA@";

/// 阅读器配置
///
/// 所有字段都有默认值，配置文件中只需写出需要覆盖的部分
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReaderConfig {
    pub storage: StorageConfig,
    pub library: LibraryConfig,
    pub cache: CacheConfig,
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite 数据库路径
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: base.join(APP_DIR).join(DB_FILE),
        }
    }
}

/// 书库配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LibraryConfig {
    /// 导入书籍的默认标题
    pub default_title: String,
    /// 导入书籍的默认作者
    pub default_author: String,
    /// 导入书籍的默认类型
    pub default_genre: String,
    /// 删除确认口令
    pub delete_password: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            default_title: "上传的书籍".to_string(),
            default_author: "未知作者".to_string(),
            default_genre: "自动翻译小说".to_string(),
            delete_password: DEFAULT_DELETE_PASSWORD.to_string(),
        }
    }
}

/// 离线缓存配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// 缓存名称，修改版本号会使旧缓存在激活时整体失效
    pub cache_name: String,
    /// 资源来源，同源判断与相对路径解析都基于它
    pub origin: String,
    /// 安装时预缓存的资源路径
    pub precache: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_name: "offline-reader-cache-v2".to_string(),
            origin: "http://localhost:3000".to_string(),
            precache: [
                "/",
                "/index.html",
                "/manifest.json",
                "/favicon.ico",
                "/logo192.png",
                "/logo512.png",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl ReaderConfig {
    /// 默认配置文件路径
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// 从 TOML 字符串解析配置
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ReaderConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载配置
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// 加载配置
    ///
    /// 指定路径时必须存在；未指定时尝试默认路径，不存在则使用默认配置
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::load(&p),
                _ => Ok(Self::default()),
            },
        }
    }

    fn validate(&self) -> Result<()> {
        if self.cache.cache_name.trim().is_empty() {
            return Err(ReaderError::Config("cache_name 不能为空".to_string()));
        }
        reqwest::Url::parse(&self.cache.origin)
            .map_err(|e| ReaderError::Config(format!("origin 无效: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReaderConfig::default();
        assert_eq!(config.library.delete_password, DEFAULT_DELETE_PASSWORD);
        assert_eq!(config.cache.cache_name, "offline-reader-cache-v2");
        assert_eq!(config.cache.precache.len(), 6);
        assert!(config.storage.database_path.ends_with("library.db"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ReaderConfig::from_toml(
            r#"
            [cache]
            cache_name = "reader-v3"

            [library]
            default_title = "我的书"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.cache_name, "reader-v3");
        assert_eq!(config.cache.origin, "http://localhost:3000");
        assert_eq!(config.library.default_title, "我的书");
        assert_eq!(config.library.default_author, "未知作者");
    }

    #[test]
    fn test_invalid_origin_rejected() {
        let result = ReaderConfig::from_toml("[cache]\norigin = \"not a url\"");
        assert!(matches!(result, Err(ReaderError::Config(_))));
    }

    #[test]
    fn test_empty_cache_name_rejected() {
        let result = ReaderConfig::from_toml("[cache]\ncache_name = \"  \"");
        assert!(matches!(result, Err(ReaderError::Config(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = ReaderConfig::from_toml("[cache\n");
        assert!(matches!(result, Err(ReaderError::ConfigParse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[storage]\ndatabase_path = \"/tmp/x.db\"\n").unwrap();

        let config = ReaderConfig::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.storage.database_path, PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ReaderConfig::load_or_default(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(ReaderError::Io(_))));
    }
}
