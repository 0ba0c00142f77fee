use thiserror::Error;

/// 阅读器统一错误类型
#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("数据库错误: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("网络请求失败: {0}")]
    Network(#[from] reqwest::Error),
    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("配置解析失败: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("配置错误: {0}")]
    Config(String),
    #[error("文件解码失败: {0}")]
    Decode(String),
    #[error("离线状态下无法上传")]
    Offline,
    #[error("目录中没有找到 .txt 文件")]
    NoTextFiles,
    #[error("密码不正确")]
    WrongPassword,
    #[error("存储不可用")]
    StorageUnavailable,
    #[error("找不到书籍: {0}")]
    BookNotFound(i64),
    #[error("找不到章节: {0}")]
    ChapterNotFound(u32),
    #[error("无效的地址: {0}")]
    InvalidUrl(String),
    #[error("预缓存失败: {url} 返回状态 {status}")]
    Precache { url: String, status: u16 },
    #[error("锁定缓存失败: {0}")]
    CacheLock(String),
}

pub type Result<T> = std::result::Result<T, ReaderError>;
