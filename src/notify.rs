use serde::Serialize;
use std::fmt;
#[cfg(test)]
use std::sync::Mutex;
use tracing::{info, warn};

/// 面向用户的提示
///
/// 每一项对应一次需要用户确认的通知
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    ImportCompleted { book_id: i64, chapters: usize },
    FileSkipped { name: String, reason: String },
    NoTextFiles,
    OfflineUploadBlocked,
    BookSaved { book_id: i64 },
    AlreadySaved { book_id: i64 },
    StorageUnavailable,
    WrongPassword,
    SavedBookRemoved { book_id: i64 },
    BookDeleted { book_id: i64 },
}

impl Notice {
    /// 是否为错误类提示
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Notice::FileSkipped { .. }
                | Notice::NoTextFiles
                | Notice::OfflineUploadBlocked
                | Notice::StorageUnavailable
                | Notice::WrongPassword
        )
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::ImportCompleted { chapters, .. } => {
                write!(f, "已成功导入 {} 个章节", chapters)
            }
            Notice::FileSkipped { name, .. } => {
                write!(f, "无法读取文件 {}，请检查文件格式或编码", name)
            }
            Notice::NoTextFiles => write!(f, "目录中没有找到 .txt 文件"),
            Notice::OfflineUploadBlocked => write!(f, "离线状态下无法上传"),
            Notice::BookSaved { .. } => write!(f, "已成功离线保存整本书"),
            Notice::AlreadySaved { .. } => write!(f, "这本书已经保存过了"),
            Notice::StorageUnavailable => write!(f, "本地存储不可用，无法保存"),
            Notice::WrongPassword => write!(f, "密码不正确"),
            Notice::SavedBookRemoved { .. } => write!(f, "已移除离线保存"),
            Notice::BookDeleted { .. } => write!(f, "书籍已删除"),
        }
    }
}

/// 通知接收方
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// 只写日志的通知器（命令行 `--quiet` 使用）
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        if notice.is_error() {
            warn!(?notice, "{}", notice);
        } else {
            info!(?notice, "{}", notice);
        }
    }
}

/// 输出到终端的通知器（命令行使用）
#[derive(Debug, Default, Clone)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        if notice.is_error() {
            eprintln!("✗ {}", notice);
        } else {
            eprintln!("✓ {}", notice);
        }
    }
}

/// 记录所有通知，便于检查
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices.lock().ok()?.last().cloned()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}
