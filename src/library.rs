use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::book_store::{Book, BookStore, Chapter};
use crate::config::{LibraryConfig, ReaderConfig};
use crate::error::{ReaderError, Result};
use crate::import::{BookImporter, ImportFile, SkippedFile};
use crate::notify::{Notice, Notifier};
use crate::session::ReaderSession;

/// 导入报告
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub book_id: i64,
    pub chapters: usize,
    pub skipped: Vec<SkippedFile>,
}

/// 离线保存的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SaveOutcome {
    Saved,
    /// 已经保存过，本次不做任何修改
    AlreadySaved,
    /// 本地存储不可用，保存功能被禁用
    StorageUnavailable,
}

/// 书库
///
/// 组合书籍存储、导入器、阅读会话和通知。
/// 存储打不开时仍可使用，只是导入的书籍只保留在内存中且无法离线保存
pub struct Library {
    config: LibraryConfig,
    store: Option<BookStore>,
    books: Vec<Book>,
    saved: Vec<i64>,
    session: ReaderSession,
    notifier: Arc<dyn Notifier>,
}

impl Library {
    /// 按配置打开书库
    pub fn open(config: &ReaderConfig, notifier: Arc<dyn Notifier>) -> Self {
        let store = match BookStore::open(&config.storage.database_path) {
            Ok(store) => Some(store),
            Err(e) => {
                warn!(
                    path = %config.storage.database_path.display(),
                    error = %e,
                    "无法打开数据库，离线保存功能不可用"
                );
                None
            }
        };
        Self::with_store(config.library.clone(), store, notifier)
    }

    /// 使用给定的存储创建书库，并载入已有的书籍和保存标记
    pub fn with_store(
        config: LibraryConfig,
        store: Option<BookStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (books, saved) = match &store {
            Some(store) => {
                let books = store.get_all_books().unwrap_or_else(|e| {
                    warn!(error = %e, "载入书籍失败");
                    Vec::new()
                });
                let saved = store
                    .get_all_saved()
                    .map(|markers| markers.into_iter().map(|m| m.id).collect::<Vec<i64>>())
                    .unwrap_or_else(|e| {
                        warn!(error = %e, "载入保存标记失败");
                        Vec::new()
                    });
                (books, saved)
            }
            None => (Vec::new(), Vec::new()),
        };

        Self {
            config,
            store,
            books,
            saved,
            session: ReaderSession::new(),
            notifier,
        }
    }

    pub fn has_storage(&self) -> bool {
        self.store.is_some()
    }

    pub fn session(&self) -> &ReaderSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ReaderSession {
        &mut self.session
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn book(&self, id: i64) -> Option<&Book> {
        self.books.iter().find(|b| b.id == id)
    }

    fn notify(&self, notice: Notice) {
        self.notifier.notify(notice);
    }

    /// 新书籍 id：当前毫秒时间戳，已被占用时顺延
    fn next_book_id(&self) -> i64 {
        let mut id = Utc::now().timestamp_millis();
        while self.book(id).is_some() {
            id += 1;
        }
        id
    }

    // ==================== 导入 ====================

    /// 导入目录中选中的文件为一本新书
    ///
    /// 离线时拒绝导入；无法解码的文件会逐个提示并跳过
    pub fn import_directory(&mut self, files: Vec<ImportFile>) -> Result<ImportReport> {
        if self.session.is_offline() {
            self.notify(Notice::OfflineUploadBlocked);
            return Err(ReaderError::Offline);
        }

        let book_id = self.next_book_id();
        let outcome = match BookImporter::new(&self.config).assemble(book_id, files) {
            Ok(outcome) => outcome,
            Err(ReaderError::NoTextFiles) => {
                self.notify(Notice::NoTextFiles);
                return Err(ReaderError::NoTextFiles);
            }
            Err(e) => return Err(e),
        };

        for skipped in &outcome.skipped {
            self.notify(Notice::FileSkipped {
                name: skipped.name.clone(),
                reason: skipped.reason.clone(),
            });
        }

        let book = outcome.book;
        if let Some(store) = self.store.as_mut() {
            if let Err(e) = store.put_book(&book) {
                warn!(book_id, error = %e, "书籍写入数据库失败，仅保留在内存中");
            }
        }

        let chapters = book.chapters.len();
        info!(book_id, chapters, skipped = outcome.skipped.len(), "导入完成");

        self.books.push(book);
        self.session.select_book(book_id);
        self.notify(Notice::ImportCompleted { book_id, chapters });

        Ok(ImportReport {
            book_id,
            chapters,
            skipped: outcome.skipped,
        })
    }

    // ==================== 阅读 ====================

    /// 打开章节，同时更新会话中的选择
    pub fn open_chapter(&mut self, book_id: i64, chapter_id: u32) -> Result<&Chapter> {
        let index = self
            .books
            .iter()
            .position(|b| b.id == book_id)
            .ok_or(ReaderError::BookNotFound(book_id))?;
        if self.books[index].chapter(chapter_id).is_none() {
            return Err(ReaderError::ChapterNotFound(chapter_id));
        }

        if self.session.selected_book() != Some(book_id) {
            self.session.select_book(book_id);
        }
        self.session.select_chapter(chapter_id);

        self.books[index]
            .chapter(chapter_id)
            .ok_or(ReaderError::ChapterNotFound(chapter_id))
    }

    pub fn rename_book(&mut self, book_id: i64, title: &str) -> Result<()> {
        let book = self
            .books
            .iter_mut()
            .find(|b| b.id == book_id)
            .ok_or(ReaderError::BookNotFound(book_id))?;

        if let Some(store) = &self.store {
            store.update_title(book_id, title)?;
        }
        book.title = title.to_string();
        Ok(())
    }

    // ==================== 离线保存 ====================

    /// 标记书籍为离线可用
    ///
    /// 重复保存不做修改，只给出提示
    pub fn save_book(&mut self, book_id: i64) -> Result<SaveOutcome> {
        if self.book(book_id).is_none() {
            return Err(ReaderError::BookNotFound(book_id));
        }

        if self.saved.contains(&book_id) {
            self.notify(Notice::AlreadySaved { book_id });
            return Ok(SaveOutcome::AlreadySaved);
        }

        let Some(store) = &self.store else {
            self.notify(Notice::StorageUnavailable);
            return Ok(SaveOutcome::StorageUnavailable);
        };

        store.put_saved(book_id)?;
        self.saved.push(book_id);
        info!(book_id, "书籍已离线保存");
        self.notify(Notice::BookSaved { book_id });
        Ok(SaveOutcome::Saved)
    }

    pub fn is_saved(&self, book_id: i64) -> bool {
        self.saved.contains(&book_id)
    }

    /// 已保存的书籍；找不到对应书籍的标记不显示
    pub fn saved_books(&self) -> Vec<&Book> {
        self.saved.iter().filter_map(|id| self.book(*id)).collect()
    }

    // ==================== 删除（口令确认） ====================

    fn check_password(&self, credential: &str) -> Result<()> {
        if credential != self.config.delete_password {
            warn!("删除口令不正确");
            self.notify(Notice::WrongPassword);
            return Err(ReaderError::WrongPassword);
        }
        Ok(())
    }

    /// 移除离线保存标记，书籍本身保留
    pub fn remove_saved_book(&mut self, book_id: i64, credential: &str) -> Result<()> {
        self.check_password(credential)?;

        if let Some(store) = &self.store {
            store.delete_saved(book_id)?;
        }
        self.saved.retain(|id| *id != book_id);
        info!(book_id, "已移除离线保存标记");
        self.notify(Notice::SavedBookRemoved { book_id });
        Ok(())
    }

    /// 删除书籍及其保存标记
    pub fn delete_book(&mut self, book_id: i64, credential: &str) -> Result<()> {
        self.check_password(credential)?;
        if self.book(book_id).is_none() {
            return Err(ReaderError::BookNotFound(book_id));
        }

        if let Some(store) = self.store.as_mut() {
            store.delete_book_and_marker(book_id)?;
        }
        self.books.retain(|b| b.id != book_id);
        self.saved.retain(|id| *id != book_id);
        self.session.forget_book(book_id);
        info!(book_id, "书籍已删除");
        self.notify(Notice::BookDeleted { book_id });
        Ok(())
    }
}
