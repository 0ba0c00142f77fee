use serde::{Deserialize, Serialize};

use crate::book_store::Book;

pub const MIN_FONT_SIZE: u32 = 12;
pub const MAX_FONT_SIZE: u32 = 24;
pub const DEFAULT_FONT_SIZE: u32 = 16;
const FONT_STEP: u32 = 2;

/// 正文字号，限定在 [12, 24] 之间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontSize(u32);

impl FontSize {
    pub fn new(px: u32) -> Self {
        Self(px.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE))
    }

    pub fn px(self) -> u32 {
        self.0
    }

    pub fn increase(self) -> Self {
        Self::new(self.0 + FONT_STEP)
    }

    pub fn decrease(self) -> Self {
        Self::new(self.0.saturating_sub(FONT_STEP))
    }
}

impl Default for FontSize {
    fn default() -> Self {
        Self(DEFAULT_FONT_SIZE)
    }
}

/// 阅读会话
///
/// 保存当前选中的书籍与章节、字号以及网络状态
#[derive(Debug, Clone, Default)]
pub struct ReaderSession {
    selected_book: Option<i64>,
    selected_chapter: Option<u32>,
    font_size: FontSize,
    offline: bool,
}

impl ReaderSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_book(&self) -> Option<i64> {
        self.selected_book
    }

    pub fn selected_chapter(&self) -> Option<u32> {
        self.selected_chapter
    }

    /// 选中书籍，同时清除已选章节
    pub fn select_book(&mut self, book_id: i64) {
        self.selected_book = Some(book_id);
        self.selected_chapter = None;
    }

    pub fn select_chapter(&mut self, chapter_id: u32) {
        self.selected_chapter = Some(chapter_id);
    }

    /// 返回章节列表
    pub fn close_chapter(&mut self) {
        self.selected_chapter = None;
    }

    /// 书籍被删除时清理选择
    pub fn forget_book(&mut self, book_id: i64) {
        if self.selected_book == Some(book_id) {
            self.selected_book = None;
            self.selected_chapter = None;
        }
    }

    /// 跳到下一章，已是最后一章时返回 None 且不改变选择
    pub fn next_chapter(&mut self, book: &Book) -> Option<u32> {
        let current = self.current_position(book)?;
        let next = book.chapters.get(current + 1)?.id;
        self.selected_chapter = Some(next);
        Some(next)
    }

    /// 跳到上一章，已是第一章时返回 None 且不改变选择
    pub fn previous_chapter(&mut self, book: &Book) -> Option<u32> {
        let current = self.current_position(book)?;
        let prev = book.chapters.get(current.checked_sub(1)?)?.id;
        self.selected_chapter = Some(prev);
        Some(prev)
    }

    fn current_position(&self, book: &Book) -> Option<usize> {
        if self.selected_book != Some(book.id) {
            return None;
        }
        let chapter = self.selected_chapter?;
        book.chapters.iter().position(|c| c.id == chapter)
    }

    pub fn font_size(&self) -> FontSize {
        self.font_size
    }

    pub fn set_font_size(&mut self, size: FontSize) {
        self.font_size = size;
    }

    pub fn increase_font(&mut self) -> FontSize {
        self.font_size = self.font_size.increase();
        self.font_size
    }

    pub fn decrease_font(&mut self) -> FontSize {
        self.font_size = self.font_size.decrease();
        self.font_size
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book_store::Chapter;

    fn book(id: i64, chapters: u32) -> Book {
        Book {
            id,
            title: "t".to_string(),
            author: "a".to_string(),
            genre: "g".to_string(),
            chapters: (1..=chapters)
                .map(|i| Chapter {
                    id: i,
                    title: format!("第{}章", i),
                    content: String::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_font_size_clamps() {
        let mut session = ReaderSession::new();
        assert_eq!(session.font_size().px(), 16);

        for _ in 0..10 {
            session.increase_font();
        }
        assert_eq!(session.font_size().px(), MAX_FONT_SIZE);

        for _ in 0..10 {
            session.decrease_font();
        }
        assert_eq!(session.font_size().px(), MIN_FONT_SIZE);
    }

    #[test]
    fn test_font_size_new_clamps() {
        assert_eq!(FontSize::new(2).px(), 12);
        assert_eq!(FontSize::new(40).px(), 24);
        assert_eq!(FontSize::new(18).px(), 18);
    }

    #[test]
    fn test_select_book_clears_chapter() {
        let mut session = ReaderSession::new();
        session.select_book(1);
        session.select_chapter(3);
        session.select_book(2);
        assert_eq!(session.selected_book(), Some(2));
        assert_eq!(session.selected_chapter(), None);
    }

    #[test]
    fn test_chapter_navigation() {
        let book = book(1, 3);
        let mut session = ReaderSession::new();
        session.select_book(1);
        session.select_chapter(1);

        assert_eq!(session.previous_chapter(&book), None);
        assert_eq!(session.next_chapter(&book), Some(2));
        assert_eq!(session.next_chapter(&book), Some(3));
        assert_eq!(session.next_chapter(&book), None);
        assert_eq!(session.selected_chapter(), Some(3));
        assert_eq!(session.previous_chapter(&book), Some(2));
    }

    #[test]
    fn test_navigation_requires_selected_book() {
        let book = book(1, 3);
        let mut session = ReaderSession::new();
        session.select_book(2);
        session.select_chapter(1);
        assert_eq!(session.next_chapter(&book), None);
    }

    #[test]
    fn test_forget_book() {
        let mut session = ReaderSession::new();
        session.select_book(5);
        session.select_chapter(1);
        session.forget_book(6);
        assert_eq!(session.selected_book(), Some(5));
        session.forget_book(5);
        assert_eq!(session.selected_book(), None);
        assert_eq!(session.selected_chapter(), None);
    }

    #[test]
    fn test_offline_flag() {
        let mut session = ReaderSession::new();
        assert!(!session.is_offline());
        session.set_offline(true);
        assert!(session.is_offline());
    }
}
