use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::db;
use crate::error::{ReaderError, Result};

/// 书籍
///
/// `id` 为创建时的毫秒时间戳
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub chapters: Vec<Chapter>,
}

/// 章节
///
/// `id` 为书内从 1 开始的序号，创建后不再修改
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Chapter {
    pub id: u32,
    pub title: String,
    pub content: String,
}

/// 已保存（离线可用）标记
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SavedBookMarker {
    pub id: i64,
    pub saved_at: DateTime<Utc>,
}

impl Book {
    pub fn chapter(&self, id: u32) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id == id)
    }
}

/// 书籍存储
///
/// 对应两个按 id 索引的存储：书籍（含章节）与已保存标记
pub struct BookStore {
    conn: Connection,
}

impl BookStore {
    pub fn new(conn: Connection) -> Result<Self> {
        db::apply_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = db::init_db(path)?;
        Ok(Self { conn })
    }

    // ==================== Book CRUD 操作 ====================

    /// 写入书籍，已存在则整体替换（含章节列表）
    pub fn put_book(&mut self, book: &Book) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO books (id, title, author, genre, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                author = excluded.author,
                genre = excluded.genre",
            params![book.id, book.title, book.author, book.genre, Utc::now()],
        )?;

        tx.execute("DELETE FROM chapters WHERE book_id = ?1", [book.id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO chapters (book_id, id, title, content) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for chapter in &book.chapters {
                stmt.execute(params![book.id, chapter.id, chapter.title, chapter.content])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    pub fn get_book(&self, id: i64) -> Result<Option<Book>> {
        let header = self
            .conn
            .query_row(
                "SELECT id, title, author, genre FROM books WHERE id = ?1",
                [id],
                |row| {
                    Ok(Book {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        author: row.get(2)?,
                        genre: row.get(3)?,
                        chapters: Vec::new(),
                    })
                },
            )
            .optional()?;

        match header {
            Some(mut book) => {
                book.chapters = self.get_chapters(id)?;
                Ok(Some(book))
            }
            None => Ok(None),
        }
    }

    /// 获取所有书籍，按 id 升序
    pub fn get_all_books(&self) -> Result<Vec<Book>> {
        let ids: Vec<i64> = {
            let mut stmt = self.conn.prepare("SELECT id FROM books ORDER BY id")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut books = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(book) = self.get_book(id)? {
                books.push(book);
            }
        }
        Ok(books)
    }

    fn get_chapters(&self, book_id: i64) -> Result<Vec<Chapter>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, content FROM chapters WHERE book_id = ?1 ORDER BY id",
        )?;

        let chapters = stmt
            .query_map([book_id], |row| {
                Ok(Chapter {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    content: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(chapters)
    }

    pub fn update_title(&self, id: i64, title: &str) -> Result<()> {
        let changed = self
            .conn
            .execute("UPDATE books SET title = ?1 WHERE id = ?2", params![title, id])?;
        if changed == 0 {
            return Err(ReaderError::BookNotFound(id));
        }
        Ok(())
    }

    /// 删除书籍及其章节，返回是否存在
    pub fn delete_book(&mut self, id: i64) -> Result<bool> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM chapters WHERE book_id = ?1", [id])?;
        let removed = tx.execute("DELETE FROM books WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    /// 在同一事务中删除书籍、章节和保存标记，返回书籍是否存在
    pub fn delete_book_and_marker(&mut self, id: i64) -> Result<bool> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM chapters WHERE book_id = ?1", [id])?;
        let removed = tx.execute("DELETE FROM books WHERE id = ?1", [id])?;
        tx.execute("DELETE FROM saved_books WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    // ==================== 已保存标记 ====================

    pub fn put_saved(&self, id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO saved_books (id, saved_at) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET saved_at = excluded.saved_at",
            params![id, Utc::now()],
        )?;
        Ok(())
    }

    pub fn is_saved(&self, id: i64) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT id FROM saved_books WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    /// 全部保存标记，按保存时间先后排列
    pub fn get_all_saved(&self) -> Result<Vec<SavedBookMarker>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, saved_at FROM saved_books ORDER BY saved_at, id")?;
        let markers = stmt
            .query_map([], |row| {
                Ok(SavedBookMarker {
                    id: row.get(0)?,
                    saved_at: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(markers)
    }

    pub fn delete_saved(&self, id: i64) -> Result<bool> {
        let removed = self.conn.execute("DELETE FROM saved_books WHERE id = ?1", [id])?;
        Ok(removed > 0)
    }
}
