use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::book_store::{Book, Chapter};
use crate::config::LibraryConfig;
use crate::error::{ReaderError, Result};

pub mod file_order;
pub mod txt_decoder;

pub use file_order::{chapter_number, is_text_file, order_text_files};
pub use txt_decoder::decode_text;

/// 文件内容来源
#[derive(Debug, Clone)]
enum FileSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// 待导入的单个文件
///
/// 对应用户在目录选择器中选中的一项
#[derive(Debug, Clone)]
pub struct ImportFile {
    /// 文件名（不含目录）
    pub name: String,
    source: FileSource,
}

impl ImportFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            source: FileSource::Path(path),
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            source: FileSource::Bytes(bytes),
        }
    }

    /// 递归收集目录下的全部普通文件
    pub fn collect_dir(dir: &Path) -> Result<Vec<ImportFile>> {
        let mut files = Vec::new();
        collect_into(dir, &mut files)?;
        Ok(files)
    }

    fn read_bytes(&self) -> Result<Vec<u8>> {
        match &self.source {
            FileSource::Path(path) => Ok(fs::read(path)?),
            FileSource::Bytes(bytes) => Ok(bytes.clone()),
        }
    }

    fn read_text(&self) -> Result<String> {
        decode_text(&self.read_bytes()?)
    }
}

fn collect_into(dir: &Path, files: &mut Vec<ImportFile>) -> Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_into(&path, files)?;
        } else if file_type.is_file() {
            files.push(ImportFile::from_path(path));
        }
    }
    Ok(())
}

/// 导入时被跳过的文件
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

/// 目录导入结果
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub book: Book,
    pub skipped: Vec<SkippedFile>,
}

/// 由文件名生成章节标题
pub fn chapter_title(number: u32, file_name: &str) -> String {
    let stem = file_name
        .get(..file_name.len().saturating_sub(".txt".len()))
        .filter(|_| is_text_file(file_name))
        .unwrap_or(file_name);
    format!("第{}章: {}", number, stem)
}

/// 书籍导入器
///
/// 将一组文件组装为一本书：过滤 .txt、按文件名中的数字排序、逐个解码。
/// 单个文件失败只会被跳过并记录，不影响其余文件
pub struct BookImporter<'a> {
    defaults: &'a LibraryConfig,
}

impl<'a> BookImporter<'a> {
    pub fn new(defaults: &'a LibraryConfig) -> Self {
        Self { defaults }
    }

    /// 组装书籍
    ///
    /// # 参数
    /// - `book_id`: 新书籍的 id
    /// - `files`: 用户选择的全部文件
    ///
    /// # 返回
    /// 没有任何 .txt 文件时返回 `NoTextFiles`
    pub fn assemble(&self, book_id: i64, files: Vec<ImportFile>) -> Result<ImportOutcome> {
        let txt_files = order_text_files(files);
        if txt_files.is_empty() {
            return Err(ReaderError::NoTextFiles);
        }

        let mut book = Book {
            id: book_id,
            title: self.defaults.default_title.clone(),
            author: self.defaults.default_author.clone(),
            genre: self.defaults.default_genre.clone(),
            chapters: Vec::with_capacity(txt_files.len()),
        };
        let mut skipped = Vec::new();

        for file in &txt_files {
            match file.read_text() {
                Ok(content) => {
                    let id = book.chapters.len() as u32 + 1;
                    debug!(file = %file.name, chapter = id, "读取章节");
                    book.chapters.push(Chapter {
                        id,
                        title: chapter_title(id, &file.name),
                        content,
                    });
                }
                Err(e) => {
                    warn!(file = %file.name, error = %e, "跳过无法读取的文件");
                    skipped.push(SkippedFile {
                        name: file.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(ImportOutcome { book, skipped })
    }
}
