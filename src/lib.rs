// 本地 TXT 书籍阅读器
// 书籍与离线标记保存在 SQLite 中，静态资源通过缓存优先的离线缓存提供

pub mod asset_cache;
pub mod book_store;
pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod library;
pub mod notify;
pub mod session;

pub use book_store::{Book, BookStore, Chapter, SavedBookMarker};
pub use config::ReaderConfig;
pub use error::{ReaderError, Result};
pub use import::ImportFile;
pub use library::{ImportReport, Library, SaveOutcome};
pub use notify::{ConsoleNotifier, LogNotifier, Notice, Notifier};
pub use session::{FontSize, ReaderSession};
