use rusqlite::{Connection, Result};
use std::path::Path;

/// 当前数据库结构版本
pub const SCHEMA_VERSION: i32 = 2;

pub fn init_db<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open(path)?;
    apply_schema(&conn)?;
    Ok(conn)
}

/// 在已有连接上建表（幂等）
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute("PRAGMA encoding = 'UTF-8'", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            author TEXT NOT NULL,
            genre TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS chapters (
            book_id INTEGER NOT NULL,
            id INTEGER NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            PRIMARY KEY (book_id, id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS saved_books (
            id INTEGER PRIMARY KEY,
            saved_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS asset_cache (
            cache_name TEXT NOT NULL,
            url TEXT NOT NULL,
            status INTEGER NOT NULL,
            kind TEXT NOT NULL,
            headers TEXT NOT NULL,
            body BLOB NOT NULL,
            stored_at TEXT NOT NULL,
            PRIMARY KEY (cache_name, url)
        )",
        [],
    )?;

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

    Ok(())
}
