use chrono::Utc;
use reqwest::Url;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{AssetResponse, ResponseKind};
use crate::db;
use crate::error::{ReaderError, Result};

/// 按名称划分的响应缓存
///
/// 每个缓存名对应一组 url -> 响应 的条目，删除缓存即整体失效
pub struct CacheStorage {
    conn: Mutex<Connection>,
}

impl CacheStorage {
    pub fn new(conn: Connection) -> Result<Self> {
        db::apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::new(db::init_db(path)?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ReaderError::CacheLock(e.to_string()))
    }

    /// 查找请求地址对应的缓存响应
    ///
    /// 在所有缓存中查找，`preferred` 缓存中的条目优先
    pub fn lookup(&self, url: &Url, preferred: &str) -> Result<Option<AssetResponse>> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                "SELECT url, status, kind, headers, body FROM asset_cache
                 WHERE url = ?1
                 ORDER BY (cache_name = ?2) DESC, stored_at
                 LIMIT 1",
                params![cache_key(url), preferred],
                row_to_response,
            )
            .optional()?;
        Ok(found)
    }

    /// 只在指定缓存中查找
    pub fn get(&self, cache_name: &str, url: &Url) -> Result<Option<AssetResponse>> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                "SELECT url, status, kind, headers, body FROM asset_cache
                 WHERE cache_name = ?1 AND url = ?2",
                params![cache_name, cache_key(url)],
                row_to_response,
            )
            .optional()?;
        Ok(found)
    }

    /// 写入单个条目，以请求地址为键
    pub fn put(&self, cache_name: &str, request_url: &Url, response: &AssetResponse) -> Result<()> {
        let conn = self.lock()?;
        insert_entry(&conn, cache_name, request_url, response)
    }

    /// 在一个事务中写入全部条目，任一失败则全部不写入
    pub fn put_all(&self, cache_name: &str, entries: &[(Url, AssetResponse)]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for (url, response) in entries {
            insert_entry(&tx, cache_name, url, response)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// 现有的全部缓存名称
    pub fn cache_names(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT cache_name FROM asset_cache ORDER BY cache_name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    /// 删除整个缓存，返回是否有条目被删除
    pub fn delete_cache(&self, cache_name: &str) -> Result<bool> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM asset_cache WHERE cache_name = ?1", [cache_name])?;
        Ok(removed > 0)
    }

    pub fn entry_count(&self, cache_name: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM asset_cache WHERE cache_name = ?1",
            [cache_name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

/// 缓存键：去掉片段（`#...`）后的地址
fn cache_key(url: &Url) -> String {
    let mut key = url.clone();
    key.set_fragment(None);
    key.into()
}

fn insert_entry(
    conn: &Connection,
    cache_name: &str,
    request_url: &Url,
    response: &AssetResponse,
) -> Result<()> {
    let headers = serde_json::to_string(&response.headers)?;
    conn.execute(
        "INSERT OR REPLACE INTO asset_cache
            (cache_name, url, status, kind, headers, body, stored_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            cache_name,
            cache_key(request_url),
            response.status,
            response.kind.as_str(),
            headers,
            response.body,
            Utc::now()
        ],
    )?;
    Ok(())
}

fn row_to_response(row: &Row<'_>) -> rusqlite::Result<AssetResponse> {
    let url: String = row.get(0)?;
    let url = Url::parse(&url)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    let kind: String = row.get(2)?;
    let headers: String = row.get(3)?;
    let headers: Vec<(String, String)> = serde_json::from_str(&headers)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    Ok(AssetResponse {
        url,
        status: row.get(1)?,
        kind: ResponseKind::parse(&kind),
        headers,
        body: row.get(4)?,
    })
}
