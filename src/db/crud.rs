use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use super::{Database, SearchRecord};

fn record_from_row(row: &SqliteRow) -> sqlx::Result<SearchRecord> {
    let id: String = row.get("id");
    Ok(SearchRecord {
        id: Uuid::parse_str(&id).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        query: row.get("query"),
        image_uri: row.get("image_uri"),
        created_at: row.get("created_at"),
        is_good: row.get("is_good"),
    })
}

/// 创建搜索记录，is_good 初始为空
pub async fn create_search(
    pool: &Database,
    query: &str,
    image_uri: &str,
) -> sqlx::Result<SearchRecord> {
    let record = SearchRecord {
        id: Uuid::new_v4(),
        query: query.to_string(),
        image_uri: image_uri.to_string(),
        created_at: Utc::now(),
        is_good: None,
    };
    sqlx::query(
        "INSERT INTO search (id, query, image_uri, created_at, is_good) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(record.id.to_string())
    .bind(&record.query)
    .bind(&record.image_uri)
    .bind(record.created_at)
    .bind(record.is_good)
    .execute(pool)
    .await?;
    Ok(record)
}

/// 按 ID 查询搜索记录
pub async fn get_search(pool: &Database, id: &Uuid) -> sqlx::Result<Option<SearchRecord>> {
    let row = sqlx::query("SELECT * FROM search WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(record_from_row).transpose()
}

/// 更新搜索记录的反馈，记录不存在时返回 None
pub async fn update_feedback(
    pool: &Database,
    id: &Uuid,
    is_good: bool,
) -> sqlx::Result<Option<SearchRecord>> {
    let result = sqlx::query("UPDATE search SET is_good = ? WHERE id = ?")
        .bind(is_good)
        .bind(id.to_string())
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_search(pool, id).await
}
