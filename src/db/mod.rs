use std::path::Path;

use log::info;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};

pub mod crud;
pub mod model;

pub use model::*;

pub type Database = SqlitePool;

/// 初始化搜索记录数据库并执行迁移
pub async fn init_db(filename: &Path) -> Result<Database, sqlx::Error> {
    info!("初始化数据库连接：{}", filename.display());
    let options = SqliteConnectOptions::new()
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .filename(filename)
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;
    info!("检查数据库迁移");
    sqlx::migrate!().run(&pool).await?;
    Ok(pool)
}
