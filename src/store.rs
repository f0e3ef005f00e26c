use std::path::PathBuf;

use bytemuck::{cast_slice, pod_collect_to_vec};
use log::{debug, info};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tokio::sync::{Mutex, RwLock};

use crate::config::{AnnOptions, StoreOptions};
use crate::error::{Error, Result};
use crate::ivf::{IvfPq, Metric};
use crate::kmeans;

/// 入库向量允许的 L2 范数偏差
const NORM_TOLERANCE: f32 = 1e-3;

/// 搜索结果
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// 得分：dot 为相似度（越大越好），l2 为距离（越小越好）
    pub score: f32,
    /// 图片 URI
    pub uri: String,
}

/// 向量存储
///
/// 行数据保存在 sqlite 中，是唯一的事实来源；IVF-PQ 索引只是派生的加速结构。
/// 新追加的行以 indexed = 0 标记，搜索时对这些行做精确线性扫描，
/// 与索引结果合并后返回，保证 append 之后立即可见（read-your-write），
/// 直到下一次 rebuild 把它们纳入索引
pub struct VectorStore {
    pool: SqlitePool,
    table: String,
    index_file: PathBuf,
    dim: usize,
    metric: Metric,
    ann: AnnOptions,
    /// 内存中的当前索引，rebuild 时整体替换
    index: RwLock<Option<IvfPq>>,
    /// 禁止并发重建
    rebuild_lock: Mutex<()>,
}

impl VectorStore {
    /// 打开或创建向量存储
    ///
    /// 幂等：表已存在时校验维数与度量方式，不兼容则报错
    pub async fn open(store: &StoreOptions, ann: &AnnOptions) -> Result<Self> {
        std::fs::create_dir_all(&store.store_path)?;
        let file = store.table_file();
        info!("打开向量存储：{}", file.display());

        let options = SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .filename(&file)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        let table = store.table_name.clone();
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{table}" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uri TEXT NOT NULL,
                vector BLOB NOT NULL,
                indexed INTEGER NOT NULL DEFAULT 0
            )
            "#
        ))
        .execute(&pool)
        .await?;
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{table}_meta" (
                dimension INTEGER NOT NULL,
                metric TEXT NOT NULL
            )
            "#
        ))
        .execute(&pool)
        .await?;

        // 校验或写入元信息
        let meta = sqlx::query(&format!(r#"SELECT dimension, metric FROM "{table}_meta""#))
            .fetch_optional(&pool)
            .await?;
        match meta {
            Some(row) => {
                let dimension: i64 = row.get("dimension");
                let metric: String = row.get("metric");
                if dimension as usize != store.dimension || Metric::parse(&metric)? != ann.metric {
                    return Err(Error::Storage(format!(
                        "表 {table} 已存在且模式不兼容：dimension={dimension} metric={metric}"
                    )));
                }
            }
            None => {
                sqlx::query(&format!(
                    r#"INSERT INTO "{table}_meta" (dimension, metric) VALUES (?, ?)"#
                ))
                .bind(store.dimension as i64)
                .bind(ann.metric.as_str())
                .execute(&pool)
                .await?;
            }
        }

        // 加载已有的索引文件
        let index_file = store.index_file();
        let index = match index_file.exists() {
            true => {
                let index = IvfPq::load(&index_file)?;
                debug!("加载索引：{} 条向量，{} 个分区", index.ntotal(), index.nlist());
                Some(index)
            }
            false => None,
        };

        Ok(Self {
            pool,
            table,
            index_file,
            dim: store.dimension,
            metric: ann.metric,
            ann: ann.clone(),
            index: RwLock::new(index),
            rebuild_lock: Mutex::new(()),
        })
    }

    /// 当前行数
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query(&format!(r#"SELECT COUNT(*) AS count FROM "{}""#, self.table))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }

    /// 批量追加 (uri, vector)，整批一个事务，要么全部成功要么全部失败
    ///
    /// 向量必须是 dim 维单位向量（L2 范数与 1.0 偏差不超过 1e-3），
    /// 否则整批拒绝——点积与余弦相似度的等价性依赖这一不变量
    pub async fn append(&self, rows: &[(String, Vec<f32>)]) -> Result<()> {
        for (uri, vector) in rows {
            if vector.len() != self.dim {
                return Err(Error::Validation(format!(
                    "{uri} 的向量维数 {} 与存储维数 {} 不一致",
                    vector.len(),
                    self.dim
                )));
            }
            let norm = kmeans::dot(vector, vector).sqrt();
            if (norm - 1.0).abs() > NORM_TOLERANCE {
                return Err(Error::Validation(format!("{uri} 的向量未单位化：范数 {norm}")));
            }
        }

        let mut tx = self.pool.begin().await?;
        for (uri, vector) in rows {
            sqlx::query(&format!(
                r#"INSERT INTO "{}" (uri, vector, indexed) VALUES (?, ?, 0)"#,
                self.table
            ))
            .bind(uri)
            .bind(cast_slice::<f32, u8>(vector))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!("追加 {} 条向量", rows.len());
        Ok(())
    }

    /// 搜索 k 个近邻
    ///
    /// 约定：dot 按相似度从大到小返回，l2 按距离从小到大返回；
    /// 得分相同时按插入顺序（id 较小者在前）。
    /// 索引给出的候选会按存储中的原始向量精确重排，
    /// 未索引的行经精确扫描后合并进结果。
    /// 存储为空时返回 NotFound，行数不足 k 时返回全部
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dim {
            return Err(Error::Validation(format!(
                "查询向量维数 {} 与存储维数 {} 不一致",
                query.len(),
                self.dim
            )));
        }
        if self.count().await? == 0 {
            return Err(Error::NotFound("向量存储为空".to_string()));
        }

        // 索引候选，取 k 的数倍作为精确重排的余量
        let mut candidates: Vec<(i64, f32, String)> = vec![];
        if let Some(index) = self.index.read().await.as_ref() {
            let neighbors = index.search(query, k.saturating_mul(4), self.ann.nprobe);
            let ids: Vec<i64> = neighbors.iter().map(|n| n.id).collect();
            for (id, vector, uri) in self.fetch_rows(&ids).await? {
                candidates.push((id, self.metric.score(query, &vector), uri));
            }
        }

        // 精确扫描尚未进入索引的行
        let rows = sqlx::query(&format!(
            r#"SELECT id, uri, vector FROM "{}" WHERE indexed = 0 ORDER BY id"#,
            self.table
        ))
        .fetch_all(&self.pool)
        .await?;
        for row in &rows {
            let id: i64 = row.get("id");
            let vector: Vec<f32> = pod_collect_to_vec(row.get::<&[u8], _>("vector"));
            candidates.push((id, self.metric.score(query, &vector), row.get("uri")));
        }

        // rebuild 换入新索引和标记行之间存在窗口，
        // 同一行可能同时出现在索引候选和未索引扫描里，按 id 去重
        candidates.sort_by_key(|c| c.0);
        candidates.dedup_by_key(|c| c.0);

        candidates.sort_by(|a, b| match self.metric {
            Metric::Dot => b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)),
            Metric::L2 => a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)),
        });
        candidates.truncate(k);
        Ok(candidates.into_iter().map(|(_, score, uri)| SearchHit { score, uri }).collect())
    }

    /// 从当前全部行重建索引
    ///
    /// 索引整体替换：读者要么看到旧索引要么看到新索引，不会看到半成品。
    /// 同一时间只允许一个 rebuild，但可以与读写并发。
    /// 空存储直接返回，不算错误
    pub async fn rebuild(&self) -> Result<()> {
        let _guard = self.rebuild_lock.lock().await;

        let rows = sqlx::query(&format!(r#"SELECT id, vector FROM "{}" ORDER BY id"#, self.table))
            .fetch_all(&self.pool)
            .await?;
        if rows.is_empty() {
            info!("向量存储为空，跳过索引构建");
            return Ok(());
        }

        let mut ids = Vec::with_capacity(rows.len());
        let mut data = Vec::with_capacity(rows.len() * self.dim);
        for row in &rows {
            ids.push(row.get::<i64, _>("id"));
            let vector: Vec<f32> = pod_collect_to_vec(row.get::<&[u8], _>("vector"));
            data.extend_from_slice(&vector);
        }
        let max_id = ids[ids.len() - 1];

        info!("重建索引：{} 条向量", ids.len());
        let mut index = IvfPq::train(
            self.metric,
            self.dim,
            self.ann.num_partitions,
            self.ann.num_sub_vectors,
            &data,
        )?;
        index.add(&ids, &data);
        index.save(&self.index_file)?;

        // 先换入新索引再标记行，窗口期的重复候选由 search 去重；
        // 反过来会出现行既不在索引中也不被扫描的空洞
        *self.index.write().await = Some(index);
        sqlx::query(&format!(r#"UPDATE "{}" SET indexed = 1 WHERE id <= ?"#, self.table))
            .bind(max_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// 清空全部行并丢弃索引，用于全量覆盖式导入
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.rebuild_lock.lock().await;
        sqlx::query(&format!(r#"DELETE FROM "{}""#, self.table)).execute(&self.pool).await?;
        *self.index.write().await = None;
        if self.index_file.exists() {
            std::fs::remove_file(&self.index_file)?;
        }
        Ok(())
    }

    async fn fetch_rows(&self, ids: &[i64]) -> Result<Vec<(i64, Vec<f32>, String)>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        let sql =
            format!(r#"SELECT id, uri, vector FROM "{}" WHERE id IN ({placeholders})"#, self.table);
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(|row| {
                let vector = pod_collect_to_vec(row.get::<&[u8], _>("vector"));
                (row.get("id"), vector, row.get("uri"))
            })
            .collect())
    }
}
