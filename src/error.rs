use std::io;

/// 错误分类
///
/// 所有错误都原样上抛给调用方，子系统内部不做任何重试
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 搜索记录不存在，或对空的向量存储执行搜索
    #[error("未找到：{0}")]
    NotFound(String),
    /// 嵌入服务超时或返回非成功状态
    #[error("嵌入服务不可用：{0}")]
    Upstream(String),
    /// 请求数据不合法
    #[error("参数无效：{0}")]
    Validation(String),
    /// 磁盘或索引 IO 失败
    #[error("存储错误：{0}")]
    Storage(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Self::NotFound("记录不存在".to_string()),
            e => Self::Storage(e.to_string()),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Upstream(e.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Self::Storage(e.to_string())
    }
}
