use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// 一次搜索的记录
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct SearchRecord {
    /// 记录 ID
    pub id: Uuid,
    /// 查询文本
    pub query: String,
    /// 命中的图片 URI
    pub image_uri: String,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 用户反馈，None 表示尚未反馈
    pub is_good: Option<bool>,
}
