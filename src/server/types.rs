use axum::body::Bytes;
use axum_typed_multipart::{FieldData, TryFromMultipart};
use serde::Deserialize;
use utoipa::ToSchema;

/// 创建搜索的请求体
#[derive(Deserialize, Debug, ToSchema)]
pub struct SearchCreate {
    /// 查询文本
    pub query: String,
}

/// 搜索反馈的请求体
#[derive(Deserialize, Debug, ToSchema)]
pub struct SearchUpdate {
    /// 结果是否符合预期
    pub is_good: bool,
}

#[derive(TryFromMultipart)]
pub struct UploadRequest {
    pub image: FieldData<Bytes>,
}

/// 上传接口的文档模型
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// 图片文件
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub image: String,
}

/// 上传成功后返回的图片信息
#[derive(serde::Serialize, Debug, ToSchema)]
pub struct ImageResponse {
    /// 图片 URI
    pub uri: String,
}
