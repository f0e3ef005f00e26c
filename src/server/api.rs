use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum_typed_multipart::TypedMultipart;
use log::info;
use uuid::Uuid;

use super::error::{AppError, Result};
use super::state::AppState;
use super::types::{ImageResponse, SearchCreate, SearchUpdate, UploadForm, UploadRequest};
use crate::db::{SearchRecord, crud};
use crate::error::Error;
use crate::{ingest, metrics};

/// 用文本搜索最相似的图片，并创建一条搜索记录
#[utoipa::path(
    post,
    path = "/search",
    request_body = SearchCreate,
    responses(
        (status = 200, description = "搜索成功", body = SearchRecord),
        (status = 404, description = "向量存储为空"),
        (status = 422, description = "查询为空"),
        (status = 503, description = "嵌入服务不可用"),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SearchCreate>,
) -> Result<Json<SearchRecord>> {
    let query = body.query.trim();
    if query.is_empty() {
        return Err(AppError(Error::Validation("查询不能为空".to_string())));
    }

    let start = Instant::now();
    let vectors = state.embed.embed_text(&[query.to_string()]).await?;
    let Some(vector) = vectors.into_iter().next() else {
        return Err(AppError(Error::Upstream("嵌入服务返回空结果".to_string())));
    };
    let hits = state.store.search(&vector, 1).await?;
    let Some(hit) = hits.into_iter().next() else {
        return Err(AppError(Error::NotFound("没有搜索结果".to_string())));
    };

    let record = crud::create_search(&state.db, query, &hit.uri).await?;
    metrics::observe_search(start.elapsed().as_secs_f64());
    info!("搜索 {:?} 命中 {}，得分 {:.4}", query, hit.uri, hit.score);
    Ok(Json(record))
}

/// 为一条搜索记录提交好/坏反馈
#[utoipa::path(
    patch,
    path = "/search/{id}",
    request_body = SearchUpdate,
    params(("id" = Uuid, Path, description = "搜索记录 ID")),
    responses(
        (status = 200, description = "更新成功", body = SearchRecord),
        (status = 404, description = "记录不存在"),
    )
)]
pub async fn update_search_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<SearchUpdate>,
) -> Result<Json<SearchRecord>> {
    let record = crud::update_feedback(&state.db, &id, body.is_good)
        .await?
        .ok_or(AppError(Error::NotFound(format!("搜索记录 {id} 不存在"))))?;
    Ok(Json(record))
}

/// 按 URI 读取图片内容
#[utoipa::path(
    get,
    path = "/images/{uri}",
    params(("uri" = String, Path, description = "图片 URI")),
    responses(
        (status = 200, description = "图片内容", content_type = "application/octet-stream"),
        (status = 404, description = "图片不存在"),
    )
)]
pub async fn get_image_handler(Path(uri): Path<String>) -> Result<impl IntoResponse> {
    let path = ingest::uri_to_path(&uri)?;
    let data = tokio::fs::read(&path)
        .await
        .map_err(|_| AppError(Error::NotFound(format!("图片不存在：{uri}"))))?;
    Ok(([(CONTENT_TYPE, "application/octet-stream")], data))
}

/// 上传图片：保存到图片目录并立即写入向量存储，无需重建索引即可被搜索到
#[utoipa::path(
    post,
    path = "/images",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "上传成功", body = ImageResponse),
        (status = 422, description = "缺少文件名"),
        (status = 503, description = "嵌入服务不可用"),
    )
)]
pub async fn upload_image_handler(
    State(state): State<Arc<AppState>>,
    TypedMultipart(upload): TypedMultipart<UploadRequest>,
) -> Result<impl IntoResponse> {
    let Some(name) = upload.image.metadata.file_name.clone() else {
        return Err(AppError(Error::Validation("文件名不能为空".to_string())));
    };
    ingest::validate_filename(&name)?;
    let data = upload.image.contents.to_vec();

    tokio::fs::create_dir_all(&state.image.image_dir).await?;
    let path = state.image.image_dir.join(&name);
    tokio::fs::write(&path, &data).await?;
    let uri = ingest::path_to_uri(&path)?;

    let vectors = state.embed.embed_image(&[(name, data)]).await?;
    let Some(vector) = vectors.into_iter().next() else {
        return Err(AppError(Error::Upstream("嵌入服务返回空结果".to_string())));
    };
    state.store.append(&[(uri.clone(), vector)]).await?;
    info!("上传图片：{uri}");
    Ok((StatusCode::CREATED, Json(ImageResponse { uri })))
}

/// Prometheus 指标
pub async fn metrics_handler() -> String {
    metrics::gather()
}
