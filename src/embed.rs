use std::time::Duration;

use log::debug;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::config::ProviderOptions;
use crate::error::{Error, Result};

/// 嵌入服务的响应体
#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

/// 嵌入服务客户端
///
/// 进程启动时创建一次，所有请求共享同一个连接池。
/// 每次调用带固定超时；超时、非成功状态或批次长度不一致都视为整批失败，
/// 绝不返回比输入短的结果
pub struct EmbedClient {
    client: reqwest::Client,
    base_url: String,
}

impl EmbedClient {
    pub fn new(opts: &ProviderOptions) -> Result<Self> {
        let client =
            reqwest::Client::builder().timeout(Duration::from_secs(opts.embed_timeout)).build()?;
        Ok(Self { client, base_url: opts.embed_url.trim_end_matches('/').to_string() })
    }

    /// 批量嵌入文本，输出与输入等长且顺序一致
    pub async fn embed_text(&self, input: &[String]) -> Result<Vec<Vec<f32>>> {
        debug!("嵌入 {} 条文本", input.len());
        let response = self
            .client
            .post(format!("{}/embed/text", self.base_url))
            .json(&serde_json::json!({ "input": input }))
            .send()
            .await?;
        Self::parse_response(response, input.len()).await
    }

    /// 批量嵌入图片，输出与输入等长且顺序一致
    pub async fn embed_image(&self, files: &[(String, Vec<u8>)]) -> Result<Vec<Vec<f32>>> {
        debug!("嵌入 {} 张图片", files.len());
        let mut form = Form::new();
        for (name, data) in files {
            form = form.part("files", Part::bytes(data.clone()).file_name(name.clone()));
        }
        let response = self
            .client
            .post(format!("{}/embed/image", self.base_url))
            .multipart(form)
            .send()
            .await?;
        Self::parse_response(response, files.len()).await
    }

    async fn parse_response(response: reqwest::Response, expected: usize) -> Result<Vec<Vec<f32>>> {
        if !response.status().is_success() {
            return Err(Error::Upstream(format!("嵌入服务返回 {}", response.status())));
        }
        let body: EmbeddingResponse = response.json().await?;
        // 长度不一致说明上游静默丢弃了部分结果，必须整批报错
        if body.embeddings.len() != expected {
            return Err(Error::Upstream(format!(
                "嵌入结果数量不一致：期望 {expected}，实际 {}",
                body.embeddings.len()
            )));
        }
        Ok(body.embeddings)
    }
}
