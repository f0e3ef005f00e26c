use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use url::Url;
use walkdir::WalkDir;

use crate::embed::EmbedClient;
use crate::error::{Error, Result};
use crate::store::VectorStore;

/// 识别为图片的扩展名
const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp"];

/// 递归扫描图片目录，按文件名排序返回 (路径, file:// URI)
///
/// 目录不存在时返回空列表，不算错误
pub fn scan_images(root: &Path) -> Result<Vec<(PathBuf, String)>> {
    if !root.exists() {
        warn!("图片目录不存在：{}", root.display());
        return Ok(vec![]);
    }
    let mut images = vec![];
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Storage(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            let uri = path_to_uri(path)?;
            images.push((path.to_path_buf(), uri));
        }
    }
    Ok(images)
}

/// 把本地路径转换为 file:// URI，作为图片的稳定标识
pub fn path_to_uri(path: &Path) -> Result<String> {
    let path = path.canonicalize()?;
    let url = Url::from_file_path(&path)
        .map_err(|_| Error::Validation(format!("无法转换为 URI：{}", path.display())))?;
    Ok(url.to_string())
}

/// 校验上传的文件名可以安全地拼接到图片目录下
///
/// 拒绝空文件名、路径分隔符和父目录引用，防止写出图片目录之外
pub fn validate_filename(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(Error::Validation(format!("文件名不合法：{name}")));
    }
    Ok(())
}

/// 把 file:// URI 还原为本地路径
pub fn uri_to_path(uri: &str) -> Result<PathBuf> {
    let url = Url::parse(uri).map_err(|e| Error::Validation(format!("URI 无效：{e}")))?;
    url.to_file_path().map_err(|_| Error::Validation(format!("URI 不是本地文件：{uri}")))
}

/// 全量导入：扫描图片目录、批量嵌入、覆盖式写入向量存储并重建索引
///
/// 任一批次嵌入失败则整个导入中止，不做部分写入——
/// 批次内 URI 与向量按位置对应，缺一条就全错位了。
/// 返回导入的图片数量
pub async fn run(
    embed: &EmbedClient,
    store: &VectorStore,
    image_dir: &Path,
    batch_size: usize,
) -> Result<usize> {
    let images = scan_images(image_dir)?;
    if images.is_empty() {
        info!("{} 下没有图片", image_dir.display());
        store.clear().await?;
        return Ok(0);
    }
    info!("发现 {} 张图片，批次大小 {batch_size}", images.len());

    let pb = ProgressBar::new(images.len() as u64).with_style(
        ProgressStyle::with_template("{wide_bar} {pos}/{len} {msg}").expect("template error"),
    );

    // 先嵌入全部批次，全部成功后再一次性覆盖存储
    let mut rows = Vec::with_capacity(images.len());
    for batch in images.chunks(batch_size.max(1)) {
        let mut files = Vec::with_capacity(batch.len());
        for (path, _) in batch {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());
            files.push((name, tokio::fs::read(path).await?));
        }
        let embeddings = embed.embed_image(&files).await?;
        for ((_, uri), vector) in batch.iter().zip(embeddings) {
            rows.push((uri.clone(), vector));
        }
        pb.inc(batch.len() as u64);
    }
    pb.finish_with_message("嵌入完成");

    store.clear().await?;
    store.append(&rows).await?;
    store.rebuild().await?;
    info!("导入完成：{} 张图片", rows.len());
    Ok(rows.len())
}
