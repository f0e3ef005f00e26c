use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use semsearch::config::{AnnOptions, ProviderOptions, StoreOptions};
use semsearch::db::{self, crud};
use semsearch::embed::EmbedClient;
use semsearch::ivf::Metric;
use semsearch::{Error, VectorStore, ingest};
use tempfile::TempDir;

const D: usize = 8;

fn corner(i: usize) -> Vec<f32> {
    let a = 1.0 / (D as f32).sqrt();
    (0..D).map(|j| if (i >> (j / 2)) & 1 == 1 { -a } else { a }).collect()
}

/// 模拟嵌入服务：文本一律映射到 corner(1)，图片按文件名映射
async fn embed_text_stub(Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
    let n = body["input"].as_array().map_or(0, |a| a.len());
    let embeddings: Vec<Vec<f32>> = (0..n).map(|_| corner(1)).collect();
    Json(serde_json::json!({ "embeddings": embeddings }))
}

async fn embed_image_stub(mut multipart: Multipart) -> Json<serde_json::Value> {
    let mut embeddings: Vec<Vec<f32>> = vec![];
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.file_name().unwrap_or_default().to_string();
        let _ = field.bytes().await.unwrap();
        embeddings.push(match name.as_str() {
            "a.jpg" => corner(0),
            "b.jpg" => corner(1),
            "c.jpg" => corner(2),
            _ => corner(7),
        });
    }
    Json(serde_json::json!({ "embeddings": embeddings }))
}

async fn spawn_stub(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

fn provider_opts(base_url: String) -> ProviderOptions {
    ProviderOptions { embed_url: base_url, embed_timeout: 5 }
}

fn store_opts(dir: &TempDir) -> StoreOptions {
    StoreOptions {
        store_path: dir.path().to_path_buf(),
        table_name: "images".to_string(),
        dimension: D,
    }
}

fn ann_opts() -> AnnOptions {
    AnnOptions { metric: Metric::Dot, num_partitions: 4, num_sub_vectors: 4, nprobe: 4 }
}

#[tokio::test]
async fn ingest_search_and_feedback_flow() {
    let stub = Router::new()
        .route("/embed/text", post(embed_text_stub))
        .route("/embed/image", post(embed_image_stub));
    let base_url = spawn_stub(stub).await;

    let dir = TempDir::new().unwrap();
    let image_dir = dir.path().join("imgs");
    std::fs::create_dir_all(&image_dir).unwrap();
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        std::fs::write(image_dir.join(name), b"fake image bytes").unwrap();
    }

    let embed = EmbedClient::new(&provider_opts(base_url)).unwrap();
    let opts = store_opts(&dir);
    let store = VectorStore::open(&opts, &ann_opts()).await.unwrap();

    let total = ingest::run(&embed, &store, &image_dir, 2).await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(store.count().await.unwrap(), 3);

    // 查询向量与 b.jpg 的向量一致
    let vectors = embed.embed_text(&["查询".to_string()]).await.unwrap();
    let hits = store.search(&vectors[0], 1).await.unwrap();
    assert!(hits[0].uri.ends_with("b.jpg"));

    let pool = db::init_db(&opts.record_db()).await.unwrap();
    let record = crud::create_search(&pool, "查询", &hits[0].uri).await.unwrap();
    let updated = crud::update_feedback(&pool, &record.id, true).await.unwrap().unwrap();
    assert_eq!(updated.is_good, Some(true));
}

#[tokio::test]
async fn failed_batch_aborts_whole_ingest() {
    let stub = Router::new()
        .route("/embed/image", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
    let base_url = spawn_stub(stub).await;

    let dir = TempDir::new().unwrap();
    let image_dir = dir.path().join("imgs");
    std::fs::create_dir_all(&image_dir).unwrap();
    for name in ["a.jpg", "b.jpg"] {
        std::fs::write(image_dir.join(name), b"fake image bytes").unwrap();
    }

    let embed = EmbedClient::new(&provider_opts(base_url)).unwrap();
    let store = VectorStore::open(&store_opts(&dir), &ann_opts()).await.unwrap();

    let err = ingest::run(&embed, &store, &image_dir, 2).await.unwrap_err();
    assert!(matches!(err, Error::Upstream(_)));
    assert_eq!(store.count().await.unwrap(), 0);
}

#[test]
fn upload_filename_must_not_escape_image_dir() {
    for name in ["", ".", "..", "../evil.jpg", "a/b.jpg", "a\\b.jpg", "/etc/passwd"] {
        assert!(
            matches!(ingest::validate_filename(name), Err(Error::Validation(_))),
            "{name:?} 应当被拒绝"
        );
    }
    assert!(ingest::validate_filename("cat.jpg").is_ok());
    assert!(ingest::validate_filename("..cat.jpg").is_ok());
}

#[tokio::test]
async fn missing_image_dir_ingests_nothing() {
    let stub = Router::new().route("/embed/image", post(embed_image_stub));
    let base_url = spawn_stub(stub).await;

    let dir = TempDir::new().unwrap();
    let embed = EmbedClient::new(&provider_opts(base_url)).unwrap();
    let store = VectorStore::open(&store_opts(&dir), &ann_opts()).await.unwrap();

    let total = ingest::run(&embed, &store, &dir.path().join("missing"), 2).await.unwrap();
    assert_eq!(total, 0);
    let err = store.search(&corner(0), 1).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
