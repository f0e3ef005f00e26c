use semsearch::config::{AnnOptions, StoreOptions};
use semsearch::ivf::Metric;
use semsearch::{Error, VectorStore};
use tempfile::TempDir;

const D: usize = 8;

fn corner(i: usize) -> Vec<f32> {
    let a = 1.0 / (D as f32).sqrt();
    (0..D).map(|j| if (i >> (j / 2)) & 1 == 1 { -a } else { a }).collect()
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

fn rows(n: usize) -> Vec<(String, Vec<f32>)> {
    (0..n).map(|i| (format!("file:///imgs/{i}.jpg"), corner(i))).collect()
}

#[tokio::test]
async fn empty_store_search_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = VectorStore::open(&store_opts(&dir), &ann_opts()).await.unwrap();
    let err = store.search(&corner(0), 1).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn appended_rows_visible_without_rebuild() {
    let dir = TempDir::new().unwrap();
    let store = VectorStore::open(&store_opts(&dir), &ann_opts()).await.unwrap();
    store.append(&rows(3)).await.unwrap();

    let hits = store.search(&corner(1), 1).await.unwrap();
    assert_eq!(hits[0].uri, "file:///imgs/1.jpg");
    assert!((hits[0].score - 1.0).abs() < 1e-4);
}

#[tokio::test]
async fn append_rejects_unnormalized_vector_atomically() {
    let dir = TempDir::new().unwrap();
    let store = VectorStore::open(&store_opts(&dir), &ann_opts()).await.unwrap();

    let batch =
        vec![("file:///imgs/ok.jpg".to_string(), corner(0)), ("file:///imgs/bad.jpg".to_string(), vec![1.0; D])];
    let err = store.append(&batch).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn append_rejects_dimension_mismatch() {
    let dir = TempDir::new().unwrap();
    let store = VectorStore::open(&store_opts(&dir), &ann_opts()).await.unwrap();

    let batch = vec![("file:///imgs/short.jpg".to_string(), vec![1.0, 0.0, 0.0, 0.0])];
    let err = store.append(&batch).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn ties_broken_by_insertion_order() {
    let dir = TempDir::new().unwrap();
    let store = VectorStore::open(&store_opts(&dir), &ann_opts()).await.unwrap();
    store
        .append(&[
            ("file:///imgs/first.jpg".to_string(), corner(2)),
            ("file:///imgs/second.jpg".to_string(), corner(2)),
        ])
        .await
        .unwrap();

    let hits = store.search(&corner(2), 1).await.unwrap();
    assert_eq!(hits[0].uri, "file:///imgs/first.jpg");
}

#[tokio::test]
async fn search_after_rebuild_uses_index() {
    let dir = TempDir::new().unwrap();
    let opts = store_opts(&dir);
    let store = VectorStore::open(&opts, &ann_opts()).await.unwrap();
    store.append(&rows(8)).await.unwrap();
    store.rebuild().await.unwrap();
    assert!(opts.index_file().exists());

    for i in 0..8 {
        let hits = store.search(&corner(i), 1).await.unwrap();
        assert_eq!(hits[0].uri, format!("file:///imgs/{i}.jpg"));
    }
}

#[tokio::test]
async fn rows_appended_after_rebuild_are_visible() {
    let dir = TempDir::new().unwrap();
    let store = VectorStore::open(&store_opts(&dir), &ann_opts()).await.unwrap();
    store.append(&rows(4)).await.unwrap();
    store.rebuild().await.unwrap();

    store.append(&[("file:///imgs/late.jpg".to_string(), corner(5))]).await.unwrap();
    let hits = store.search(&corner(5), 1).await.unwrap();
    assert_eq!(hits[0].uri, "file:///imgs/late.jpg");
}

#[tokio::test]
async fn rebuild_is_deterministic() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    let store_a = VectorStore::open(&store_opts(&dir_a), &ann_opts()).await.unwrap();
    let store_b = VectorStore::open(&store_opts(&dir_b), &ann_opts()).await.unwrap();
    store_a.append(&rows(8)).await.unwrap();
    store_b.append(&rows(8)).await.unwrap();
    store_a.rebuild().await.unwrap();
    store_b.rebuild().await.unwrap();

    for i in 0..8 {
        let a: Vec<String> =
            store_a.search(&corner(i), 8).await.unwrap().into_iter().map(|h| h.uri).collect();
        let b: Vec<String> =
            store_b.search(&corner(i), 8).await.unwrap().into_iter().map(|h| h.uri).collect();
        assert_eq!(a, b);
    }
}

#[tokio::test]
async fn incompatible_schema_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = VectorStore::open(&store_opts(&dir), &ann_opts()).await.unwrap();
    drop(store);

    let mut opts = store_opts(&dir);
    opts.dimension = 16;
    let err = VectorStore::open(&opts, &ann_opts()).await.err();
    assert!(matches!(err, Some(Error::Storage(_))));

    let mut ann = ann_opts();
    ann.metric = Metric::L2;
    let err = VectorStore::open(&store_opts(&dir), &ann).await.err();
    assert!(matches!(err, Some(Error::Storage(_))));
}

#[tokio::test]
async fn returns_fewer_when_k_exceeds_rows() {
    let dir = TempDir::new().unwrap();
    let store = VectorStore::open(&store_opts(&dir), &ann_opts()).await.unwrap();
    store.append(&rows(3)).await.unwrap();
    assert_eq!(store.search(&corner(0), 10).await.unwrap().len(), 3);
}

#[tokio::test]
async fn clear_empties_store_and_drops_index() {
    let dir = TempDir::new().unwrap();
    let opts = store_opts(&dir);
    let store = VectorStore::open(&opts, &ann_opts()).await.unwrap();
    store.append(&rows(4)).await.unwrap();
    store.rebuild().await.unwrap();

    store.clear().await.unwrap();
    assert_eq!(store.count().await.unwrap(), 0);
    assert!(!opts.index_file().exists());
    let err = store.search(&corner(0), 1).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
