use rstest::rstest;
use semsearch::ivf::{IvfPq, Metric};
use tempfile::TempDir;

const D: usize = 8;

/// 单位超立方体顶点，两两点积不超过 0.5，精确检索有唯一答案
fn corner(i: usize) -> Vec<f32> {
    let a = 1.0 / (D as f32).sqrt();
    (0..D).map(|j| if (i >> (j / 2)) & 1 == 1 { -a } else { a }).collect()
}

fn corners(n: usize) -> (Vec<i64>, Vec<f32>) {
    let ids = (1..=n as i64).collect();
    let data = (0..n).flat_map(corner).collect();
    (ids, data)
}

#[test]
fn train_rejects_empty_data() {
    assert!(IvfPq::train(Metric::Dot, D, 4, 4, &[]).is_err());
}

#[test]
fn train_rejects_indivisible_dimension() {
    let (_, data) = corners(8);
    assert!(IvfPq::train(Metric::Dot, D, 4, 3, &data).is_err());
}

#[test]
fn partitions_clamped_to_sample_count() {
    let (ids, data) = corners(2);
    let mut index = IvfPq::train(Metric::Dot, D, 16, 4, &data).unwrap();
    assert_eq!(index.nlist(), 2);
    index.add(&ids, &data);
    assert_eq!(index.ntotal(), 2);
}

#[rstest]
#[case(Metric::Dot)]
#[case(Metric::L2)]
fn search_finds_exact_vector_first(#[case] metric: Metric) {
    let (ids, data) = corners(8);
    let mut index = IvfPq::train(metric, D, 4, 4, &data).unwrap();
    index.add(&ids, &data);

    for i in 0..8 {
        let neighbors = index.search(&corner(i), 3, 4);
        assert_eq!(neighbors[0].id, ids[i]);
        match metric {
            Metric::Dot => assert!((neighbors[0].score - 1.0).abs() < 1e-4),
            Metric::L2 => assert!(neighbors[0].score.abs() < 1e-4),
        }
    }
}

#[test]
fn training_is_deterministic() {
    let (ids, data) = corners(8);
    let mut a = IvfPq::train(Metric::Dot, D, 4, 4, &data).unwrap();
    let mut b = IvfPq::train(Metric::Dot, D, 4, 4, &data).unwrap();
    a.add(&ids, &data);
    b.add(&ids, &data);

    for i in 0..8 {
        let ra: Vec<i64> = a.search(&corner(i), 8, 4).iter().map(|n| n.id).collect();
        let rb: Vec<i64> = b.search(&corner(i), 8, 4).iter().map(|n| n.id).collect();
        assert_eq!(ra, rb);
    }
}

#[test]
fn save_and_load_roundtrip() {
    let (ids, data) = corners(8);
    let mut index = IvfPq::train(Metric::L2, D, 4, 4, &data).unwrap();
    index.add(&ids, &data);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("images.idx");
    index.save(&path).unwrap();
    let loaded = IvfPq::load(&path).unwrap();

    assert_eq!(loaded.ntotal(), index.ntotal());
    assert_eq!(loaded.metric(), Metric::L2);
    for i in 0..8 {
        let before: Vec<i64> = index.search(&corner(i), 8, 4).iter().map(|n| n.id).collect();
        let after: Vec<i64> = loaded.search(&corner(i), 8, 4).iter().map(|n| n.id).collect();
        assert_eq!(before, after);
    }
}

#[test]
fn returns_fewer_when_k_exceeds_total() {
    let (ids, data) = corners(5);
    let mut index = IvfPq::train(Metric::Dot, D, 4, 4, &data).unwrap();
    index.add(&ids, &data);
    assert_eq!(index.search(&corner(0), 100, 4).len(), 5);
}
