use rand::prelude::*;
use rand::rngs::StdRng;

/// k-means 训练使用的固定随机种子
///
/// 同一份数据加同一组参数训练两次必须得到完全相同的聚类中心，
/// 索引重建的确定性依赖这一点
pub const KMEANS_SEED: u64 = 0x5e3d;

/// 使用 Lloyd 迭代训练 k-means 聚类中心
///
/// 参数：
/// - data: 输入向量，长度为 n * d
/// - d: 向量维数
/// - k: 聚类中心数量，必须满足 1 <= k <= n
/// - max_iter: 最大迭代次数
///
/// 返回长度为 k * d 的聚类中心，顺序稳定
pub fn kmeans(data: &[f32], d: usize, k: usize, max_iter: usize, seed: u64) -> Vec<f32> {
    let n = data.len() / d;
    assert!(k >= 1 && k <= n, "k must be in 1..=n");

    // 随机选取 k 个不重复的样本作为初始中心
    let mut rng = StdRng::seed_from_u64(seed);
    let mut perm: Vec<usize> = (0..n).collect();
    perm.shuffle(&mut rng);
    let mut centroids = Vec::with_capacity(k * d);
    for &i in perm.iter().take(k) {
        centroids.extend_from_slice(&data[i * d..(i + 1) * d]);
    }

    let mut assign = vec![0usize; n];
    for _ in 0..max_iter {
        let mut changed = false;
        for (i, x) in data.chunks_exact(d).enumerate() {
            let c = nearest(x, &centroids, d).0;
            if assign[i] != c {
                assign[i] = c;
                changed = true;
            }
        }

        let mut sums = vec![0.0f32; k * d];
        let mut counts = vec![0usize; k];
        for (i, x) in data.chunks_exact(d).enumerate() {
            let c = assign[i];
            counts[c] += 1;
            for (j, v) in x.iter().enumerate() {
                sums[c * d + j] += v;
            }
        }
        for c in 0..k {
            if counts[c] == 0 {
                // 空簇：用离所属中心最远的样本重新播种
                let far = farthest(data, &centroids, &assign, d);
                sums[c * d..(c + 1) * d].copy_from_slice(&data[far * d..(far + 1) * d]);
                counts[c] = 1;
                assign[far] = c;
            }
            for j in 0..d {
                centroids[c * d + j] = sums[c * d + j] / counts[c] as f32;
            }
        }

        if !changed {
            break;
        }
    }
    centroids
}

/// 返回与 x 最近（L2 平方距离）的中心编号及距离
pub fn nearest(x: &[f32], centroids: &[f32], d: usize) -> (usize, f32) {
    let mut best = (0, f32::INFINITY);
    for (c, centroid) in centroids.chunks_exact(d).enumerate() {
        let dist = l2_sq(x, centroid);
        if dist < best.1 {
            best = (c, dist);
        }
    }
    best
}

fn farthest(data: &[f32], centroids: &[f32], assign: &[usize], d: usize) -> usize {
    let mut best = (0, -1.0f32);
    for (i, x) in data.chunks_exact(d).enumerate() {
        let c = assign[i];
        let dist = l2_sq(x, &centroids[c * d..(c + 1) * d]);
        if dist > best.1 {
            best = (i, dist);
        }
    }
    best.0
}

/// L2 平方距离
pub fn l2_sq(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// 点积
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
