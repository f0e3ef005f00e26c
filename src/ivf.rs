use std::fs;
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::kmeans::{self, dot, l2_sq};

/// 距离度量方式
///
/// 入库向量都是单位向量，此时点积与余弦相似度等价，因此不单独提供 cosine
#[derive(ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// 点积相似度，得分越大越相似
    Dot,
    /// L2 距离，得分越小越相似
    L2,
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dot => "dot",
            Self::L2 => "l2",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "dot" => Ok(Self::Dot),
            "l2" => Ok(Self::L2),
            _ => Err(Error::Storage(format!("未知的度量方式：{s}"))),
        }
    }

    /// 计算两个向量的得分
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Dot => dot(a, b),
            Self::L2 => l2_sq(a, b).sqrt(),
        }
    }
}

/// 搜索结果中的一个近邻
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub id: i64,
    pub score: f32,
}

/// 单个倒排列表，按插入顺序保存向量 ID 和 PQ 编码
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
struct InvList {
    ids: Vec<i64>,
    /// 每 m 字节为一条编码
    codes: Vec<u8>,
}

/// IVF-PQ 索引
///
/// 粗量化器把向量划分到 nlist 个分区，分区内的向量以乘积量化编码保存。
/// 索引是行数据的派生产物，可以随时从行快照整体重建
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IvfPq {
    metric: Metric,
    dim: usize,
    nlist: usize,
    /// PQ 子向量数量
    m: usize,
    /// 每个子量化器的中心数量
    ks: usize,
    /// 子向量维数，dim / m
    dsub: usize,
    /// 粗量化中心，长度 nlist * dim
    centroids: Vec<f32>,
    /// PQ 码本，长度 m * ks * dsub
    codebooks: Vec<f32>,
    lists: Vec<InvList>,
}

impl IvfPq {
    /// 基于一份行快照训练索引
    ///
    /// nlist 与 ks 会收缩到不超过样本数，小数据集也能训练。
    /// 训练使用固定种子，同一份快照加同一组参数训练结果完全一致
    pub fn train(
        metric: Metric,
        dim: usize,
        num_partitions: usize,
        num_sub_vectors: usize,
        data: &[f32],
    ) -> Result<Self> {
        let n = data.len() / dim;
        if n == 0 {
            return Err(Error::Storage("训练数据为空".to_string()));
        }
        if dim % num_sub_vectors != 0 {
            return Err(Error::Storage(format!(
                "维数 {dim} 无法被子向量数量 {num_sub_vectors} 整除"
            )));
        }
        let nlist = num_partitions.clamp(1, n);
        let ks = 256.min(n);
        let m = num_sub_vectors;
        let dsub = dim / m;

        let centroids = kmeans::kmeans(data, dim, nlist, 25, kmeans::KMEANS_SEED);

        // 逐个子空间训练码本
        let mut codebooks = Vec::with_capacity(m * ks * dsub);
        let mut sub = vec![0.0f32; n * dsub];
        for j in 0..m {
            for i in 0..n {
                let off = i * dim + j * dsub;
                sub[i * dsub..(i + 1) * dsub].copy_from_slice(&data[off..off + dsub]);
            }
            let book = kmeans::kmeans(&sub, dsub, ks, 25, kmeans::KMEANS_SEED + 1 + j as u64);
            codebooks.extend_from_slice(&book);
        }

        let lists = vec![InvList::default(); nlist];
        Ok(Self { metric, dim, nlist, m, ks, dsub, centroids, codebooks, lists })
    }

    /// 添加向量，ids 与向量按位置一一对应
    pub fn add(&mut self, ids: &[i64], data: &[f32]) {
        assert_eq!(ids.len() * self.dim, data.len(), "ids and vectors length mismatch");
        for (id, x) in ids.iter().zip(data.chunks_exact(self.dim)) {
            let (list_no, _) = kmeans::nearest(x, &self.centroids, self.dim);
            let mut codes = Vec::with_capacity(self.m);
            for j in 0..self.m {
                codes.push(self.encode_sub(j, &x[j * self.dsub..(j + 1) * self.dsub]));
            }
            let list = &mut self.lists[list_no];
            list.ids.push(*id);
            list.codes.extend_from_slice(&codes);
        }
    }

    fn encode_sub(&self, j: usize, x: &[f32]) -> u8 {
        let book = &self.codebooks[j * self.ks * self.dsub..(j + 1) * self.ks * self.dsub];
        kmeans::nearest(x, book, self.dsub).0 as u8
    }

    /// 搜索 k 个近邻，扫描 nprobe 个最近的分区
    ///
    /// 得分按查找表近似计算，相同得分按 id 从小到大排序。
    /// 调用方负责用原始向量做精确重排
    pub fn search(&self, query: &[f32], k: usize, nprobe: usize) -> Vec<Neighbor> {
        assert_eq!(query.len(), self.dim, "query dimension mismatch");
        if k == 0 {
            return vec![];
        }

        // 选取 nprobe 个最近的分区
        let mut coarse: Vec<(usize, f32)> = self
            .centroids
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(i, c)| (i, l2_sq(query, c)))
            .collect();
        coarse.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        coarse.truncate(nprobe.max(1));

        let lut = self.build_lut(query);

        let mut neighbors = vec![];
        for (list_no, _) in coarse {
            let list = &self.lists[list_no];
            for (i, codes) in list.codes.chunks_exact(self.m).enumerate() {
                let mut score = 0.0f32;
                for (j, &c) in codes.iter().enumerate() {
                    score += lut[j * self.ks + c as usize];
                }
                // L2 查找表里累加的是平方距离
                let score = match self.metric {
                    Metric::Dot => score,
                    Metric::L2 => score.sqrt(),
                };
                neighbors.push(Neighbor { id: list.ids[i], score });
            }
        }

        neighbors.sort_by(|a, b| match self.metric {
            Metric::Dot => b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)),
            Metric::L2 => a.score.total_cmp(&b.score).then(a.id.cmp(&b.id)),
        });
        neighbors.truncate(k);
        neighbors
    }

    /// 每个子空间对每个码本中心的得分查找表，长度 m * ks
    fn build_lut(&self, query: &[f32]) -> Vec<f32> {
        let mut lut = vec![0.0f32; self.m * self.ks];
        for j in 0..self.m {
            let q = &query[j * self.dsub..(j + 1) * self.dsub];
            let book = &self.codebooks[j * self.ks * self.dsub..(j + 1) * self.ks * self.dsub];
            for (c, centroid) in book.chunks_exact(self.dsub).enumerate() {
                lut[j * self.ks + c] = match self.metric {
                    Metric::Dot => dot(q, centroid),
                    Metric::L2 => l2_sq(q, centroid),
                };
            }
        }
        lut
    }

    /// 序列化索引到文件，先写入临时文件再原子重命名
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bincode::serialize(self)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(bincode::deserialize(&fs::read(path)?)?)
    }

    /// 已索引的向量总数
    pub fn ntotal(&self) -> usize {
        self.lists.iter().map(|l| l.ids.len()).sum()
    }

    pub fn nlist(&self) -> usize {
        self.nlist
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }
}
