use std::path::PathBuf;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;
use crate::ivf::Metric;

static DATA_DIR: LazyLock<String> = LazyLock::new(|| {
    let proj_dirs = ProjectDirs::from("", "", "semsearch").expect("failed to get project dir");
    proj_dirs.data_dir().to_string_lossy().into_owned()
});

fn default_store_path() -> &'static str {
    &DATA_DIR
}

/// 向量存储配置
#[derive(Parser, Debug, Clone)]
pub struct StoreOptions {
    /// 向量存储所在目录
    #[arg(long, value_name = "DIR", default_value = default_store_path())]
    pub store_path: PathBuf,
    /// 向量表名称
    #[arg(long, value_name = "NAME", default_value = "images")]
    pub table_name: String,
    /// 嵌入向量维数
    #[arg(long, value_name = "D", default_value_t = 512)]
    pub dimension: usize,
}

impl StoreOptions {
    /// 向量表 sqlite 文件路径
    pub fn table_file(&self) -> PathBuf {
        self.store_path.join(format!("{}.db", self.table_name))
    }

    /// 索引文件路径
    pub fn index_file(&self) -> PathBuf {
        self.store_path.join(format!("{}.idx", self.table_name))
    }

    /// 搜索记录数据库路径
    pub fn record_db(&self) -> PathBuf {
        self.store_path.join("semsearch.db")
    }
}

/// ANN 索引配置
#[derive(Parser, Debug, Clone)]
pub struct AnnOptions {
    /// 距离度量方式
    #[arg(long, value_enum, default_value_t = Metric::Dot)]
    pub metric: Metric,
    /// 倒排分区数量
    #[arg(long, value_name = "N", default_value_t = 16)]
    pub num_partitions: usize,
    /// PQ 子向量数量，必须能整除向量维数
    #[arg(long, value_name = "N", default_value_t = 32)]
    pub num_sub_vectors: usize,
    /// 搜索时扫描的分区数量
    #[arg(long, value_name = "N", default_value_t = 4)]
    pub nprobe: usize,
}

/// 嵌入服务配置
#[derive(Parser, Debug, Clone)]
pub struct ProviderOptions {
    /// 嵌入服务地址
    #[arg(long, value_name = "URL", default_value = "http://localhost:8005")]
    pub embed_url: String,
    /// 嵌入服务请求超时，单位为秒
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub embed_timeout: u64,
}

/// 图片目录配置
#[derive(Parser, Debug, Clone)]
pub struct ImageOptions {
    /// 图片根目录
    #[arg(long, value_name = "DIR", default_value = "imgs")]
    pub image_dir: PathBuf,
    /// 批量嵌入时每个批次的图片数量
    #[arg(long, value_name = "SIZE", default_value_t = 32)]
    pub batch_size: usize,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "semsearch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    #[command(flatten)]
    pub store: StoreOptions,
    #[command(flatten)]
    pub ann: AnnOptions,
    #[command(flatten)]
    pub provider: ProviderOptions,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 扫描图片目录并全量导入向量存储
    Ingest(IngestCommand),
    /// 使用文本查询搜索图片
    Search(SearchCommand),
    /// 启动 HTTP 搜索服务
    Server(ServerCommand),
}
