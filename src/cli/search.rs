use clap::{Parser, ValueEnum};

use super::SubCommandExtend;
use crate::config::Opts;
use crate::embed::EmbedClient;
use crate::error::Error;
use crate::store::{SearchHit, VectorStore};

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Table => f.write_str("table"),
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    /// 查询文本
    pub query: String,
    /// 返回结果数量
    #[arg(short, long, default_value_t = 10)]
    pub count: usize,
    /// 输出格式
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let embed = EmbedClient::new(&opts.provider)?;
        let store = VectorStore::open(&opts.store, &opts.ann).await?;

        let vectors = embed.embed_text(&[self.query.clone()]).await?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| Error::Upstream("嵌入服务返回空结果".to_string()))?;
        let hits = store.search(&vector, self.count).await?;
        print_result(&hits, self.output_format)?;
        Ok(())
    }
}

fn print_result(hits: &[SearchHit], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let items: Vec<_> = hits.iter().map(|h| (h.score, h.uri.as_str())).collect();
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        OutputFormat::Table => {
            for hit in hits {
                println!("{:.4}\t{}", hit.score, hit.uri);
            }
        }
    }
    Ok(())
}
