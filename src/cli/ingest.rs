use clap::Parser;
use log::info;

use super::SubCommandExtend;
use crate::config::{ImageOptions, Opts};
use crate::embed::EmbedClient;
use crate::ingest;
use crate::store::VectorStore;

#[derive(Parser, Debug, Clone)]
pub struct IngestCommand {
    #[command(flatten)]
    pub image: ImageOptions,
}

impl SubCommandExtend for IngestCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let embed = EmbedClient::new(&opts.provider)?;
        let store = VectorStore::open(&opts.store, &opts.ann).await?;
        let total = ingest::run(&embed, &store, &self.image.image_dir, self.image.batch_size).await?;
        info!("共导入 {total} 张图片");
        Ok(())
    }
}
