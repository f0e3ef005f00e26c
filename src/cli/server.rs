use clap::Parser;
use log::info;
use tokio::net::TcpListener;

use super::SubCommandExtend;
use crate::config::{ImageOptions, Opts};
use crate::db;
use crate::embed::EmbedClient;
use crate::ingest;
use crate::server::{AppState, create_app};
use crate::store::VectorStore;

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    #[command(flatten)]
    pub image: ImageOptions,
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub addr: String,
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let embed = EmbedClient::new(&opts.provider)?;
        let store = VectorStore::open(&opts.store, &opts.ann).await?;

        if store.count().await? == 0 {
            info!("向量存储为空，执行初始导入");
            ingest::run(&embed, &store, &self.image.image_dir, self.image.batch_size).await?;
        }

        let db = db::init_db(&opts.store.record_db()).await?;
        let state = AppState::new(embed, store, db, self);
        let app = create_app(state);

        info!("服务器启动：http://{}", self.addr);
        let listener = TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}
