use std::sync::Arc;

use crate::cli::ServerCommand;
use crate::config::ImageOptions;
use crate::db::Database;
use crate::embed::EmbedClient;
use crate::store::VectorStore;

/// 服务全局状态
pub struct AppState {
    pub embed: EmbedClient,
    pub store: VectorStore,
    pub db: Database,
    pub image: ImageOptions,
}

impl AppState {
    pub fn new(
        embed: EmbedClient,
        store: VectorStore,
        db: Database,
        opts: &ServerCommand,
    ) -> Arc<Self> {
        Arc::new(Self { embed, store, db, image: opts.image.clone() })
    }
}
