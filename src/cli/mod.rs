pub mod ingest;
pub mod search;
pub mod server;

pub use ingest::IngestCommand;
pub use search::SearchCommand;
pub use server::ServerCommand;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
