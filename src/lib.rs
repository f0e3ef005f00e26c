pub mod cli;
pub mod config;
pub mod db;
pub mod embed;
pub mod error;
pub mod ingest;
pub mod ivf;
pub mod kmeans;
mod metrics;
mod server;
pub mod store;

pub use config::Opts;
pub use error::{Error, Result};
pub use store::VectorStore;
