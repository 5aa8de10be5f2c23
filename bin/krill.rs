use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tonic::transport::Server;
use tracing::info;

use krill::cluster::proto::index_service_server::IndexServiceServer;
use krill::{EtcdCoordStore, IndexWorker, StorageKind, WorkerConfig};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Local indexer only, no RPC surface.
    Standalone,
    /// Shard RPC worker, optionally registered in the coordination store.
    Worker,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Storage {
    Btree,
    Lsm,
}

impl From<Storage> for StorageKind {
    fn from(storage: Storage) -> Self {
        match storage {
            Storage::Btree => StorageKind::BTree,
            Storage::Lsm => StorageKind::Lsm,
        }
    }
}

#[derive(Parser)]
#[command(name = "krill")]
#[command(about = "Distributed keyword search engine for short documents", long_about = None)]
struct Args {
    #[arg(long, env = "KRILL_MODE", value_enum, default_value_t = Mode::Standalone)]
    mode: Mode,

    /// RPC port (worker mode)
    #[arg(long, env = "KRILL_PORT", default_value = "5678")]
    port: u16,

    /// Base path of the forward-index data
    #[arg(long, env = "KRILL_DATA_DIR", default_value = "./data/forward")]
    data_dir: PathBuf,

    /// Forward-index backend
    #[arg(long, env = "KRILL_STORAGE", value_enum, default_value_t = Storage::Btree)]
    storage: Storage,

    /// Total number of shards in the cluster (used by the ingestion driver)
    #[arg(long, env = "KRILL_TOTAL_SHARDS", default_value = "1")]
    total_shards: u32,

    /// This worker's shard index; the data dir gets a `_part<index>` suffix
    #[arg(long, env = "KRILL_SHARD_INDEX", default_value = "0")]
    shard_index: u32,

    /// Rebuild via the ingestion driver instead of reloading the forward
    /// index on boot
    #[arg(long, env = "KRILL_REBUILD_INDEX")]
    rebuild_index: bool,

    /// Comma-separated coordination-store addresses; empty disables
    /// registration
    #[arg(long, env = "KRILL_COORD_ADDRS", value_delimiter = ',')]
    coord_addrs: Vec<String>,

    /// Estimated corpus size for pre-sizing the inverted index
    #[arg(long, env = "KRILL_DOC_ESTIMATE", default_value = "10000")]
    doc_num_estimate: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!(
        "Starting Krill v{} - shard {}/{}",
        krill::VERSION,
        args.shard_index,
        args.total_shards
    );

    let config = WorkerConfig::new(args.data_dir.clone())
        .with_storage(args.storage.into())
        .with_shard_index(args.shard_index)
        .with_doc_num_estimate(args.doc_num_estimate);
    let data_dir = config.shard_data_dir();
    info!("  Data directory: {:?}", data_dir);

    let worker = IndexWorker::open(config.doc_num_estimate, config.storage, &data_dir)?;

    if args.rebuild_index {
        info!("rebuild requested; waiting for the ingestion driver to repopulate the index");
    } else {
        let loaded = worker.load_from_index();
        info!(loaded, "reloaded index from forward store");
    }

    match args.mode {
        Mode::Standalone => {
            info!("standalone indexer ready");
            tokio::signal::ctrl_c().await?;
            info!("received shutdown signal, closing index");
            worker.close().await?;
        }
        Mode::Worker => {
            if !args.coord_addrs.is_empty() {
                // Failure to reach the coordination store is fatal here: a
                // worker nobody can discover is useless.
                let store = EtcdCoordStore::connect(&args.coord_addrs).await?;
                worker
                    .register(Arc::new(store), args.port, config.heartbeat_secs)
                    .await?;
            }

            let addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;
            info!("index worker listening on {}", addr);
            Server::builder()
                .add_service(IndexServiceServer::new(worker.clone()))
                .serve_with_shutdown(addr, async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;

            info!("received shutdown signal, unregistering and closing index");
            worker.close().await?;
        }
    }

    Ok(())
}
