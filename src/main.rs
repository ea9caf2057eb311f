use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use haystore::{Cluster, StoreConfig};

#[derive(Parser)]
#[command(name = "haystore", version = "1.0.0", about = "Append-only blob store CLI")]
struct Cli {
    /// Directory holding `<id>.dat` / `<id>.idx` files
    #[arg(long, default_value = "./data", env = "HAYSTORE_DATA_DIR")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty store
    Create {
        id: String,
        #[arg(long, default_value_t = 100 * 1024 * 1024 * 1024)]
        max_size: u64,
    },
    /// Write a needle's payload from a file
    Put {
        id: String,
        #[arg(long)]
        key: u64,
        #[arg(long)]
        file: PathBuf,
    },
    /// Read a needle's payload to stdout
    Get {
        id: String,
        #[arg(long)]
        key: u64,
    },
    /// Tombstone a needle
    Delete {
        id: String,
        #[arg(long)]
        key: u64,
    },
    /// Print header fields and index size
    Info { id: String },
    /// Rebuild the index by a full log scan and print a summary
    Scan { id: String },
    /// Serve the HTTP front door for one store
    Serve {
        id: String,
        #[arg(long, default_value = "127.0.0.1:8080", env = "HAYSTORE_ADDR")]
        addr: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = StoreConfig {
        directory: cli.dir,
        ..StoreConfig::default().with_env_overrides()
    };

    match cli.command {
        Commands::Create { id, max_size } => {
            let config = StoreConfig { max_size, ..config };
            let store = haystore::Store::init(&id, &config, true, None)?;
            println!("created store {} at {}", id, store.path().display());
        }

        Commands::Put { id, key, file } => {
            let store = haystore::Store::init(&id, &config, false, None)?;
            let data = std::fs::read(&file)?;
            let (offset, size) = store.write(key, &data)?;
            store.shutdown()?;
            println!("wrote key={key} offset={offset} size={size}");
        }

        Commands::Get { id, key } => {
            let store = haystore::Store::init(&id, &config, false, None)?;
            match store.read(key)? {
                Some(data) => {
                    use std::io::Write;
                    std::io::stdout().write_all(&data)?;
                }
                None => {
                    eprintln!("key {key} not found");
                    std::process::exit(1);
                }
            }
            store.shutdown()?;
        }

        Commands::Delete { id, key } => {
            let store = haystore::Store::init(&id, &config, false, None)?;
            store.delete(key)?;
            store.shutdown()?;
            println!("tombstoned key={key}");
        }

        Commands::Info { id } => {
            let store = haystore::Store::init(&id, &config, false, None)?;
            println!("── store {id} ─────────────────────────────");
            println!("  path       {}", store.path().display());
            println!("  read-only  {}", store.is_read_only());
            println!("  index size {}", store.index_len());
            store.shutdown()?;
        }

        Commands::Scan { id } => {
            let path = config.directory.join(format!("{id}.dat"));
            let file = std::fs::OpenOptions::new().read(true).write(true).open(&path)?;
            let index = haystore::recovery::scan_log(&file)?;
            println!("scan recovered {} needle(s) from {}", index.len(), path.display());
        }

        Commands::Serve { id, addr } => {
            let cluster = Cluster::new();
            let store = Arc::new(haystore::Store::init(&id, &config, true, Some(cluster))?);
            let app = haystore::http::router(store);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!(addr, "haystore listening");
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
