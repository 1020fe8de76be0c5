//! acache CLI

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use acache::capture::{CacheManager, HttpFetcher};
use acache::config::Config;
use acache::network::HttpServer;
use acache::proxy::HttpProxy;
use acache::replay::ReplayServer;
use acache::storage::RouteStore;

#[derive(Parser)]
#[command(name = "acache", version, about = "Capture API responses and replay them offline")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Route database file (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the route bucket
    Init,
    /// Fetch a URL and store the response under an alias
    Add {
        /// Upstream URL
        url: String,
        /// Local path to replay the response under
        alias: String,
    },
    /// List stored routes
    List {
        /// Show key and content type for each route
        #[arg(short, long)]
        verbose: bool,
    },
    /// Delete every stored route
    Clear,
    /// Serve stored routes
    Serve {
        /// Listen port
        #[arg(short, long)]
        port: Option<u16>,
        /// Listen address, `host:port` or `:port`
        #[arg(long, conflicts_with = "port")]
        bind: Option<String>,
    },
    /// Proxy a remote API and store every response
    Proxy {
        /// Base URL of the remote API, e.g. https://pokeapi.co/api/v2
        base_url: String,
        /// Listen port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    let store = Arc::new(
        RouteStore::open(&config.database_path)
            .with_context(|| format!("opening {}", config.database_path.display()))?,
    );

    match cli.command {
        Command::Init => {
            if store.ensure_bucket()? {
                println!("Initialized {}", config.database_path.display());
            } else {
                println!("Already initialized: {}", config.database_path.display());
            }
        }
        Command::Add { url, alias } => {
            let manager = CacheManager::new(Arc::clone(&store), HttpFetcher::new()?)
                .with_max_response_size(config.limits.max_response_size);

            let runtime = runtime()?;
            runtime
                .block_on(manager.add_route(&url, &alias))
                .map_err(|e| anyhow::anyhow!("{} stage: {e}", e.stage()))?;

            println!("Added {url} as {alias}");
        }
        Command::List { verbose } => {
            let routes = store.get_all()?;
            if verbose {
                print!("{}", routes.describe());
            } else {
                print!("{}", routes.summary());
            }
        }
        Command::Clear => {
            store.clear()?;
            println!("Cleared all routes");
        }
        Command::Serve { port, bind } => {
            if let Some(bind) = bind {
                config.bind_address = bind;
            } else if let Some(port) = port {
                config.bind_address = format!(":{port}");
            }
            config.validate()?;

            runtime()?.block_on(async {
                let server = ReplayServer::bind(&store, &config).await?;
                info!(
                    "Serving {} routes on {}",
                    server.route_count(),
                    server.local_addr()?
                );
                server.run().await
            })?;
        }
        Command::Proxy { base_url, port } => {
            if let Some(port) = port {
                config.bind_address = format!(":{port}");
            }
            config.validate()?;
            store.ensure_bucket()?;

            let manager = Arc::new(
                CacheManager::new(Arc::clone(&store), HttpFetcher::new()?)
                    .with_max_response_size(config.limits.max_response_size),
            );
            let proxy = HttpProxy::new(manager, &base_url, &config.default_content_type)?;

            runtime()?.block_on(async {
                let server =
                    HttpServer::bind(config.socket_addr()?, config.limits.max_connections).await?;
                info!("Proxying {} on {}", base_url, server.local_addr()?);
                server.run(Arc::new(proxy)).await
            })?;
        }
    }

    if let Ok(store) = Arc::try_unwrap(store) {
        store.close()?;
    }
    Ok(())
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")
}
