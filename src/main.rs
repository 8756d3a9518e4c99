mod cli;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use cli::Cli;
use infohash_filter::{Filter, MemcacheClient};
use krpc_protocol::NodeID;

fn random_node_id() -> NodeID {
    NodeID(rand::random())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(err) => {
                warn!("could not install SIGTERM handler: {}", err);
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    if cli.debug {
        std::env::set_var("RUST_LOG", "debug");
    } else if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();

    info!("magnetod v{} started", env!("CARGO_PKG_VERSION"));

    let database_url = cli.resolved_database_url();
    let database = match persistence::Database::connect(&database_url, cli.batch_size).await {
        Ok(database) => Arc::new(database),
        Err(err) => {
            error!("could NOT connect to the database: {}", err);
            return std::process::ExitCode::FAILURE;
        }
    };

    if cli.heat_memcache {
        let Some(memcache_addr) = &cli.memcache else {
            error!("--heat-memcache requires --memcache to be set");
            return std::process::ExitCode::FAILURE;
        };
        let cache = MemcacheClient::new(memcache_addr.clone());
        let filter = Filter::new(database.clone(), Some(cache));
        match filter.heat_cache(1000).await {
            Ok(warmed) => {
                info!("heated memcache with {} infohashes", warmed);
                return std::process::ExitCode::SUCCESS;
            }
            Err(err) => {
                error!("could not heat memcache: {}", err);
                return std::process::ExitCode::FAILURE;
            }
        }
    }

    let ports = match cli::parse_ports(&cli.port) {
        Ok(ports) => ports,
        Err(err) => {
            error!("invalid --port: {}", err);
            return std::process::ExitCode::FAILURE;
        }
    };
    let max_metadata_size = match cli::parse_size(&cli.max_metadata_size) {
        Ok(size) => size,
        Err(err) => {
            error!("invalid --max-metadata-size: {}", err);
            return std::process::ExitCode::FAILURE;
        }
    };
    let host: IpAddr = match cli.host.parse() {
        Ok(host) => host,
        Err(err) => {
            error!("invalid --host: {}", err);
            return std::process::ExitCode::FAILURE;
        }
    };

    let memcache = cli.memcache.as_ref().map(|addr| MemcacheClient::new(addr.clone()));
    let filter = Arc::new(Filter::new(database.clone(), memcache));

    let shutdown = CancellationToken::new();

    let (success_tx, mut success_rx) = mpsc::channel::<fetcher::FetchedMetadata>(1024);
    let fetcher_config = fetcher::Config::new(cli.max_neighbours, rand::random());
    let mut fetcher_config = fetcher_config;
    fetcher_config.max_metadata_size = max_metadata_size;
    let pool = fetcher::Pool::new(fetcher_config, success_tx);

    let persist_database = database.clone();
    let persist_filter = filter.clone();
    let persist_task = tokio::spawn(async move {
        while let Some(metadata) = success_rx.recv().await {
            if persist_database.add_metadata(metadata.info_hash, &metadata.raw_info).await {
                persist_filter.clear_pending(&[metadata.info_hash]).await;
            }
        }
    });

    let mut node_handles = Vec::new();
    let mut forward_handles = Vec::new();
    let mut nodes: Vec<Arc<sybil::SybilNode>> = Vec::new();

    for port in &ports {
        let addr = SocketAddr::new(host, *port);
        let sybil_config = sybil::Config { max_neighbours: cli.max_neighbours, ..sybil::Config::default() };

        let (fetch_tx, mut fetch_rx) = mpsc::channel::<sybil::FetchRequest>(1024);
        let node = match sybil::SybilNode::bind(addr, random_node_id(), filter.clone(), fetch_tx, sybil_config).await {
            Ok(node) => node,
            Err(err) => {
                error!("could not bind DHT node on {}: {}", addr, err);
                continue;
            }
        };
        info!("DHT node bound on {}", addr);

        let forward_pool = pool.clone();
        let forward_handle = tokio::spawn(async move {
            while let Some(request) = fetch_rx.recv().await {
                forward_pool.submit(fetcher::FetchRequest { info_hash: request.info_hash, peer: request.peer }).await;
            }
        });
        forward_handles.push(forward_handle);

        let run_node = node.clone();
        let run_shutdown = shutdown.clone();
        let node_handle = tokio::spawn(async move { run_node.run(run_shutdown).await });
        node_handles.push(node_handle);
        nodes.push(node);
    }

    if nodes.is_empty() {
        error!("no DHT node could be bound, exiting");
        shutdown.cancel();
        return std::process::ExitCode::FAILURE;
    }

    let stats_task = if cli.stats {
        let stats_database = database.clone();
        let stats_nodes = nodes.clone();
        let interval = Duration::from_secs(cli.stats_interval.max(1));
        let stats_shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stats_shutdown.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {}
                }
                let snapshot = stats_database.stats_snapshot();
                let mut total_neighbours = 0usize;
                for node in &stats_nodes {
                    total_neighbours += node.routing_table_len().await;
                }
                info!(
                    "STATS nodes:{} added:{} errors:{}",
                    total_neighbours, snapshot.added, snapshot.errors
                );
            }
        }))
    } else {
        None
    };

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, exiting gracefully...");

    shutdown.cancel();

    for handle in node_handles {
        let _ = handle.await;
    }
    for handle in forward_handles {
        let _ = handle.await;
    }
    if let Some(stats_task) = stats_task {
        let _ = stats_task.await;
    }

    drop(pool);
    let _ = persist_task.await;

    if let Err(err) = database.flush().await {
        warn!("final flush failed: {}", err);
    }

    std::process::ExitCode::SUCCESS
}
