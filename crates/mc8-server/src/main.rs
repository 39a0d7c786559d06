mod config;
mod connection;
mod error;
mod player;
mod world;

use clap::Parser;
use config::ServerConfig;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::parse();

    let loaded = match mc8_world::load_world(&config.world_directory) {
        Ok(world) => world,
        Err(err) => {
            tracing::error!(directory = %config.world_directory.display(), %err, "failed to load world");
            anyhow::bail!(err);
        }
    };
    tracing::info!(
        directory = %config.world_directory.display(),
        chunks = loaded.chunks.len(),
        seed = loaded.seed,
        "world loaded"
    );

    let (world_tx, world_rx) = mpsc::unbounded_channel();
    let world_task = tokio::spawn(world::run(loaded, world_rx));

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "listening");

    let accept_loop = async {
        loop {
            match listener.accept().await {
                Ok((socket, peer)) => {
                    tracing::debug!(%peer, "accepted connection");
                    let world_tx = world_tx.clone();
                    tokio::spawn(connection::handle_connection(socket, world_tx));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
    };

    tokio::select! {
        _ = accept_loop => {}
        result = world_task => {
            if let Err(e) = result {
                tracing::error!(error = %e, "world task panicked");
            }
        }
    }

    Ok(())
}
