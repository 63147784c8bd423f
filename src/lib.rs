mod api;
pub mod config;
mod database;
mod error;
pub mod memory;
pub mod models;
pub mod repo;
mod schema;
pub mod validation;

use std::io;
use std::net::SocketAddr;

use axum::{serve::Serve, Router};
use tokio::net::TcpListener;
use tracing::{info, warn};

pub use api::build_app;
pub use config::{Config, Environment};
pub use database::{create_db_pool, DatabaseBookRepo, DatabaseError};
pub use memory::MemoryBookRepo;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to listen on {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },
}

/// Binds the listener and builds the app. The returned server runs when awaited.
pub async fn start_server(
    config: Config,
) -> Result<(SocketAddr, Serve<TcpListener, Router, Router>), StartupError> {
    let router = match &config.database_url {
        Some(db_url) => {
            let repo = DatabaseBookRepo::new(create_db_pool(db_url.clone()));
            build_app(repo, &config)
        }
        None => {
            warn!("DATABASE_URL is not set, books will only be kept in memory");
            build_app(MemoryBookRepo::new(), &config)
        }
    };

    let bind_error = |source| StartupError::Bind {
        addr: config.bind_addr,
        source,
    };
    let listener = TcpListener::bind(config.bind_addr).await.map_err(bind_error)?;
    let local_addr = listener.local_addr().map_err(bind_error)?;
    info!("Listening on {}", local_addr);

    Ok((local_addr, axum::serve(listener, router)))
}
