use std::process::ExitCode;

use bookshelf_api::{start_server, Config};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let (_, server) = match start_server(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Could not start the server: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.await {
        error!("Server stopped with an error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
