use anyhow::{Context, Result};
use clap::Parser;
use daemon::Server;
use ipc::PosixTransport;
use tracing::Level;

use cli::config::load_config;

#[derive(Parser)]
#[command(name = "msgq-server")]
#[command(about = "Assign sequence ids to messages arriving on the well-known queue")]
#[command(version)]
struct Args {}

fn main() -> Result<()> {
    Args::parse();
    cli::init_logging(Level::INFO);

    let cfg = load_config()?;
    let server = Server::bind(PosixTransport::new(), cfg.server_channel()?)
        .context("Failed to start server")?;

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(serve(server));
    // The serve loop can still be parked in mq_receive; don't wait for it
    rt.shutdown_background();
    result
}

async fn serve(mut server: Server<PosixTransport>) -> Result<()> {
    let serve_loop = tokio::task::spawn_blocking(move || server.run());

    tokio::select! {
        joined = serve_loop => {
            joined.context("Serve loop panicked")??;
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
            Ok(())
        }
    }
}
