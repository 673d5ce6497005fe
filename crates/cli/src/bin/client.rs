use std::ffi::OsString;

use anyhow::{anyhow, Result};
use clap::Parser;
use ipc::{Client, Payload, PosixTransport};
use tracing::Level;

use cli::config::load_config;

#[derive(Parser)]
#[command(name = "msgq-client")]
#[command(about = "Send one message to msgq-server and print the reply")]
#[command(version)]
struct Args {
    /// The message to send (at most 256 bytes). It may start with '-'.
    /// Bytes that are not valid UTF-8 are sent as U+FFFD.
    #[arg(allow_hyphen_values = true)]
    message: OsString,
}

fn main() -> Result<()> {
    let args = Args::parse();
    cli::init_logging(Level::WARN);

    let payload = Payload::new(args.message.to_string_lossy()).map_err(|e| match e {
        ipc::Error::TooLong { len, max } => {
            anyhow!("Message size limit exceeded: {} bytes, limit is {}", len, max)
        }
        other => anyhow!(other).context("Invalid message"),
    })?;

    let cfg = load_config()?;
    let client = Client::new(PosixTransport::new(), cfg.client_config()?);

    let reply = client.exchange(&payload).map_err(|e| match e {
        ipc::Error::NotFound(channel) => {
            anyhow!("Server queue {} does not exist. Is msgq-server running?", channel)
        }
        other => anyhow!(other).context("Exchange with msgq-server failed"),
    })?;

    println!("Process id = {}", client.identity());
    println!("Reply: {}", reply.payload);
    Ok(())
}
