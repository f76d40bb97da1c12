use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// cove IRC server.
#[derive(Parser, Debug)]
#[command(name = "server")]
struct Args {
    /// The port to listen on
    #[arg(value_parser = clap::value_parser!(u16).range(1024..))]
    port: u16,

    /// Connection password required of every client (empty disables)
    #[arg(default_value = "")]
    password: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> cove::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut term = signal(SignalKind::terminate())?;

    tokio::select! {
        res = cove::irc::server::run(args.port, args.password) => res?,
        _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
        _ = term.recv() => info!("terminated, shutting down"),
    }
    Ok(())
}
