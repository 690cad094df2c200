use clap::Parser;
use log::info;
use server::network::Server;
use shared::config::{SessionConfig, DEFAULT_TICK_RATE, MAX_PARTICIPANTS};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Aviary session authority", long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,
    /// Tick rate (updates per second)
    #[arg(short, long, default_value_t = DEFAULT_TICK_RATE)]
    tick_rate: u32,
    /// Maximum number of connected participants
    #[arg(short, long, default_value_t = MAX_PARTICIPANTS)]
    max_participants: usize,
    /// Delay between everyone being ready and the gameplay scene loading
    #[arg(long)]
    start_delay_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);
    let tick_duration = Duration::from_secs_f64(1.0 / args.tick_rate.max(1) as f64);

    let mut config = SessionConfig::default();
    if let Some(ms) = args.start_delay_ms {
        config.lobby.start_delay = Duration::from_millis(ms);
    }

    info!(
        "Starting server on {} at {}Hz, {} participants max",
        address, args.tick_rate, args.max_participants
    );

    let mut server = Server::new(&address, tick_duration, args.max_participants, config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
