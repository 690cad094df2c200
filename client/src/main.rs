use clap::Parser;
use client::input::{MovePattern, ScriptedDevice};
use client::network::Client;
use log::info;
use shared::config::DEFAULT_TICK_RATE;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Mark this participant ready as soon as it is connected
    #[arg(short = 'r', long)]
    ready: bool,

    /// Scripted movement fed into the input pipeline
    #[arg(short = 'p', long, value_enum, default_value_t = MovePattern::Forward)]
    pattern: MovePattern,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }
    info!("Movement pattern: {:?}", args.pattern);

    let tick_duration = Duration::from_secs_f64(1.0 / DEFAULT_TICK_RATE as f64);
    let device = Box::new(ScriptedDevice::new(args.pattern));
    let mut client =
        Client::new(&args.server, tick_duration, args.fake_ping, args.ready, device).await?;

    tokio::select! {
        result = client.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, leaving session");
            client.disconnect().await?;
        }
    }

    Ok(())
}
