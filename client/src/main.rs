use clap::Parser;
use client::input::{InputSource, Wanderer};
use client::network::{Client, ClientConfig};
use log::info;
use shared::TransportConfig;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Name shown to other players
    #[arg(short = 'u', long, default_value = "player")]
    username: String,

    /// Own-state updates per second
    #[arg(short = 'r', long, default_value = "20")]
    send_rate: u32,

    /// Random-walk around the floor instead of standing still
    #[arg(short = 'w', long)]
    wander: bool,

    /// Simulated outgoing packet loss, 0.0 to 1.0
    #[arg(short = 'l', long, default_value = "0")]
    loss: f32,

    /// Seconds to wait for the server to accept the join
    #[arg(long, default_value = "10")]
    join_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    if args.loss > 0.0 {
        info!("Simulating {:.0}% packet loss", args.loss * 100.0);
    }

    let config = ClientConfig {
        join_timeout: Duration::from_secs(args.join_timeout),
        send_rate: args.send_rate,
        transport: TransportConfig {
            simulated_loss: args.loss,
            ..TransportConfig::default()
        },
    };
    let mut client = Client::join(&args.server, &args.username, config).await?;

    let input = if args.wander {
        InputSource::Wander(Wanderer::new())
    } else {
        InputSource::Idle
    };
    client
        .run(input, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("Client stopped");
    Ok(())
}
