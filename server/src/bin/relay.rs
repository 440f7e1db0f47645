use clap::Parser;
use server::relay::RelayNode;
use shared::TransportConfig;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address clients connect to
    #[arg(short, long, default_value = "127.0.0.1:8081")]
    listen: String,
    /// Game server to forward to
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    upstream: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let relay = RelayNode::start(&args.listen, &args.upstream, TransportConfig::default()).await?;
    relay
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
