use clap::Parser;
use log::info;
use server::network::Server;
use server::world::{WorldConfig, WorldState};
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Tick interval in milliseconds
    #[clap(short, long, default_value = "100")]
    tick_ms: u64,
    /// Maximum number of concurrent clients
    #[clap(short, long, default_value = "32")]
    max_clients: usize,
    /// Number of trading ports to generate (at least one)
    #[clap(long, default_value = "40", value_parser = clap::value_parser!(u64).range(1..))]
    ports: u64,
    /// Radius of the spherical play area
    #[clap(long, default_value = "500.0")]
    radius: f32,
    /// Number of trade hubs to generate
    #[clap(long, default_value = "5")]
    hubs: usize,
    /// Number of automated traders
    #[clap(long, default_value = "20")]
    bots: usize,
    /// Number of pirates
    #[clap(long, default_value = "10")]
    npcs: usize,
    /// Seed for world generation (random when omitted)
    #[clap(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let world = WorldState::new(WorldConfig {
        port_count: args.ports as usize,
        radius: args.radius,
        hub_count: args.hubs,
        bot_count: args.bots,
        npc_count: args.npcs,
        seed: args.seed,
    });

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(
        &address,
        Duration::from_millis(args.tick_ms),
        args.max_clients,
        world,
    )
    .await?;

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
