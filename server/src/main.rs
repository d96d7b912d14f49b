use clap::{Parser, ValueEnum};
use log::{error, info};
use server::config::{DirectionBound, InputPolicy, ServerConfig};
use server::network::Server;
use shared::transport::UdpServerTransport;
use std::time::Duration;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BoundKind {
    /// Each axis bounded separately
    PerAxis,
    /// Vector length bounded
    Magnitude,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value_t = shared::SERVER_TICK_RATE)]
    tick_rate: u32,

    /// Maximum concurrent clients
    #[arg(short, long, default_value_t = shared::MAX_CLIENTS)]
    max_clients: usize,

    /// Seconds of silence before a client is dropped
    #[arg(long, default_value = "5")]
    timeout_secs: u64,

    /// How input directions are bounded
    #[arg(long, value_enum, default_value = "per-axis")]
    direction_bound: BoundKind,

    /// Largest accepted direction component or length
    #[arg(long, default_value = "1.0")]
    max_direction: f32,

    /// Largest accepted elapsed time per input, in seconds
    #[arg(long, default_value = "1.0")]
    max_elapsed: f32,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let direction = match self.direction_bound {
            BoundKind::PerAxis => DirectionBound::PerAxis {
                max: self.max_direction,
            },
            BoundKind::Magnitude => DirectionBound::Magnitude {
                max: self.max_direction,
            },
        };

        ServerConfig {
            bind_addr: format!("{}:{}", self.host, self.port),
            tick_rate: self.tick_rate,
            max_clients: self.max_clients,
            idle_timeout: Duration::from_secs(self.timeout_secs),
            input_policy: InputPolicy {
                direction,
                max_elapsed: self.max_elapsed,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config();
    info!(
        "Starting server on {} at {}Hz, {} slots, policy {:?}",
        config.bind_addr, config.tick_rate, config.max_clients, config.input_policy
    );

    let transport =
        UdpServerTransport::bind(&config.bind_addr, config.max_clients, config.idle_timeout)
            .await?;
    let mut server = Server::new(transport, &config);

    let result = tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            Ok(())
        }
    };

    server.shutdown().await;

    if let Err(e) = result {
        error!("Server terminated: {}", e);
        return Err(e.into());
    }
    Ok(())
}
