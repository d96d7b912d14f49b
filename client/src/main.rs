use clap::{Parser, ValueEnum};
use client::config::{ClientConfig, NetcodeToggles};
use client::input::{MovementPattern, ScriptedDevice};
use client::network::Client;
use log::{error, info};
use shared::transport::UdpClientTransport;
use std::time::Duration;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Pattern {
    Idle,
    Horizontal,
    Circle,
    Square,
    Wander,
}

impl From<Pattern> for MovementPattern {
    fn from(pattern: Pattern) -> Self {
        match pattern {
            Pattern::Idle => MovementPattern::Idle,
            Pattern::Horizontal => MovementPattern::Horizontal,
            Pattern::Circle => MovementPattern::Circle,
            Pattern::Square => MovementPattern::Square,
            Pattern::Wander => MovementPattern::Wander,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", shared::DEFAULT_PORT))]
    server: String,

    /// Scripted movement to play instead of keyboard input
    #[arg(short, long, value_enum, default_value = "circle")]
    pattern: Pattern,

    /// Client frames per second
    #[arg(short, long, default_value = "60")]
    frame_rate: u32,

    /// Server tick rate, sets the interpolation delay
    #[arg(short, long, default_value_t = shared::SERVER_TICK_RATE)]
    tick_rate: u32,

    /// Milliseconds to wait for the server to accept
    #[arg(long, default_value = "5000")]
    connect_timeout_ms: u64,

    /// Disable client-side prediction
    #[arg(long)]
    no_prediction: bool,

    /// Disable server reconciliation
    #[arg(long)]
    no_reconciliation: bool,

    /// Disable remote entity interpolation
    #[arg(long)]
    no_interpolation: bool,

    /// Seconds to run before disconnecting, 0 runs until Ctrl+C
    #[arg(short, long, default_value = "0")]
    duration_secs: u64,
}

impl Args {
    fn into_config(self) -> ClientConfig {
        ClientConfig {
            server_addr: self.server,
            pattern: self.pattern.into(),
            frame_rate: self.frame_rate,
            tick_rate: self.tick_rate,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            toggles: NetcodeToggles {
                prediction: !self.no_prediction,
                reconciliation: !self.no_reconciliation,
                interpolation: !self.no_interpolation,
            },
            duration: (self.duration_secs > 0).then(|| Duration::from_secs(self.duration_secs)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config();
    info!("Connecting to {} ...", config.server_addr);
    info!(
        "Pattern {:?}, {}fps, toggles {:?}",
        config.pattern, config.frame_rate, config.toggles
    );

    let transport = UdpClientTransport::connect(&config.server_addr, config.connect_timeout).await?;
    info!("Connected to {}", transport.server_addr());

    let mut client = Client::new(transport, ScriptedDevice::new(config.pattern), &config);

    let result = tokio::select! {
        result = client.run(config.duration) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, disconnecting...");
            Ok(())
        }
    };

    client.disconnect().await;

    if let Err(e) = result {
        error!("Client terminated: {}", e);
        return Err(e.into());
    }
    Ok(())
}
