//! # Authoritative Server Library
//!
//! This library provides the authoritative side of the state synchronization
//! protocol. It owns the canonical entity of every connected client, applies
//! validated client inputs to it, and broadcasts a world state snapshot every
//! tick so clients can reconcile their predictions and interpolate everyone else.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Every entity moves only through the shared update rule. The server applies
//! each accepted input exactly once and records the input's sequence number as
//! the connection's acknowledgment watermark.
//!
//! ### Input Validation
//! Inputs that fail the configured [`config::InputPolicy`] are dropped without
//! a reply. Their sequence number is never acknowledged, so the client's own
//! reconciliation pulls its prediction back to the authoritative position.
//!
//! ### Connection Lifecycle
//! Connections are mapped to small entity ids drawn from a bounded pool. A
//! connection's id and entity are released together when it disconnects or
//! times out, and only then can the id be handed to someone else.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Tick Loop
//! The server is one loop over one [`network::Server`] value. Each tick drains
//! transport events until the tick deadline, then broadcasts. Draining never
//! waits past the deadline, so a quiet network cannot stall the simulation clock.
//!
//! ### Transport Boundary
//! The transport is a collaborator behind [`shared::transport::ServerTransport`].
//! The binary uses the UDP implementation; tests use an in-memory one.
//!
//! ## Module Organization
//!
//! - `config`: tick rate, pool capacity and input acceptance policy
//! - `slots`: fixed-capacity id arena
//! - `client_manager`: connection to id mapping and per-client state
//! - `game`: validation, input application and world state snapshots
//! - `network`: the tick loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use shared::transport::UdpServerTransport;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let transport =
//!         UdpServerTransport::bind(&config.bind_addr, config.max_clients, config.idle_timeout)
//!             .await?;
//!
//!     let mut server = Server::new(transport, &config);
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod game;
pub mod network;
pub mod slots;
