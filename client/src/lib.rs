//! # Client Library
//!
//! This library provides the client side of the state synchronization
//! protocol. It samples directional input, predicts its own entity locally,
//! reconciles that prediction against the server's authoritative snapshots and
//! interpolates every other entity between received samples.
//!
//! ## Architecture Overview
//!
//! ### Client-Side Prediction
//! Every captured input is applied to the local entity immediately, through the
//! same update rule the server uses, and kept in a pending queue until the
//! server acknowledges it.
//!
//! ### Server Reconciliation
//! Each world state carries, for the local entity, the highest input sequence
//! the server has applied. The client snaps to the authoritative position,
//! drops every acknowledged input and replays the rest in order. With a
//! deterministic update rule the result matches the prediction unless the
//! server rejected an input.
//!
//! ### Entity Interpolation
//! Remote entities are rendered one server tick in the past so that two real
//! samples are almost always available to interpolate between. They are never
//! extrapolated.
//!
//! ## Module Organization
//!
//! - `config`: frame rate, interpolation delay and netcode toggles
//! - `input`: input devices, scripted movement and the sequencer
//! - `prediction`: the pending input queue and reconciliation replay
//! - `interpolation`: per-entity sample buffers
//! - `game`: the client's view of the world
//! - `network`: the per-frame session loop over a transport
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::ClientConfig;
//! use client::input::ScriptedDevice;
//! use client::network::Client;
//! use shared::transport::UdpClientTransport;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::default();
//!     let transport =
//!         UdpClientTransport::connect(&config.server_addr, config.connect_timeout).await?;
//!
//!     let mut client = Client::new(transport, ScriptedDevice::new(config.pattern), &config);
//!     client.run(config.duration).await?;
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod game;
pub mod input;
pub mod interpolation;
pub mod network;
pub mod prediction;
