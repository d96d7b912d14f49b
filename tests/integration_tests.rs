//! Integration tests for the synchronization protocol
//!
//! These tests run the real server loop and real clients over UDP on the
//! loopback interface, plus property tests across the server and client crates.

use client::config::{ClientConfig, NetcodeToggles};
use client::game::ClientGameState;
use client::input::{DeviceState, MovementPattern, ScriptedDevice};
use client::network::Client;
use server::config::{InputPolicy, ServerConfig};
use server::network::Server;
use shared::transport::{
    ClientEvent, ClientTransport, ConnectionId, UdpClientTransport, UdpServerTransport,
};
use shared::{apply, InputSnapshot, Packet, Vec2, WorldStateEntry};
use std::time::Duration;
use tokio::time::Instant;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const WAIT_LIMIT: Duration = Duration::from_secs(3);

async fn start_server(max_clients: usize) -> (Server<UdpServerTransport>, String) {
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        max_clients,
        input_policy: InputPolicy::default(),
        ..ServerConfig::default()
    };
    let transport =
        UdpServerTransport::bind(&config.bind_addr, config.max_clients, config.idle_timeout)
            .await
            .expect("Failed to bind server transport");
    let addr = transport.local_addr().unwrap().to_string();
    (Server::new(transport, &config), addr)
}

/// Polls until `matches` accepts a decoded packet, returning it.
async fn wait_for<F>(transport: &mut UdpClientTransport, mut matches: F) -> Packet
where
    F: FnMut(&Packet) -> bool,
{
    let search = async {
        loop {
            for event in transport.poll(Duration::from_millis(50)).await.unwrap() {
                if let ClientEvent::MessageReceived(bytes) = event {
                    let packet = Packet::decode(&bytes).unwrap();
                    if matches(&packet) {
                        return packet;
                    }
                }
            }
        }
    };
    tokio::time::timeout(WAIT_LIMIT, search)
        .await
        .expect("Timed out waiting for packet")
}

async fn welcome(transport: &mut UdpClientTransport) -> u32 {
    match wait_for(transport, |p| matches!(p, Packet::Welcome { .. })).await {
        Packet::Welcome { client_id } => client_id,
        _ => unreachable!(),
    }
}

fn own_entry(packet: &Packet, id: u32) -> Option<WorldStateEntry> {
    match packet {
        Packet::WorldState(entries) => entries.iter().find(|e| e.entity_id == id).copied(),
        _ => None,
    }
}

/// END-TO-END SESSION TESTS
mod session_tests {
    use super::*;

    /// A full client session against the real server converges on the
    /// server's authoritative position.
    #[tokio::test]
    async fn client_session_converges_with_server() {
        let (mut server, addr) = start_server(4).await;

        let session = async {
            let transport = UdpClientTransport::connect(&addr, CONNECT_TIMEOUT)
                .await
                .unwrap();
            let config = ClientConfig {
                server_addr: addr.clone(),
                toggles: NetcodeToggles::default(),
                ..ClientConfig::default()
            };
            let mut client = Client::new(
                transport,
                ScriptedDevice::new(MovementPattern::Horizontal),
                &config,
            );
            client.run(Some(Duration::from_millis(600))).await.unwrap();
            client
        };

        let client = tokio::select! {
            result = server.run() => panic!("Server stopped early: {:?}", result),
            client = session => client,
        };

        let view = client.game_state();
        assert!(view.is_assigned());
        assert!(client.is_connected());
        assert!(view.local_position().is_finite());

        let server_entity = server
            .game_state()
            .world_state()
            .into_iter()
            .find(|entry| Some(entry.entity_id) == view.player_id())
            .expect("Server lost the client's entity");
        assert!(server_entity.last_processed_input > 0);
        // Acknowledgments keep the queue short over a 600ms session.
        assert!(view.pending_input_count() < 20);
    }

    /// Two clients see each other as remote entities.
    #[tokio::test]
    async fn clients_see_each_other() {
        let (mut server, addr) = start_server(4).await;

        let clients = async {
            let mut a = UdpClientTransport::connect(&addr, CONNECT_TIMEOUT).await.unwrap();
            let id_a = welcome(&mut a).await;
            let mut b = UdpClientTransport::connect(&addr, CONNECT_TIMEOUT).await.unwrap();
            let id_b = welcome(&mut b).await;

            let packet = wait_for(&mut a, |p| own_entry(p, id_b).is_some()).await;
            (id_a, id_b, packet)
        };

        let (id_a, id_b, packet) = tokio::select! {
            result = server.run() => panic!("Server stopped early: {:?}", result),
            result = clients => result,
        };

        assert_ne!(id_a, id_b);
        assert!(own_entry(&packet, id_a).is_some());
        assert!(own_entry(&packet, id_b).is_some());
    }
}

/// AUTHORITATIVE VALIDATION TESTS
mod validation_tests {
    use super::*;

    /// An out-of-bound input is never applied or acknowledged, while a later
    /// valid input is.
    #[tokio::test]
    async fn invalid_input_is_never_acknowledged() {
        let (mut server, addr) = start_server(4).await;

        let valid = InputSnapshot::new(2, 0.1, Vec2::new(1.0, 0.0));
        let exchange = async {
            let mut transport = UdpClientTransport::connect(&addr, CONNECT_TIMEOUT)
                .await
                .unwrap();
            let id = welcome(&mut transport).await;

            let invalid = InputSnapshot::new(1, 0.1, Vec2::new(2.0, 0.0));
            transport.send(&Packet::Input(invalid).encode()).await.unwrap();
            transport.send(&Packet::Input(valid).encode()).await.unwrap();

            let mut seen = Vec::new();
            let packet = wait_for(&mut transport, |p| match own_entry(p, id) {
                Some(entry) => {
                    seen.push(entry.last_processed_input);
                    entry.last_processed_input == 2
                }
                None => false,
            })
            .await;
            (own_entry(&packet, id), seen)
        };

        let (entry, seen) = tokio::select! {
            result = server.run() => panic!("Server stopped early: {:?}", result),
            result = exchange => result,
        };

        assert!(!seen.contains(&1), "watermarks seen: {:?}", seen);
        let entry = entry.unwrap();
        assert_eq!(entry.position, apply(Vec2::ZERO, &valid));
    }
}

/// CONNECTION LIFECYCLE TESTS
mod lifecycle_tests {
    use super::*;

    /// A freed id is handed to the next connection, and no other id is.
    #[tokio::test]
    async fn freed_id_is_reused() {
        let (mut server, addr) = start_server(2).await;

        let lifecycle = async {
            let mut a = UdpClientTransport::connect(&addr, CONNECT_TIMEOUT).await.unwrap();
            let id_a = welcome(&mut a).await;
            let mut b = UdpClientTransport::connect(&addr, CONNECT_TIMEOUT).await.unwrap();
            let id_b = welcome(&mut b).await;

            a.disconnect().await.unwrap();
            let mut c = UdpClientTransport::connect(&addr, CONNECT_TIMEOUT).await.unwrap();
            let id_c = welcome(&mut c).await;
            (id_a, id_b, id_c)
        };

        let (id_a, id_b, id_c) = tokio::select! {
            result = server.run() => panic!("Server stopped early: {:?}", result),
            result = lifecycle => result,
        };

        let mut ids = vec![id_a, id_b];
        ids.sort();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(id_c, id_a);
        assert_eq!(server.game_state().player_count(), 2);
    }

    /// With no traffic, a tick waits out its deadline and then still broadcasts.
    #[tokio::test]
    async fn quiet_tick_returns_at_deadline_and_broadcasts() {
        let (mut server, addr) = start_server(2).await;

        let connect = async {
            let mut transport = UdpClientTransport::connect(&addr, CONNECT_TIMEOUT)
                .await
                .unwrap();
            let id = welcome(&mut transport).await;
            (transport, id)
        };
        let (mut transport, id) = tokio::select! {
            result = server.run() => panic!("Server stopped early: {:?}", result),
            result = connect => result,
        };

        // Discard broadcasts from the ticks that ran while connecting.
        tokio::time::sleep(Duration::from_millis(20)).await;
        while !transport.poll(Duration::ZERO).await.unwrap().is_empty() {}

        let tick_before = server.game_state().tick;
        let start = Instant::now();
        server
            .tick(Instant::now() + Duration::from_millis(50))
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(45), "returned after {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(200), "returned after {:?}", elapsed);
        assert_eq!(server.game_state().tick, tick_before + 1);

        let packet = wait_for(&mut transport, |p| own_entry(p, id).is_some()).await;
        assert_eq!(own_entry(&packet, id).unwrap().last_processed_input, 0);
    }

    /// Shutting the server down disconnects every client.
    #[tokio::test]
    async fn shutdown_disconnects_clients() {
        let (mut server, addr) = start_server(2).await;

        let mut transport = {
            let connect = async {
                let mut transport = UdpClientTransport::connect(&addr, CONNECT_TIMEOUT)
                    .await
                    .unwrap();
                welcome(&mut transport).await;
                transport
            };
            tokio::select! {
                result = server.run() => panic!("Server stopped early: {:?}", result),
                transport = connect => transport,
            }
        };

        server.shutdown().await;
        assert_eq!(server.game_state().player_count(), 0);

        let disconnected = tokio::time::timeout(WAIT_LIMIT, async {
            loop {
                let events = transport.poll(Duration::from_millis(50)).await.unwrap();
                if events.contains(&ClientEvent::Disconnected) {
                    return;
                }
            }
        })
        .await;
        assert!(disconnected.is_ok());
        assert!(!transport.is_connected());
    }
}

/// DETERMINISM PROPERTY TESTS
mod determinism_tests {
    use super::*;
    use proptest::prelude::*;
    use server::game::GameState;

    fn device_states() -> impl Strategy<Value = Vec<(f32, f32, f32)>> {
        prop::collection::vec((-1.0f32..1.0, -1.0f32..1.0, 0.001f32..0.1), 1..40)
    }

    proptest! {
        /// Applying inputs directly on the server, and predicting then
        /// reconciling on the client, end at the same position.
        #[test]
        fn prediction_and_reconciliation_match_direct_application(
            states in device_states(),
            ack_every in 1usize..8,
        ) {
            let connection = ConnectionId(1);
            let mut authority = GameState::new(1, InputPolicy::default());
            let id = authority.add_player(connection).unwrap();

            let mut view = ClientGameState::new(0.05, NetcodeToggles::default());
            view.handle_welcome(id);

            let mut direct = Vec2::ZERO;
            for (i, &(x, y, dt)) in states.iter().enumerate() {
                if let Some(input) = view.capture_input(DeviceState::new(x, y), dt) {
                    direct = apply(direct, &input);
                    authority.apply_input(connection, &input).unwrap();
                }

                if i % ack_every == 0 {
                    view.apply_world_state(&authority.world_state());
                }
            }

            prop_assert_eq!(view.local_position(), direct);

            view.apply_world_state(&authority.world_state());
            prop_assert_eq!(view.local_position(), direct);
            prop_assert_eq!(view.pending_input_count(), 0);
        }
    }
}
