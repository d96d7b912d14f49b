//! Connection-oriented transport over a tokio UDP socket.
//!
//! Each datagram carries one bincode-encoded [`Frame`]. The handshake is a
//! `Connect` answered by `Accept` (or `Reject` when the server is full).
//! Peers that stay silent for longer than the idle timeout are reported as
//! timed out; clients send heartbeats so an idle player is not dropped.
//! Delivery is best effort.

use super::{
    ClientEvent, ClientTransport, ConnectionId, Frame, ServerTransport, TransportError,
    TransportEvent,
};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_DATAGRAM_SIZE: usize = 2048;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5);
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(100);
/// Most datagrams handled by one `poll` after its first
const MAX_DRAIN_BATCH: usize = 256;

/// Whether `poll` may pick up another queued datagram. A zero wait drains one
/// batch of what is already queued; otherwise draining stops at the deadline.
fn keep_draining(drained: usize, deadline: Instant, zero_wait: bool) -> bool {
    drained < MAX_DRAIN_BATCH && (zero_wait || Instant::now() < deadline)
}

struct Peer {
    connection: ConnectionId,
    last_seen: Instant,
}

/// Server end: accepts up to `max_connections` peers on one socket.
pub struct UdpServerTransport {
    socket: UdpSocket,
    peers: HashMap<SocketAddr, Peer>,
    addrs: HashMap<ConnectionId, SocketAddr>,
    next_connection: u64,
    max_connections: usize,
    idle_timeout: Duration,
}

impl UdpServerTransport {
    pub async fn bind(
        addr: &str,
        max_connections: usize,
        idle_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr).await?;
        info!("Transport listening on {}", socket.local_addr()?);

        Ok(Self {
            socket,
            peers: HashMap::new(),
            addrs: HashMap::new(),
            next_connection: 1,
            max_connections,
            idle_timeout,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn connection_count(&self) -> usize {
        self.peers.len()
    }

    async fn send_frame(&self, frame: &Frame, addr: SocketAddr) -> Result<(), TransportError> {
        let data = frame.to_bytes()?;
        self.socket.send_to(&data, addr).await?;
        Ok(())
    }

    /// Handshake answers are best effort; the peer retries `Connect` if one is lost.
    async fn reply(&self, frame: &Frame, addr: SocketAddr) {
        if let Err(e) = self.send_frame(frame, addr).await {
            warn!("Failed to send {:?} to {}: {}", frame, addr, e);
        }
    }

    fn expire_peers(&mut self, events: &mut Vec<TransportEvent>) {
        let idle_timeout = self.idle_timeout;
        let expired: Vec<SocketAddr> = self
            .peers
            .iter()
            .filter(|(_, peer)| peer.last_seen.elapsed() > idle_timeout)
            .map(|(addr, _)| *addr)
            .collect();

        for addr in expired {
            if let Some(peer) = self.peers.remove(&addr) {
                self.addrs.remove(&peer.connection);
                info!("{} from {} timed out", peer.connection, addr);
                events.push(TransportEvent::DisconnectedTimeout(peer.connection));
            }
        }
    }

    async fn handle_datagram(
        &mut self,
        data: &[u8],
        addr: SocketAddr,
        events: &mut Vec<TransportEvent>,
    ) {
        let frame = match Frame::from_bytes(data) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping undecodable datagram from {}: {}", addr, e);
                return;
            }
        };

        if let Some(peer) = self.peers.get_mut(&addr) {
            peer.last_seen = Instant::now();
        }

        match frame {
            Frame::Connect { protocol_version } => {
                if self.peers.contains_key(&addr) {
                    // Our Accept was lost, answer again.
                    return self.reply(&Frame::Accept, addr).await;
                }

                if protocol_version != PROTOCOL_VERSION {
                    let reason = format!("Protocol version mismatch ({})", protocol_version);
                    return self.reply(&Frame::Reject { reason }, addr).await;
                }

                if self.peers.len() >= self.max_connections {
                    warn!("Rejecting {}: server full", addr);
                    let reason = "Server full".to_string();
                    return self.reply(&Frame::Reject { reason }, addr).await;
                }

                let connection = ConnectionId(self.next_connection);
                self.next_connection += 1;
                self.peers.insert(
                    addr,
                    Peer {
                        connection,
                        last_seen: Instant::now(),
                    },
                );
                self.addrs.insert(connection, addr);
                info!("{} connected from {}", connection, addr);

                events.push(TransportEvent::Connected(connection));
                self.reply(&Frame::Accept, addr).await;
            }
            Frame::Disconnect => {
                if let Some(peer) = self.peers.remove(&addr) {
                    self.addrs.remove(&peer.connection);
                    info!("{} from {} disconnected", peer.connection, addr);
                    events.push(TransportEvent::Disconnected(peer.connection));
                }
            }
            Frame::Payload(bytes) => match self.peers.get(&addr) {
                Some(peer) => events.push(TransportEvent::MessageReceived(peer.connection, bytes)),
                None => debug!("Ignoring payload from unconnected {}", addr),
            },
            Frame::Heartbeat => {}
            Frame::Accept | Frame::Reject { .. } => {
                warn!("Unexpected handshake reply from {}", addr);
            }
        }
    }
}

impl ServerTransport for UdpServerTransport {
    async fn poll(&mut self, max_wait: Duration) -> Result<Vec<TransportEvent>, TransportError> {
        let deadline = Instant::now() + max_wait;
        let mut events = Vec::new();
        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

        self.expire_peers(&mut events);

        if events.is_empty() {
            match timeout_at(deadline, self.socket.recv_from(&mut buffer)).await {
                Ok(Ok((len, addr))) => {
                    self.handle_datagram(&buffer[..len], addr, &mut events)
                        .await
                }
                // ICMP errors from a vanished peer surface here on some platforms.
                Ok(Err(e)) => warn!("Error receiving datagram: {}", e),
                Err(_) => return Ok(events),
            }
        }

        let mut drained = 0;
        while keep_draining(drained, deadline, max_wait.is_zero()) {
            drained += 1;
            match self.socket.try_recv_from(&mut buffer) {
                Ok((len, addr)) => {
                    self.handle_datagram(&buffer[..len], addr, &mut events)
                        .await
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("Error receiving datagram: {}", e);
                    break;
                }
            }
        }

        Ok(events)
    }

    async fn send(&mut self, connection: ConnectionId, bytes: &[u8]) -> Result<(), TransportError> {
        let addr = *self
            .addrs
            .get(&connection)
            .ok_or(TransportError::UnknownConnection(connection))?;
        self.send_frame(&Frame::Payload(bytes.to_vec()), addr).await
    }

    async fn broadcast(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let data = Frame::Payload(bytes.to_vec()).to_bytes()?;
        for (addr, peer) in &self.peers {
            if let Err(e) = self.socket.send_to(&data, *addr).await {
                warn!("Failed to send to {}: {}", peer.connection, e);
            }
        }
        Ok(())
    }

    async fn disconnect(&mut self, connection: ConnectionId) -> Result<(), TransportError> {
        let addr = self
            .addrs
            .remove(&connection)
            .ok_or(TransportError::UnknownConnection(connection))?;
        self.peers.remove(&addr);
        info!("Disconnecting {} at {}", connection, addr);
        self.send_frame(&Frame::Disconnect, addr).await
    }
}

/// Client end: one connection to one server.
pub struct UdpClientTransport {
    socket: UdpSocket,
    server_addr: SocketAddr,
    connected: bool,
    last_heard: Instant,
    last_sent: Instant,
    idle_timeout: Duration,
    /// Payloads that arrived before the handshake finished.
    backlog: Vec<Vec<u8>>,
}

impl UdpClientTransport {
    /// Performs the handshake, retrying `Connect` until accepted or `timeout` elapses.
    pub async fn connect(server: &str, timeout: Duration) -> Result<Self, TransportError> {
        let server_addr = tokio::net::lookup_host(server)
            .await?
            .next()
            .ok_or_else(|| TransportError::Address(server.to_string()))?;

        let bind_addr = if server_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(server_addr).await?;

        let connect = Frame::Connect {
            protocol_version: PROTOCOL_VERSION,
        }
        .to_bytes()?;
        let deadline = Instant::now() + timeout;
        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

        info!("Connecting to {}...", server_addr);
        while Instant::now() < deadline {
            socket.send(&connect).await?;

            let retry_at = (Instant::now() + CONNECT_RETRY_INTERVAL).min(deadline);
            while let Ok(received) = timeout_at(retry_at, socket.recv(&mut buffer)).await {
                let len = match received {
                    Ok(len) => len,
                    // Nothing listening yet; try again on the next round.
                    Err(e) => {
                        debug!("Connect attempt failed: {}", e);
                        tokio::time::sleep_until(retry_at).await;
                        break;
                    }
                };

                let backlog = match Frame::from_bytes(&buffer[..len]) {
                    Ok(Frame::Accept) => Vec::new(),
                    // The Accept was lost but the server already counts us as connected.
                    Ok(Frame::Payload(bytes)) => vec![bytes],
                    Ok(Frame::Reject { reason }) => return Err(TransportError::Rejected(reason)),
                    Ok(other) => {
                        debug!("Ignoring {:?} during handshake", other);
                        continue;
                    }
                    Err(e) => {
                        debug!("Ignoring undecodable datagram during handshake: {}", e);
                        continue;
                    }
                };

                info!("Connected to {}", server_addr);
                let now = Instant::now();
                return Ok(Self {
                    socket,
                    server_addr,
                    connected: true,
                    last_heard: now,
                    last_sent: now,
                    idle_timeout: DEFAULT_IDLE_TIMEOUT,
                    backlog,
                });
            }
        }

        Err(TransportError::Timeout(server_addr.to_string()))
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    async fn send_frame(&mut self, frame: &Frame) -> Result<(), TransportError> {
        let data = frame.to_bytes()?;
        self.socket.send(&data).await?;
        self.last_sent = Instant::now();
        Ok(())
    }

    fn handle_datagram(&mut self, data: &[u8], events: &mut Vec<ClientEvent>) {
        let frame = match Frame::from_bytes(data) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping undecodable datagram from server: {}", e);
                return;
            }
        };

        self.last_heard = Instant::now();
        match frame {
            Frame::Payload(bytes) => events.push(ClientEvent::MessageReceived(bytes)),
            Frame::Disconnect => {
                info!("Server closed the connection");
                self.connected = false;
                events.push(ClientEvent::Disconnected);
            }
            Frame::Accept | Frame::Heartbeat => {}
            other => debug!("Ignoring unexpected {:?} from server", other),
        }
    }
}

impl ClientTransport for UdpClientTransport {
    async fn poll(&mut self, max_wait: Duration) -> Result<Vec<ClientEvent>, TransportError> {
        let mut events: Vec<ClientEvent> = self
            .backlog
            .drain(..)
            .map(ClientEvent::MessageReceived)
            .collect();
        if !self.connected {
            return Ok(events);
        }

        if self.last_heard.elapsed() > self.idle_timeout {
            warn!("Connection to {} timed out", self.server_addr);
            self.connected = false;
            events.push(ClientEvent::DisconnectedTimeout);
            return Ok(events);
        }

        if self.last_sent.elapsed() >= HEARTBEAT_INTERVAL {
            self.send_frame(&Frame::Heartbeat).await?;
        }

        let deadline = Instant::now() + max_wait;
        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

        match timeout_at(deadline, self.socket.recv(&mut buffer)).await {
            Ok(Ok(len)) => self.handle_datagram(&buffer[..len], &mut events),
            Ok(Err(e)) => warn!("Error receiving datagram: {}", e),
            Err(_) => return Ok(events),
        }

        let mut drained = 0;
        while self.connected && keep_draining(drained, deadline, max_wait.is_zero()) {
            drained += 1;
            match self.socket.try_recv(&mut buffer) {
                Ok(len) => self.handle_datagram(&buffer[..len], &mut events),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("Error receiving datagram: {}", e);
                    break;
                }
            }
        }

        Ok(events)
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.send_frame(&Frame::Payload(bytes.to_vec())).await
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        info!("Disconnecting from {}", self.server_addr);
        self.send_frame(&Frame::Disconnect).await
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
