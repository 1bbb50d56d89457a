//! Simulated LoRa channel over IPv4 UDP multicast.
//!
//! Every gateway on the segment joins the same group; one datagram is one
//! frame. Frames we sent ourselves come back through multicast loopback and
//! are dropped by source address, since a radio does not hear its own
//! transmission.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use meshgate_core::config::RadioConfig;
use meshgate_core::wire::MAX_FRAME_LEN;
use meshgate_services::{GatewayHandle, RadioError, RadioTransport};

/// Transmit side, owned by the gateway actor.
pub struct UdpRadio {
    socket: Socket,
    group: SocketAddrV4,
}

impl RadioTransport for UdpRadio {
    fn transmit(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        if frame.is_empty() {
            return Err(RadioError::Empty);
        }
        if frame.len() > MAX_FRAME_LEN {
            return Err(RadioError::TooLong(frame.len()));
        }
        let n = self.socket.send_to(frame, &self.group.into())?;
        tracing::trace!(bytes = n, "frame on air");
        Ok(())
    }
}

/// Receive side, driven by [`receive_loop`].
pub struct RadioReceiver {
    socket: UdpSocket,
    own: SocketAddrV4,
    rssi: i32,
    snr: f32,
}

/// Open both halves of the channel.
pub fn open(config: &RadioConfig) -> Result<(UdpRadio, RadioReceiver)> {
    let group: Ipv4Addr = config
        .multicast_group
        .parse()
        .with_context(|| format!("invalid multicast group {:?}", config.multicast_group))?;
    if !group.is_multicast() {
        anyhow::bail!("{group} is not a multicast address");
    }

    let iface = outbound_interface(SocketAddrV4::new(group, config.port));
    let tx = make_send_socket(iface).context("failed to create radio send socket")?;
    let own = match tx
        .local_addr()
        .context("send socket has no local address")?
        .as_socket()
    {
        Some(SocketAddr::V4(addr)) => addr,
        _ => SocketAddrV4::new(iface, 0),
    };

    let rx = make_listen_socket(group, config.port).context("failed to join radio channel")?;
    let rx = UdpSocket::from_std(rx).context("failed to convert to tokio UdpSocket")?;

    tracing::info!(%group, port = config.port, %own, "radio channel open");

    Ok((
        UdpRadio {
            socket: tx,
            group: SocketAddrV4::new(group, config.port),
        },
        RadioReceiver {
            socket: rx,
            own,
            rssi: config.rssi,
            snr: config.snr,
        },
    ))
}

/// Feed every frame heard on the channel to the gateway.
///
/// Runs until the gateway goes away.
pub async fn receive_loop(rx: RadioReceiver, gateway: GatewayHandle) {
    let mut buf = vec![0u8; 2048];
    let mut backoff = Backoff::default();
    loop {
        let (len, from) = match rx.socket.recv_from(&mut buf).await {
            Ok(r) => {
                backoff.reset();
                r
            }
            Err(e) => {
                let delay = backoff.next_delay();
                tracing::warn!(error = %e, ?delay, "radio recv failed");
                tokio::time::sleep(delay).await;
                continue;
            }
        };

        if is_own_transmission(from, rx.own) {
            tracing::trace!("ignoring own transmission");
            continue;
        }
        if len == 0 || len > MAX_FRAME_LEN {
            tracing::debug!(len, %from, "discarding datagram that is not a valid frame");
            continue;
        }

        let frame = Bytes::copy_from_slice(&buf[..len]);
        if gateway.frame(frame, rx.rssi, rx.snr).await.is_err() {
            tracing::debug!("gateway stopped, radio receiver exiting");
            return;
        }
    }
}

/// True when a datagram came from our own send socket.
///
/// Another gateway on a different host may pick the same ephemeral port, so
/// the address has to match too. An unspecified own address only happens when
/// no interface could be resolved; then the port is all there is.
fn is_own_transmission(from: SocketAddr, own: SocketAddrV4) -> bool {
    if from.port() != own.port() {
        return false;
    }
    own.ip().is_unspecified() || from.ip() == IpAddr::V4(*own.ip())
}

/// Local address the kernel would route multicast to `group` from.
fn outbound_interface(group: SocketAddrV4) -> Ipv4Addr {
    let route_source = || -> std::io::Result<Ipv4Addr> {
        let socket = std::net::UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect(group)?;
        match socket.local_addr()? {
            SocketAddr::V4(addr) => Ok(*addr.ip()),
            SocketAddr::V6(_) => Ok(Ipv4Addr::UNSPECIFIED),
        }
    };
    match route_source() {
        Ok(ip) => ip,
        Err(e) => {
            tracing::debug!(error = %e, "no route to radio group, sending from any interface");
            Ipv4Addr::UNSPECIFIED
        }
    }
}

fn make_send_socket(iface: Ipv4Addr) -> Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;
    // Loopback on so other gateways on this host hear us.
    socket.set_multicast_loop_v4(true).context("IP_MULTICAST_LOOP")?;
    socket.set_multicast_ttl_v4(1).context("IP_MULTICAST_TTL")?;
    if !iface.is_unspecified() {
        socket.set_multicast_if_v4(&iface).context("IP_MULTICAST_IF")?;
    }
    let bind_addr = SocketAddrV4::new(iface, 0);
    socket.bind(&bind_addr.into()).context("bind()")?;
    Ok(socket)
}

// ── Receive back-off ──────────────────────────────────────────────────────────

const RECV_BACKOFF_START: Duration = Duration::from_millis(50);
const RECV_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Doubling delay between failed receives, reset by the next good one.
#[derive(Debug, Default)]
struct Backoff {
    current: Option<Duration>,
}

impl Backoff {
    fn next_delay(&mut self) -> Duration {
        let delay = match self.current {
            None => RECV_BACKOFF_START,
            Some(d) => (d * 2).min(RECV_BACKOFF_MAX),
        };
        self.current = Some(delay);
        delay
    }

    fn reset(&mut self) {
        self.current = None;
    }
}

fn make_listen_socket(group: Ipv4Addr, port: u16) -> Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;

    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    socket.set_nonblocking(true).context("set_nonblocking")?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    socket.bind(&bind_addr.into()).context("bind()")?;
    socket
        .join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
        .context("IP_ADD_MEMBERSHIP")?;

    Ok(socket.into())
}
