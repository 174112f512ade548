//! Local node identity
//!
//! A process picks a random overlay identifier and a random UDP key secret
//! once at startup. The secret never leaves the process; peers only see the
//! per-destination verify keys derived from it.

use crate::error::{Result, SearchError};
use kadseek_proto::hash::udp_verify_key;
use kadseek_proto::{DEFAULT_TCP_PORT, DEFAULT_UDP_PORT, KadId};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Public address used to discover the preferred outbound interface
///
/// No packet is sent: connecting a UDP socket only selects a route.
const ROUTE_PROBE_ADDR: &str = "8.8.8.8:80";

/// Secret mixed into UDP verify keys
///
/// Wiped on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct UdpSecret(u32);

impl UdpSecret {
    /// Wrap an existing secret
    #[must_use]
    pub const fn new(secret: u32) -> Self {
        Self(secret)
    }

    /// Generate a random secret
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random())
    }

    /// Raw secret value
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for UdpSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UdpSecret([REDACTED])")
    }
}

/// Local preferences and identity
#[derive(Debug, Clone)]
pub struct Prefs {
    /// Overlay identifier of this process
    pub kad_id: KadId,
    /// Verify-key secret
    pub udp_key: UdpSecret,
    /// Advertised TCP port
    pub tcp_port: u16,
    /// Local UDP listen port
    pub udp_port: u16,
    /// Public address, once a peer has reported it
    pub extern_ip: Option<Ipv4Addr>,
    /// Preferred outbound address
    pub local_ip: Ipv4Addr,
}

impl Prefs {
    /// Fresh identity with default ports and the given local address
    #[must_use]
    pub fn new(local_ip: Ipv4Addr) -> Self {
        Self {
            kad_id: KadId::random(),
            udp_key: UdpSecret::random(),
            tcp_port: DEFAULT_TCP_PORT,
            udp_port: DEFAULT_UDP_PORT,
            extern_ip: None,
            local_ip,
        }
    }

    /// Fresh identity bound to the detected outbound address
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::LocalIdentity`] when no outbound route exists.
    pub async fn detect() -> Result<Self> {
        let local_ip = detect_local_ip().await?;
        tracing::info!(%local_ip, "local outbound address");
        Ok(Self::new(local_ip))
    }

    /// Verify key to present to `target_ip`
    #[must_use]
    pub fn udp_verify_key(&self, target_ip: Ipv4Addr) -> u32 {
        udp_verify_key(self.udp_key.value(), u32::from(target_ip))
    }

    /// Public address if known, otherwise the local one
    #[must_use]
    pub fn public_ip(&self) -> Ipv4Addr {
        self.extern_ip.unwrap_or(self.local_ip)
    }
}

/// Address of the interface used for outbound traffic
///
/// # Errors
///
/// Returns [`SearchError::LocalIdentity`] if the route cannot be resolved or
/// resolves to a non-IPv4 address.
pub async fn detect_local_ip() -> Result<Ipv4Addr> {
    let identity_err = |e: std::io::Error| SearchError::LocalIdentity(e.to_string());

    let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(identity_err)?;
    socket
        .connect(ROUTE_PROBE_ADDR)
        .await
        .map_err(identity_err)?;

    match socket.local_addr().map_err(identity_err)? {
        SocketAddr::V4(addr) if !addr.ip().is_unspecified() => Ok(*addr.ip()),
        other => Err(SearchError::LocalIdentity(format!(
            "no usable IPv4 route, got {other}"
        ))),
    }
}
