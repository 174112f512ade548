//! Peer record exchanged in KAD responses and read from nodes.dat.

use crate::codec::{ByteReader, ByteWriter};
use crate::error::Result;
use crate::kad_id::KadId;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

/// A KAD peer: identifier plus IPv4 endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Contact {
    /// Overlay identifier
    pub id: KadId,
    /// IPv4 address
    pub ip: Ipv4Addr,
    /// UDP port for KAD traffic
    pub udp_port: u16,
    /// TCP port of the peer's ed2k client
    pub tcp_port: u16,
    /// KAD protocol version advertised by the peer
    pub version: u8,
}

impl Contact {
    /// Size of a contact entry in a `KADEMLIA2_RES` body
    pub const WIRE_LEN: usize = 16 + 4 + 2 + 2 + 1;

    /// Create a contact with no TCP port and version 0
    #[must_use]
    pub const fn new(id: KadId, ip: Ipv4Addr, udp_port: u16) -> Self {
        Self {
            id,
            ip,
            udp_port,
            tcp_port: 0,
            version: 0,
        }
    }

    /// Where KAD datagrams for this peer go
    #[must_use]
    pub const fn udp_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.ip, self.udp_port)
    }

    /// Whether the endpoint is usable for sending
    #[must_use]
    pub fn is_routable(&self) -> bool {
        !self.ip.is_unspecified() && !self.ip.is_broadcast() && self.udp_port != 0
    }

    /// Decode one contact entry (id, ip, udp, tcp, version)
    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self> {
        let id = KadId::from_wire(r.read_array()?);
        let ip = Ipv4Addr::from(r.read_u32()?);
        let udp_port = r.read_u16()?;
        let tcp_port = r.read_u16()?;
        let version = r.read_u8()?;
        Ok(Self {
            id,
            ip,
            udp_port,
            tcp_port,
            version,
        })
    }

    /// Encode one contact entry
    pub fn encode(&self, w: &mut ByteWriter<'_>) -> Result<()> {
        w.write_bytes(&self.id.to_wire())?;
        w.write_u32(u32::from(self.ip))?;
        w.write_u16(self.udp_port)?;
        w.write_u16(self.tcp_port)?;
        w.write_u8(self.version)
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.udp_addr())
    }
}
