//! Outbound packet boundary
//!
//! Searches decide *what* to send through [`PacketSender`]; the service
//! decides *when* bytes hit the socket. [`Outbox`] bridges the two by
//! encoding requests into a bounded queue of datagrams that the service
//! loop flushes after every event.

use kadseek_proto::messages::KADEMLIA_FIND_VALUE;
use kadseek_proto::{Contact, Kad2Req, Kad2SearchKeyReq, KadId, KadMessage};
use std::collections::VecDeque;
use std::net::SocketAddrV4;

/// Default number of datagrams an [`Outbox`] queues between flushes
pub const DEFAULT_OUTBOX_CAPACITY: usize = 1024;

/// Sink for the two requests a search issues
pub trait PacketSender {
    /// Ask `contact` for peers closer to `target`
    fn send_find_closer(&mut self, contact: &Contact, target: &KadId);

    /// Ask `contact` for files published under `target`
    fn send_search_keyword(&mut self, contact: &Contact, target: &KadId);
}

/// An encoded datagram waiting to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Destination endpoint
    pub to: SocketAddrV4,
    /// Encoded KAD datagram
    pub payload: Vec<u8>,
}

/// Bounded queue of encoded requests
#[derive(Debug)]
pub struct Outbox {
    queue: VecDeque<Datagram>,
    capacity: usize,
    dropped: u64,
}

impl Outbox {
    /// Create an outbox holding at most `capacity` datagrams
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity.min(DEFAULT_OUTBOX_CAPACITY)),
            capacity,
            dropped: 0,
        }
    }

    fn push(&mut self, contact: &Contact, msg: &KadMessage) {
        if self.queue.len() >= self.capacity {
            self.dropped += 1;
            tracing::warn!(peer = %contact.udp_addr(), op = msg.name(), "outbox full, dropping request");
            return;
        }
        match msg.encode() {
            Ok(payload) => {
                tracing::trace!(peer = %contact.udp_addr(), op = msg.name(), len = payload.len(), "queued request");
                self.queue.push_back(Datagram {
                    to: contact.udp_addr(),
                    payload,
                });
            }
            Err(err) => {
                tracing::warn!(error = %err, op = msg.name(), "failed to encode request");
            }
        }
    }

    /// Take every queued datagram in send order
    pub fn drain(&mut self) -> Vec<Datagram> {
        self.queue.drain(..).collect()
    }

    /// Number of queued datagrams
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Datagrams dropped because the queue was full
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOX_CAPACITY)
    }
}

impl PacketSender for Outbox {
    fn send_find_closer(&mut self, contact: &Contact, target: &KadId) {
        let msg = KadMessage::Kad2Req(Kad2Req {
            kind: KADEMLIA_FIND_VALUE,
            target: *target,
            receiver: contact.id,
        });
        self.push(contact, &msg);
    }

    fn send_search_keyword(&mut self, contact: &Contact, target: &KadId) {
        let msg = KadMessage::Kad2SearchKeyReq(Kad2SearchKeyReq {
            target: *target,
            start_position: 0,
        });
        self.push(contact, &msg);
    }
}
