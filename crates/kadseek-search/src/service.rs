//! KAD search service
//!
//! A single task owns the search manager, the contact book and the outbox.
//! Everything else talks to it through a [`ServiceHandle`]:
//!
//! ```text
//!  ServiceHandle ──cmd──▶ ┌────────────┐ ──datagrams──▶ UDP socket
//!                         │ KadService │
//!  UDP socket ──recv────▶ │  (loop)    │ ──batches────▶ result sinks
//!  tick ────────────────▶ └────────────┘
//! ```
//!
//! The loop is split into synchronous `handle_*` steps so tests can drive
//! it without a socket.

use crate::error::{Result, SearchError};
use crate::guard::GuardConfig;
use crate::manager::SearchManager;
use crate::processor::{DEFAULT_OUTBOX_CAPACITY, Datagram, Outbox};
use crate::request::{SearchRequest, SearchResponse};
use crate::routing::{ContactBook, DEFAULT_BOOK_CAPACITY};
use crate::search::SearchConfig;
use kadseek_proto::{Contact, DEFAULT_UDP_PORT, KadMessage, MAX_DATAGRAM_SIZE};
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Capacity of the command channel
const COMMAND_CHANNEL_SIZE: usize = 64;

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Local UDP port
    pub udp_port: u16,
    /// Interval between expiry sweeps
    pub tick_interval: Duration,
    /// Datagrams queued between flushes
    pub outbox_capacity: usize,
    /// Contacts kept in the contact book
    pub contact_capacity: usize,
    /// Search tuning
    pub search: SearchConfig,
    /// Request guard tuning
    pub guard: GuardConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            udp_port: DEFAULT_UDP_PORT,
            tick_interval: Duration::from_secs(1),
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            contact_capacity: DEFAULT_BOOK_CAPACITY,
            search: SearchConfig::default(),
            guard: GuardConfig::default(),
        }
    }
}

/// Commands accepted by the service loop
#[derive(Debug)]
pub enum ServiceCommand {
    /// Start a search
    Search(SearchRequest),
    /// Seed the contact book
    AddContacts(Vec<Contact>),
    /// Stop the loop
    Shutdown,
}

/// Cloneable handle to a running service
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    cmd_tx: mpsc::Sender<ServiceCommand>,
    sink_capacity: usize,
}

impl ServiceHandle {
    /// Submit a search and get the receiver for its results
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::ServiceStopped`] if the loop has exited.
    pub async fn search(&self, keywords: Vec<String>) -> Result<mpsc::Receiver<SearchResponse>> {
        let (request, rx) = SearchRequest::with_capacity(keywords, self.sink_capacity);
        self.send(ServiceCommand::Search(request)).await?;
        Ok(rx)
    }

    /// Add contacts to the service's contact book
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::ServiceStopped`] if the loop has exited.
    pub async fn add_contacts(&self, contacts: Vec<Contact>) -> Result<()> {
        self.send(ServiceCommand::AddContacts(contacts)).await
    }

    /// Ask the loop to stop
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::ServiceStopped`] if the loop has already exited.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(ServiceCommand::Shutdown).await
    }

    async fn send(&self, cmd: ServiceCommand) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| SearchError::ServiceStopped)
    }
}

/// Whether the loop should keep running after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep going
    Continue,
    /// Stop the loop
    Stop,
}

/// The search service state
#[derive(Debug)]
pub struct KadService {
    config: ServiceConfig,
    manager: SearchManager,
    contacts: ContactBook,
    outbox: Outbox,
}

impl KadService {
    /// Create a service, its handle and the command receiver to pass to
    /// [`KadService::run`]
    #[must_use]
    pub fn new(config: ServiceConfig) -> (Self, ServiceHandle, mpsc::Receiver<ServiceCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let handle = ServiceHandle {
            cmd_tx,
            sink_capacity: config.search.sink_capacity,
        };
        let service = Self {
            manager: SearchManager::new(config.search.clone(), config.guard.clone()),
            contacts: ContactBook::new(config.contact_capacity),
            outbox: Outbox::new(config.outbox_capacity),
            config,
        };
        (service, handle, cmd_rx)
    }

    /// Apply one command
    pub fn handle_command(&mut self, cmd: ServiceCommand, now: Instant) -> Flow {
        match cmd {
            ServiceCommand::Search(request) => {
                self.manager
                    .new_search(request, &self.contacts, &mut self.outbox, now);
            }
            ServiceCommand::AddContacts(contacts) => {
                let offered = contacts.len();
                let added = self.contacts.extend(contacts);
                tracing::debug!(offered, added, total = self.contacts.len(), "contacts added");
            }
            ServiceCommand::Shutdown => return Flow::Stop,
        }
        Flow::Continue
    }

    /// Process one inbound datagram
    ///
    /// Malformed or unexpected datagrams are logged and dropped.
    pub fn handle_datagram(&mut self, from: SocketAddr, bytes: &[u8], now: Instant) {
        let msg = match KadMessage::decode(bytes) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::debug!(error = %err, peer = %from, len = bytes.len(), "dropping undecodable datagram");
                return;
            }
        };
        tracing::trace!(peer = %from, op = msg.name(), "received");

        match msg {
            KadMessage::Kad2Res(res) => {
                if !self.manager.add_closer_response(&res, &mut self.outbox, now) {
                    self.contacts.extend(res.contacts);
                }
            }
            KadMessage::Kad2SearchRes(res) => self.manager.add_search_response(&res),
            other => {
                tracing::trace!(peer = %from, op = other.name(), "ignoring request");
            }
        }
    }

    /// Expire finished searches
    pub fn handle_tick(&mut self, now: Instant) {
        self.manager.tick(now);
    }

    /// Datagrams produced since the last call
    pub fn take_outbound(&mut self) -> Vec<Datagram> {
        self.outbox.drain()
    }

    /// Search manager state
    #[must_use]
    pub const fn manager(&self) -> &SearchManager {
        &self.manager
    }

    /// Contact book state
    #[must_use]
    pub const fn contacts(&self) -> &ContactBook {
        &self.contacts
    }

    async fn flush(&mut self, socket: &UdpSocket) {
        for datagram in self.outbox.drain() {
            if let Err(err) = socket.send_to(&datagram.payload, datagram.to).await {
                tracing::debug!(error = %err, peer = %datagram.to, "send failed");
            }
        }
    }

    /// Run the loop until shutdown or until every handle is dropped
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Io`] if the socket fails. Errors that concern a
    /// single datagram, such as an ICMP port-unreachable reported back on
    /// the socket, are logged and the loop keeps running.
    pub async fn run(
        mut self,
        socket: UdpSocket,
        mut cmd_rx: mpsc::Receiver<ServiceCommand>,
    ) -> Result<()> {
        let mut tick = tokio::time::interval(self.config.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        tracing::info!(
            local = %socket.local_addr()?,
            contacts = self.contacts.len(),
            "kad service started"
        );

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        tracing::debug!("all service handles dropped");
                        break;
                    };
                    if self.handle_command(cmd, Instant::now()) == Flow::Stop {
                        break;
                    }
                }

                _ = tick.tick() => {
                    self.handle_tick(Instant::now());
                }

                recv = socket.recv_from(&mut buf) => match recv {
                    Ok((len, from)) => self.handle_datagram(from, &buf[..len], Instant::now()),
                    Err(err) if is_transient(&err) => {
                        tracing::debug!(error = %err, "recv failed, continuing");
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "socket failed");
                        return Err(err.into());
                    }
                },
            }

            self.flush(&socket).await;
        }

        tracing::info!(dropped = self.outbox.dropped(), "kad service stopped");
        Ok(())
    }
}

/// Receive errors caused by one peer or one datagram rather than the socket
fn is_transient(err: &io::Error) -> bool {
    // WSAEMSGSIZE: datagram larger than the receive buffer
    if cfg!(windows) && err.raw_os_error() == Some(10040) {
        return true;
    }
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use kadseek_proto::hash::keyword_target;
    use kadseek_proto::{FileRecord, Kad2Res, Kad2SearchRes, KadId, SearchResult};
    use std::net::Ipv4Addr;

    fn peer_addr() -> SocketAddr {
        SocketAddr::from(([10, 0, 0, 9], 4672))
    }

    fn seed(service: &mut KadService, n: u8) {
        let contacts = (1..=n)
            .map(|i| Contact::new(KadId::random(), Ipv4Addr::new(10, 0, 0, i), 4672))
            .collect();
        service.handle_command(ServiceCommand::AddContacts(contacts), Instant::now());
    }

    #[test]
    fn test_search_command_queues_requests() {
        let (mut service, _handle, _rx) = KadService::new(ServiceConfig::default());
        seed(&mut service, 3);

        let (req, _results) = SearchRequest::new(vec!["debian".into()]);
        let flow = service.handle_command(ServiceCommand::Search(req), Instant::now());

        assert_eq!(flow, Flow::Continue);
        assert_eq!(service.take_outbound().len(), 3);
        assert!(service.take_outbound().is_empty());
    }

    #[test]
    fn test_shutdown_stops() {
        let (mut service, _handle, _rx) = KadService::new(ServiceConfig::default());
        assert_eq!(
            service.handle_command(ServiceCommand::Shutdown, Instant::now()),
            Flow::Stop
        );
    }

    #[test]
    fn test_search_response_delivered() {
        let (mut service, _handle, _rx) = KadService::new(ServiceConfig::default());
        let (req, mut results) = SearchRequest::new(vec!["debian".into()]);
        service.handle_command(ServiceCommand::Search(req), Instant::now());

        let record = FileRecord {
            hash: [3; 16],
            name: "debian-12.iso".into(),
            size: 600_000_000,
            file_type: None,
            avail: 12,
            media_length: 0,
        };
        let datagram = KadMessage::Kad2SearchRes(Kad2SearchRes {
            sender: KadId::random(),
            target: keyword_target("debian"),
            results: vec![SearchResult {
                answer: KadId::from_bytes(record.hash),
                tags: record.to_tags(),
            }],
        })
        .encode_packed()
        .unwrap();

        service.handle_datagram(peer_addr(), &datagram, Instant::now());
        let batch = results.try_recv().unwrap();
        assert_eq!(batch.file_links[0].name, "debian-12.iso");
        assert_eq!(batch.file_links[0].avail, 12);
    }

    #[test]
    fn test_unclaimed_contacts_go_to_book() {
        let (mut service, _handle, _rx) = KadService::new(ServiceConfig::default());
        let datagram = KadMessage::Kad2Res(Kad2Res {
            target: KadId::random(),
            contacts: vec![Contact::new(KadId::random(), Ipv4Addr::new(5, 6, 7, 8), 4672)],
        })
        .encode()
        .unwrap();

        service.handle_datagram(peer_addr(), &datagram, Instant::now());
        assert_eq!(service.contacts().len(), 1);
        assert!(service.take_outbound().is_empty());
    }

    #[test]
    fn test_garbage_ignored() {
        let subscriber = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::TRACE)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let (mut service, _handle, _rx) = KadService::new(ServiceConfig::default());
            service.handle_datagram(peer_addr(), &[0xE4], Instant::now());
            service.handle_datagram(peer_addr(), &[0x00, 0x01, 0x02], Instant::now());
            assert!(service.take_outbound().is_empty());
        });
    }

    #[tokio::test]
    async fn test_handle_fails_after_stop() {
        let (_service, handle, rx) = KadService::new(ServiceConfig::default());
        drop(rx);
        assert!(matches!(
            handle.search(vec!["x".into()]).await,
            Err(SearchError::ServiceStopped)
        ));
    }

    #[tokio::test]
    async fn test_run_over_loopback() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let (service, handle, cmd_rx) = KadService::new(ServiceConfig::default());
        let task = tokio::spawn(service.run(socket, cmd_rx));

        let mut results = handle.search(vec!["nothing".into()]).await.unwrap();
        handle.shutdown().await.unwrap();
        task.await.unwrap().unwrap();

        // the loop dropped the search and its sink on exit
        assert!(results.recv().await.is_none());
    }

    #[test]
    fn test_transient_errors() {
        assert!(is_transient(&io::Error::from(io::ErrorKind::ConnectionRefused)));
        assert!(is_transient(&io::Error::from(io::ErrorKind::ConnectionReset)));
        assert!(is_transient(&io::Error::from(io::ErrorKind::Interrupted)));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }

    #[tokio::test]
    async fn test_survives_port_unreachable() {
        // a closed port: bind, remember the address, drop
        let closed = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let closed_addr = closed.local_addr().unwrap();
        drop(closed);

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.connect(closed_addr).await.unwrap();
        socket.send(b"ping").await.unwrap();

        let (service, handle, cmd_rx) = KadService::new(ServiceConfig::default());
        let task = tokio::spawn(service.run(socket, cmd_rx));

        // give the loop time to see the refused send
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!task.is_finished());

        let _results = handle.search(vec!["still alive".into()]).await.unwrap();
        handle.shutdown().await.unwrap();
        task.await.unwrap().unwrap();
    }
}
