//! One keyword search session
//!
//! A session lives from creation until its expiry instant. While alive it
//! fans requests out to candidate peers and accumulates the files they
//! report, deduplicated by content hash. Peers whose identifier is far from
//! the target are asked for closer peers; near ones are asked directly for
//! files.

use crate::guard::{RequestGuard, RequestKind};
use crate::link::FileLink;
use crate::processor::PacketSender;
use crate::request::SearchResponse;
use kadseek_proto::{Contact, FileRecord, KadId};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Search tuning
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Lifetime of a session
    pub expiry: Duration,
    /// Leading-chunk distance at or below which a peer is queried directly
    pub tolerance: u32,
    /// Peers a session records before ignoring further candidates
    pub max_contacts: usize,
    /// Files a session stores before ignoring further results
    pub max_files: usize,
    /// Capacity of a caller's result sink
    pub sink_capacity: usize,
    /// Contacts requested from the contact source for a new target
    pub initial_candidates: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(10),
            tolerance: 1 << 24,
            max_contacts: 512,
            max_files: 2048,
            sink_capacity: 100,
            initial_candidates: 50,
        }
    }
}

/// A keyword search session
#[derive(Debug)]
pub struct Search {
    seq: u64,
    sink: mpsc::Sender<SearchResponse>,
    keywords: Vec<String>,
    target: KadId,
    keyword: String,
    expires: Instant,
    tolerance: u32,
    max_contacts: usize,
    max_files: usize,

    files: Vec<FileRecord>,
    file_hashes: HashSet<[u8; 16]>,

    contacts: Vec<Contact>,
    contact_ips: HashSet<Ipv4Addr>,
}

impl Search {
    /// Create a session for one keyword of a request
    #[must_use]
    pub fn new(
        seq: u64,
        keyword: String,
        keywords: Vec<String>,
        target: KadId,
        sink: mpsc::Sender<SearchResponse>,
        now: Instant,
        config: &SearchConfig,
    ) -> Self {
        Self {
            seq,
            sink,
            keywords,
            target,
            keyword,
            expires: now + config.expiry,
            tolerance: config.tolerance,
            max_contacts: config.max_contacts,
            max_files: config.max_files,
            files: Vec::new(),
            file_hashes: HashSet::new(),
            contacts: Vec::new(),
            contact_ips: HashSet::new(),
        }
    }

    /// Contact every candidate not yet contacted
    ///
    /// Denied sends still mark the peer as contacted.
    pub fn go_search(
        &mut self,
        candidates: &[Contact],
        guard: &mut RequestGuard,
        sender: &mut dyn PacketSender,
        now: Instant,
    ) {
        for contact in candidates {
            if self.contacts.len() >= self.max_contacts {
                tracing::debug!(keyword = %self.keyword, "contact limit reached");
                break;
            }
            if self.contact_ips.contains(&contact.ip) {
                continue;
            }

            let tolerance = self
                .target
                .distance(&contact.id)
                .get_32bit_chunk(0)
                .unwrap_or(u32::MAX);

            if tolerance > self.tolerance {
                if guard.can_pass(now, contact.ip, RequestKind::FindCloser) {
                    sender.send_find_closer(contact, &self.target);
                }
            } else if guard.can_pass(now, contact.ip, RequestKind::SearchKeyword) {
                tracing::debug!(keyword = %self.keyword, peer = %contact.udp_addr(), tolerance, "querying peer");
                sender.send_search_keyword(contact, &self.target);
            }

            self.contacts.push(*contact);
            self.contact_ips.insert(contact.ip);
        }
    }

    /// Store files not seen before and return them
    pub fn add_files(&mut self, files: Vec<FileRecord>) -> Vec<FileRecord> {
        let mut fresh = Vec::new();
        for file in files {
            if self.files.len() >= self.max_files {
                tracing::debug!(keyword = %self.keyword, "file limit reached");
                break;
            }
            if !self.file_hashes.insert(file.hash) {
                continue;
            }
            self.files.push(file.clone());
            fresh.push(file);
        }
        fresh
    }

    /// Project a record for this session's caller
    #[must_use]
    pub fn convert_to_file_link(&self, record: &FileRecord) -> Option<FileLink> {
        FileLink::from_record(record)
    }

    /// Project records, dropping the unclassifiable ones
    #[must_use]
    pub fn convert_to_file_links(&self, records: &[FileRecord]) -> Vec<FileLink> {
        records
            .iter()
            .filter_map(|r| self.convert_to_file_link(r))
            .collect()
    }

    /// Deliver links to this session's sink without blocking
    ///
    /// Returns `false` when nothing was delivered because the sink is full
    /// or closed. Empty batches are never sent.
    pub fn notify(&self, file_links: Vec<FileLink>) -> bool {
        if file_links.is_empty() {
            return false;
        }
        match self.sink.try_send(SearchResponse { file_links }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(seq = self.seq, keyword = %self.keyword, "result sink full, dropping batch");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::trace!(seq = self.seq, "result sink closed");
                false
            }
        }
    }

    /// Whether the session is past its expiry at `now`
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires
    }

    /// Sequence number assigned by the manager
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// Keyword this session searches for
    #[must_use]
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// All keywords of the originating request
    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Target identifier
    #[must_use]
    pub const fn target(&self) -> &KadId {
        &self.target
    }

    /// Expiry instant
    #[must_use]
    pub const fn expires(&self) -> Instant {
        self.expires
    }

    /// Files discovered so far, in arrival order
    #[must_use]
    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    /// Peers contacted so far, in contact order
    #[must_use]
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }
}
