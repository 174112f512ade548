//! Search manager
//!
//! Indexes live sessions by target. Identical concurrent searches share one
//! set of overlay requests: the first session for a target is canonical and
//! drives the network, later ones are passive and only receive results. A
//! target's whole list is dropped once its most recent session expires.
//!
//! All mutation happens on the service loop, so nothing here is shared.

use crate::guard::{GuardConfig, RequestGuard};
use crate::processor::PacketSender;
use crate::request::SearchRequest;
use crate::routing::ContactSource;
use crate::search::{Search, SearchConfig};
use kadseek_proto::hash::keyword_target;
use kadseek_proto::{Contact, Kad2Res, Kad2SearchRes, KadId};
use std::collections::HashMap;
use std::time::Instant;

/// Owner of every live search session
#[derive(Debug)]
pub struct SearchManager {
    config: SearchConfig,
    guard: RequestGuard,
    search_count: u64,
    searches: HashMap<KadId, Vec<Search>>,
}

impl SearchManager {
    /// Create an empty manager
    #[must_use]
    pub fn new(config: SearchConfig, guard: GuardConfig) -> Self {
        Self {
            config,
            guard: RequestGuard::new(guard),
            search_count: 0,
            searches: HashMap::new(),
        }
    }

    /// Start a session per keyword of `request`
    ///
    /// A keyword whose target already has sessions joins them passively and
    /// immediately receives what the canonical session has found so far.
    pub fn new_search(
        &mut self,
        request: SearchRequest,
        contacts: &dyn ContactSource,
        sender: &mut dyn PacketSender,
        now: Instant,
    ) {
        for keyword in &request.keywords {
            let seq = self.search_count;
            self.search_count += 1;

            let target = keyword_target(keyword);
            let search = Search::new(
                seq,
                keyword.clone(),
                request.keywords.clone(),
                target,
                request.resp_tx.clone(),
                now,
                &self.config,
            );

            let sessions = self.searches.entry(target).or_default();
            sessions.push(search);

            if let [canonical] = sessions.as_mut_slice() {
                let candidates = contacts.closest(&target, self.config.initial_candidates);
                tracing::info!(keyword = %keyword, target_id = %target, candidates = candidates.len(), "new search");
                canonical.go_search(&candidates, &mut self.guard, sender, now);
            } else if let (Some(canonical), Some(joined)) = (sessions.first(), sessions.last()) {
                tracing::info!(keyword = %keyword, target_id = %target, sessions = sessions.len(), "joining ongoing search");
                joined.notify(joined.convert_to_file_links(canonical.files()));
            }
        }
    }

    /// Merge a search response into the sessions for its target
    ///
    /// Newly seen files are pushed to every session's sink.
    pub fn add_search_response(&mut self, msg: &Kad2SearchRes) {
        let Some(sessions) = self.searches.get_mut(&msg.target) else {
            tracing::trace!(target_id = %msg.target, "search response for unknown target");
            return;
        };
        let Some(canonical) = sessions.first_mut() else {
            return;
        };

        let fresh = canonical.add_files(msg.files());
        if fresh.is_empty() {
            return;
        }
        tracing::debug!(keyword = canonical.keyword(), new_files = fresh.len(), "search results");

        for session in sessions.iter() {
            session.notify(session.convert_to_file_links(&fresh));
        }
    }

    /// Continue a search with the closer peers a node reported
    ///
    /// Returns `false` when no session exists for the target, so the caller
    /// can route the contacts elsewhere.
    pub fn add_closer_response(
        &mut self,
        msg: &Kad2Res,
        sender: &mut dyn PacketSender,
        now: Instant,
    ) -> bool {
        let Some(canonical) = self
            .searches
            .get_mut(&msg.target)
            .and_then(|sessions| sessions.first_mut())
        else {
            return false;
        };

        canonical.go_search(&msg.contacts, &mut self.guard, sender, now);
        true
    }

    /// Drop targets whose most recent session has expired
    pub fn tick(&mut self, now: Instant) {
        self.searches.retain(|target, sessions| {
            let alive = sessions.last().is_some_and(|s| !s.is_expired(now));
            if !alive {
                tracing::debug!(target_id = %target, sessions = sessions.len(), "search expired");
            }
            alive
        });
        self.guard.purge(now);
    }

    /// Targets with live sessions
    #[must_use]
    pub fn active_targets(&self) -> Vec<KadId> {
        self.searches.keys().copied().collect()
    }

    /// Number of sessions for `target`
    #[must_use]
    pub fn session_count(&self, target: &KadId) -> usize {
        self.searches.get(target).map_or(0, Vec::len)
    }

    /// Peers contacted by the canonical session for `target`
    #[must_use]
    pub fn contacted(&self, target: &KadId) -> &[Contact] {
        self.searches
            .get(target)
            .and_then(|sessions| sessions.first())
            .map(Search::contacts)
            .unwrap_or_default()
    }

    /// Request guard shared by all sessions
    #[must_use]
    pub const fn guard(&self) -> &RequestGuard {
        &self.guard
    }
}

impl Default for SearchManager {
    fn default() -> Self {
        Self::new(SearchConfig::default(), GuardConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::Outbox;
    use crate::routing::ContactBook;
    use kadseek_proto::{FileRecord, SearchResult};
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn book(n: u8) -> ContactBook {
        let mut book = ContactBook::default();
        book.extend((1..=n).map(|i| Contact::new(KadId::random(), Ipv4Addr::new(10, 0, 0, i), 4672)));
        book
    }

    fn response(target: KadId, records: &[FileRecord]) -> Kad2SearchRes {
        Kad2SearchRes {
            sender: KadId::random(),
            target,
            results: records
                .iter()
                .map(|r| SearchResult {
                    answer: KadId::from_bytes(r.hash),
                    tags: r.to_tags(),
                })
                .collect(),
        }
    }

    fn record(n: u8) -> FileRecord {
        FileRecord {
            hash: [n; 16],
            name: format!("track{n}.mp3"),
            size: 4_000_000,
            file_type: Some("Audio".into()),
            avail: 2,
            media_length: 180,
        }
    }

    #[test]
    fn test_identical_searches_share_requests() {
        let mut manager = SearchManager::default();
        let book = book(5);
        let mut outbox = Outbox::default();
        let now = Instant::now();

        let (first, _rx1) = SearchRequest::new(vec!["ubuntu".into()]);
        manager.new_search(first, &book, &mut outbox, now);
        assert_eq!(outbox.len(), 5);

        let (second, _rx2) = SearchRequest::new(vec!["ubuntu".into()]);
        manager.new_search(second, &book, &mut outbox, now);
        assert_eq!(outbox.len(), 5);

        let target = keyword_target("ubuntu");
        assert_eq!(manager.session_count(&target), 2);
        assert_eq!(manager.active_targets(), vec![target]);
    }

    #[test]
    fn test_one_session_per_keyword() {
        let mut manager = SearchManager::default();
        let (req, _rx) = SearchRequest::new(vec!["a".into(), "b".into()]);
        manager.new_search(req, &book(1), &mut Outbox::default(), Instant::now());

        assert_eq!(manager.session_count(&keyword_target("a")), 1);
        assert_eq!(manager.session_count(&keyword_target("b")), 1);
    }

    #[test]
    fn test_results_fan_out_once() {
        let mut manager = SearchManager::default();
        let mut outbox = Outbox::default();
        let now = Instant::now();
        let target = keyword_target("music");

        let (r1, mut rx1) = SearchRequest::new(vec!["music".into()]);
        let (r2, mut rx2) = SearchRequest::new(vec!["music".into()]);
        manager.new_search(r1, &book(1), &mut outbox, now);
        manager.new_search(r2, &book(1), &mut outbox, now);

        manager.add_search_response(&response(target, &[record(1), record(2)]));
        manager.add_search_response(&response(target, &[record(2)]));

        for rx in [&mut rx1, &mut rx2] {
            let batch = rx.try_recv().unwrap();
            assert_eq!(batch.file_links.len(), 2);
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn test_late_joiner_gets_replay_on_own_sink() {
        let mut manager = SearchManager::default();
        let mut outbox = Outbox::default();
        let now = Instant::now();
        let target = keyword_target("film");

        let (r1, mut rx1) = SearchRequest::new(vec!["film".into()]);
        manager.new_search(r1, &book(1), &mut outbox, now);
        manager.add_search_response(&response(target, &[record(7)]));
        assert_eq!(rx1.try_recv().unwrap().file_links.len(), 1);

        let (r2, mut rx2) = SearchRequest::new(vec!["film".into()]);
        manager.new_search(r2, &book(1), &mut outbox, now);

        let replay = rx2.try_recv().unwrap();
        assert_eq!(replay.file_links[0].hash, [7; 16]);
        assert!(rx1.try_recv().is_err());
    }

    #[test]
    fn test_unknown_target_ignored() {
        let mut manager = SearchManager::default();
        manager.add_search_response(&response(KadId::random(), &[record(1)]));

        let res = Kad2Res {
            target: KadId::random(),
            contacts: Vec::new(),
        };
        assert!(!manager.add_closer_response(&res, &mut Outbox::default(), Instant::now()));
        assert!(manager.active_targets().is_empty());
    }

    #[test]
    fn test_closer_response_continues_search() {
        let mut manager = SearchManager::default();
        let mut outbox = Outbox::default();
        let now = Instant::now();
        let (req, _rx) = SearchRequest::new(vec!["iso".into()]);
        manager.new_search(req, &ContactBook::default(), &mut outbox, now);
        assert!(outbox.is_empty());

        let target = keyword_target("iso");
        let res = Kad2Res {
            target,
            contacts: vec![Contact::new(KadId::random(), Ipv4Addr::new(1, 1, 1, 1), 4672)],
        };
        assert!(manager.add_closer_response(&res, &mut outbox, now));
        assert_eq!(outbox.len(), 1);
        assert_eq!(manager.contacted(&target).len(), 1);
    }

    #[test]
    fn test_expiry_uses_latest_session() {
        let mut manager = SearchManager::default();
        let mut outbox = Outbox::default();
        let start = Instant::now();
        let target = keyword_target("linux");

        let (r1, _rx1) = SearchRequest::new(vec!["linux".into()]);
        manager.new_search(r1, &book(2), &mut outbox, start);
        let (r2, _rx2) = SearchRequest::new(vec!["linux".into()]);
        manager.new_search(r2, &book(2), &mut outbox, start + Duration::from_secs(5));

        // first session expired, latest still alive
        manager.tick(start + Duration::from_secs(10));
        assert_eq!(manager.session_count(&target), 2);

        manager.tick(start + Duration::from_secs(15));
        assert_eq!(manager.session_count(&target), 0);

        // a fresh search after expiry becomes canonical again
        outbox.drain();
        let later = start + Duration::from_secs(20);
        let (r3, _rx3) = SearchRequest::new(vec!["linux".into()]);
        manager.new_search(r3, &book(2), &mut outbox, later);
        assert_eq!(manager.session_count(&target), 1);
        assert_eq!(outbox.len(), 2);
    }

    #[test]
    fn test_full_sink_drops_batch() {
        let mut manager = SearchManager::default();
        let target = keyword_target("full");
        let (req, mut rx) = SearchRequest::with_capacity(vec!["full".into()], 1);
        manager.new_search(req, &book(1), &mut Outbox::default(), Instant::now());

        manager.add_search_response(&response(target, &[record(1)]));
        manager.add_search_response(&response(target, &[record(2)]));

        assert_eq!(rx.try_recv().unwrap().file_links[0].hash, [1; 16]);
        assert!(rx.try_recv().is_err());
        // the dropped batch is still recorded
        assert_eq!(manager.searches[&target][0].files().len(), 2);
    }
}
