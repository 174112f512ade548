//! Search submission and result collection
//!
//! A caller hands the service a [`SearchRequest`] carrying the keywords and
//! the sending half of a bounded channel. Results arrive as batches of
//! [`FileLink`]s. The caller side waits with [`await_results`], which ends
//! after a quiet period and tells "nothing found" apart from "found some".

use crate::link::FileLink;
use std::time::Duration;
use tokio::sync::mpsc;

/// Capacity of a result sink
pub const SEARCH_RESP_CHANNEL_SIZE: usize = 100;

/// Default quiet period after which a caller stops waiting
pub const DEFAULT_RESULT_WAIT: Duration = Duration::from_secs(10);

/// A batch of results for one caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResponse {
    /// Newly discovered files
    pub file_links: Vec<FileLink>,
}

/// Keywords plus the sink that receives their results
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Keywords; each becomes its own search target
    pub keywords: Vec<String>,
    /// Where result batches are delivered
    pub resp_tx: mpsc::Sender<SearchResponse>,
}

impl SearchRequest {
    /// Create a request and the receiver for its results
    #[must_use]
    pub fn new(keywords: Vec<String>) -> (Self, mpsc::Receiver<SearchResponse>) {
        Self::with_capacity(keywords, SEARCH_RESP_CHANNEL_SIZE)
    }

    /// Create a request whose sink holds `capacity` batches
    #[must_use]
    pub fn with_capacity(
        keywords: Vec<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<SearchResponse>) {
        let (resp_tx, resp_rx) = mpsc::channel(capacity.max(1));
        (Self { keywords, resp_tx }, resp_rx)
    }
}

/// How a wait for results ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// No result arrived before the first timeout
    NoResults,
    /// At least one result arrived
    Finished {
        /// Number of links delivered
        found: usize,
    },
}

/// Drain result batches until `idle_timeout` passes without one
///
/// Every link is passed to `on_link` in arrival order. The wait also ends
/// when the sending side is dropped.
pub async fn await_results<F>(
    rx: &mut mpsc::Receiver<SearchResponse>,
    idle_timeout: Duration,
    mut on_link: F,
) -> SearchOutcome
where
    F: FnMut(&FileLink),
{
    let mut found = 0usize;
    loop {
        match tokio::time::timeout(idle_timeout, rx.recv()).await {
            Ok(Some(batch)) => {
                found += batch.file_links.len();
                batch.file_links.iter().for_each(&mut on_link);
            }
            Ok(None) => break,
            Err(_) => {
                tracing::debug!(found, "no further results within timeout");
                break;
            }
        }
    }

    if found == 0 {
        SearchOutcome::NoResults
    } else {
        SearchOutcome::Finished { found }
    }
}
