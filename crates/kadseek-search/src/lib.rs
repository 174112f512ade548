//! # kadseek Search
//!
//! Keyword search over the KAD overlay.
//!
//! This crate provides:
//! - A request guard that throttles repeated requests to the same peer
//! - Search sessions that fan out to peers and deduplicate results
//! - A search manager merging concurrent identical searches
//! - ed2k file links with filename sanitization and classification
//! - Local identity (overlay id, UDP verify-key secret, outbound address)
//! - A single-task UDP service driving all of the above
//!
//! ## Example
//!
//! ```no_run
//! use kadseek_search::{KadService, ServiceConfig, SearchOutcome, await_results};
//! use std::time::Duration;
//! use tokio::net::UdpSocket;
//!
//! # async fn example() -> kadseek_search::Result<()> {
//! let socket = UdpSocket::bind("0.0.0.0:1979").await?;
//! let (service, handle, cmd_rx) = KadService::new(ServiceConfig::default());
//! tokio::spawn(service.run(socket, cmd_rx));
//!
//! let mut rx = handle.search(vec!["ubuntu".into()]).await?;
//! let outcome = await_results(&mut rx, Duration::from_secs(10), |link| {
//!     println!("{}", link.ed2k_link());
//! })
//! .await;
//! if outcome == SearchOutcome::NoResults {
//!     println!("nothing found");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod guard;
pub mod link;
pub mod manager;
pub mod prefs;
pub mod processor;
pub mod request;
pub mod routing;
pub mod search;
pub mod service;

pub use error::{Result, SearchError};
pub use guard::{GuardConfig, GuardMetrics, RequestGuard, RequestKind};
pub use link::{FileInfo, FileKind, FileLink, classify, ed2k_link};
pub use manager::SearchManager;
pub use prefs::{Prefs, UdpSecret, detect_local_ip};
pub use processor::{Datagram, Outbox, PacketSender};
pub use request::{SearchOutcome, SearchRequest, SearchResponse, await_results};
pub use routing::{ContactBook, ContactSource};
pub use search::{Search, SearchConfig};
pub use service::{Flow, KadService, ServiceCommand, ServiceConfig, ServiceHandle};
