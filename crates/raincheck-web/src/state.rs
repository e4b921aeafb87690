//! Shared application state for the web server.
//!
//! [`AppState`] is cloned into every handler. It is built once at startup
//! from the server configuration; nothing in it is a process global.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use raincheck_protocol::Stats;
use raincheck_store::CredentialStore;

use crate::analysis::AnalysisBackend;
use crate::auth::DEFAULT_TIMEOUT;

/// Shared state accessible from every Axum handler.
#[derive(Clone)]
pub struct AppState {
    /// Issued token lifecycle, shared with the issued-token gate.
    pub credentials: CredentialStore,

    /// Where review requests are sent.
    pub analysis: Arc<dyn AnalysisBackend>,

    pub counters: Arc<Counters>,

    /// Bound on credential store calls made by handlers.
    pub store_timeout: Duration,
}

impl AppState {
    pub fn new(credentials: CredentialStore, analysis: Arc<dyn AnalysisBackend>) -> Self {
        Self {
            credentials,
            analysis,
            counters: Arc::new(Counters::default()),
            store_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }
}

/// Service-wide visitor and analysis counts. Reset on restart.
#[derive(Debug, Default)]
pub struct Counters {
    visitors: AtomicU64,
    analyses: AtomicU64,
}

impl Counters {
    pub fn record_analysis(&self) {
        self.analyses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Stats {
        Stats {
            visitors: self.visitors.load(Ordering::Relaxed),
            analyses: self.analyses.load(Ordering::Relaxed),
        }
    }

    /// Overwrite both counts, as the website does after counting a visit.
    pub fn set(&self, stats: Stats) {
        self.visitors.store(stats.visitors, Ordering::Relaxed);
        self.analyses.store(stats.analyses, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_and_overwrite() {
        let counters = Counters::default();
        counters.record_analysis();
        counters.record_analysis();
        assert_eq!(
            counters.snapshot(),
            Stats {
                visitors: 0,
                analyses: 2
            }
        );

        counters.set(Stats {
            visitors: 10,
            analyses: 3,
        });
        counters.record_analysis();
        assert_eq!(counters.snapshot().analyses, 4);
        assert_eq!(counters.snapshot().visitors, 10);
    }
}
