//! Response correlator - pairs awaited responses with incoming lines
//!
//! The protocol carries no request ids, so a caller describes the line it is
//! waiting for with a [`Matcher`] and the read loop offers every received line
//! to the registry. Waiter counts stay in single digits, so matching is a
//! linear scan in registration order.

use crate::error::{Result, StormAudioError};
use crate::protocol::Matcher;
use futures_util::future::select_all;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;
use uuid::Uuid;

struct WaiterRecord {
    id: Uuid,
    matcher: Matcher,
    tx: oneshot::Sender<String>,
}

/// A registered expectation, consumed by [`Correlator::wait`] or
/// [`Correlator::wait_any`]
pub struct Waiter {
    id: Uuid,
    matcher: Matcher,
    rx: oneshot::Receiver<String>,
}

impl Waiter {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }
}

/// Removes the listed waiters when dropped, whichever way the wait ended
struct Cleanup<'a> {
    correlator: &'a Correlator,
    ids: Vec<Uuid>,
}

impl Drop for Cleanup<'_> {
    fn drop(&mut self) {
        for id in &self.ids {
            self.correlator.cancel(*id);
        }
    }
}

/// Registry of pending waiters for one device
#[derive(Default)]
pub struct Correlator {
    waiters: Mutex<Vec<WaiterRecord>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter. Do this before sending the command it answers so
    /// an immediate echo cannot slip past.
    pub fn register(&self, matcher: Matcher) -> Waiter {
        let (tx, rx) = oneshot::channel();
        let id = Uuid::new_v4();
        self.waiters.lock().push(WaiterRecord {
            id,
            matcher: matcher.clone(),
            tx,
        });
        Waiter { id, matcher, rx }
    }

    /// Offer a received line to the pending waiters.
    ///
    /// Resolves and removes the first waiter (in registration order) whose
    /// matcher fits. A line resolves at most one waiter. Returns whether one
    /// was resolved.
    pub fn notify(&self, line: &str) -> bool {
        let mut waiters = self.waiters.lock();
        // Receivers dropped without cleanup can't be resolved any more
        waiters.retain(|waiter| !waiter.tx.is_closed());

        let Some(index) = waiters.iter().position(|w| w.matcher.matches(line)) else {
            return false;
        };
        let waiter = waiters.remove(index);
        waiter.tx.send(line.to_string()).is_ok()
    }

    /// Remove a waiter without resolving it. Returns whether it was pending.
    pub fn cancel(&self, id: Uuid) -> bool {
        let mut waiters = self.waiters.lock();
        match waiters.iter().position(|w| w.id == id) {
            Some(index) => {
                waiters.remove(index);
                true
            }
            None => false,
        }
    }

    /// Drop every pending waiter; their callers see `ConnectionClosed`.
    pub fn fail_all(&self) -> usize {
        let mut waiters = self.waiters.lock();
        let count = waiters.len();
        waiters.clear();
        count
    }

    /// Number of waiters still pending
    pub fn pending(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Wait for `waiter` to be resolved, at most `limit`.
    ///
    /// The waiter is removed from the registry on every exit path, so a late
    /// line can never resolve it.
    pub async fn wait(&self, waiter: Waiter, limit: Duration) -> Result<String> {
        let _cleanup = Cleanup {
            correlator: self,
            ids: vec![waiter.id],
        };

        match timeout(limit, waiter.rx).await {
            Ok(Ok(line)) => Ok(line),
            Ok(Err(_)) => Err(StormAudioError::ConnectionClosed),
            Err(_) => Err(StormAudioError::ResponseTimeout(waiter.matcher.to_string())),
        }
    }

    /// Register a waiter for `matcher` and wait for it
    pub async fn expect(&self, matcher: Matcher, limit: Duration) -> Result<String> {
        let waiter = self.register(matcher);
        self.wait(waiter, limit).await
    }

    /// Race several waiters; the first resolved wins and the rest are removed.
    ///
    /// Returns the index of the winner within `waiters` and the matched line.
    pub async fn wait_any(&self, waiters: Vec<Waiter>, limit: Duration) -> Result<(usize, String)> {
        if waiters.is_empty() {
            return Err(StormAudioError::InvalidArgument("no waiters to race".to_string()));
        }

        let _cleanup = Cleanup {
            correlator: self,
            ids: waiters.iter().map(|w| w.id).collect(),
        };
        let description = waiters
            .iter()
            .map(|w| w.matcher.to_string())
            .collect::<Vec<_>>()
            .join(" | ");
        let receivers: Vec<_> = waiters.into_iter().map(|w| w.rx).collect();

        match timeout(limit, select_all(receivers)).await {
            Ok((Ok(line), index, _)) => Ok((index, line)),
            Ok((Err(_), _, _)) => Err(StormAudioError::ConnectionClosed),
            Err(_) => Err(StormAudioError::ResponseTimeout(description)),
        }
    }
}
