//! Cancellable set of scheduled transitions for one device.

use tokio::sync::watch;
use tokio::task::AbortHandle;

/// Token handed to a scheduled cycle.
///
/// A cycle may only apply a stage while its token is still current. Cancelling
/// the set invalidates every token issued before it, so a stage whose timer
/// already fired but has not yet acquired the device state is dropped too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken(u64);

/// Owned set of pending timers.
///
/// Whether anything is pending is also published on a watch channel, so
/// callers can wait for the set to drain without polling.
#[derive(Debug)]
pub struct TimerSet {
    generation: u64,
    handles: Vec<AbortHandle>,
    pending: watch::Sender<bool>,
}

impl Default for TimerSet {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerSet {
    pub fn new() -> Self {
        Self {
            generation: 0,
            handles: Vec::new(),
            pending: watch::Sender::new(false),
        }
    }

    /// Token for the timers about to be scheduled.
    pub fn token(&self) -> TimerToken {
        TimerToken(self.generation)
    }

    pub fn is_current(&self, token: TimerToken) -> bool {
        token.0 == self.generation
    }

    /// Track a scheduled task so it can be aborted as part of the set.
    pub fn track(&mut self, handle: AbortHandle) {
        self.handles.retain(|h| !h.is_finished());
        self.handles.push(handle);
        self.pending.send_replace(true);
    }

    /// Drop the bookkeeping for a cycle that ran to completion.
    pub fn complete(&mut self, token: TimerToken) {
        if self.is_current(token) {
            self.handles.clear();
            self.pending.send_replace(false);
        }
    }

    /// Cancel every pending timer and clear the set.
    ///
    /// Returns how many timers were still pending. Calling it on an empty set
    /// is a no-op apart from invalidating outstanding tokens.
    pub fn cancel_all(&mut self) -> usize {
        self.generation = self.generation.wrapping_add(1);
        let pending = self.handles.iter().filter(|h| !h.is_finished()).count();
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        self.pending.send_replace(false);
        pending
    }

    pub fn has_pending(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }

    /// Receiver that reads `true` while a cycle is scheduled.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.pending.subscribe()
    }
}
