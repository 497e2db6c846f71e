//! Typed session notifications.
//!
//! Views subscribe to learn about sign-in, sign-out, refreshed tokens and
//! profile edits instead of polling the token store. `LoginRequired` is the
//! signal to navigate to the login view after the session could not be
//! recovered.

use tokio::sync::broadcast;
use tracing::trace;

use crate::models::User;

/// Buffer for the session event channel.
/// Session events are rare; slow subscribers that fall this far behind only lose old events.
const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Login or register succeeded
    SignedIn { user_id: i64 },
    /// A refresh stored a new credential pair
    TokensRefreshed,
    /// Logout or logout-all cleared the session
    SignedOut,
    /// The session expired and could not be refreshed
    LoginRequired,
    /// The signed-in user's profile changed
    ProfileUpdated { user: User },
}

#[derive(Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Publish to current subscribers. Having none is fine.
    pub fn publish(&self, event: SessionEvent) {
        trace!(?event, "Publishing session event");
        let _ = self.tx.send(event);
    }
}
