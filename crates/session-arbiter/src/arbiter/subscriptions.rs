//! Per-session notification subscriptions
//!
//! A subscription is opened when a session is accepted as a candidate and
//! closed when the session reaches a terminal state. Notifications for
//! sessions without an open subscription are dropped, so handlers never run
//! for sessions that were already evicted.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};

use crate::session::{CallSession, PeerConnectionId, SessionId, SessionRole, SessionState};

pub(crate) struct Subscription {
    pub session: Weak<dyn CallSession>,
    pub role: SessionRole,
    pub state: SessionState,
    pub peer: Option<PeerConnectionId>,
    /// Tracks arriving on `peer` go to the remote sink
    pub remote_binding_armed: bool,
    /// Hung up by us; waiting for its terminal notification
    pub terminated_locally: bool,
    pub subscribed_at: DateTime<Utc>,
}

#[derive(Default)]
pub(crate) struct SubscriptionTable {
    by_session: HashMap<SessionId, Subscription>,
    by_peer: HashMap<PeerConnectionId, SessionId>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if `id` is already subscribed
    pub fn subscribe(&mut self, id: SessionId, role: SessionRole, session: &Arc<dyn CallSession>) -> bool {
        if self.by_session.contains_key(&id) {
            return false;
        }
        self.by_session.insert(
            id,
            Subscription {
                session: Arc::downgrade(session),
                role,
                state: SessionState::Created,
                peer: None,
                remote_binding_armed: false,
                terminated_locally: false,
                subscribed_at: Utc::now(),
            },
        );
        true
    }

    pub fn unsubscribe(&mut self, id: &SessionId) -> Option<Subscription> {
        let subscription = self.by_session.remove(id)?;
        if let Some(peer) = &subscription.peer {
            self.by_peer.remove(peer);
        }
        Some(subscription)
    }

    pub fn get(&self, id: &SessionId) -> Option<&Subscription> {
        self.by_session.get(id)
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Subscription> {
        self.by_session.get_mut(id)
    }

    pub fn is_subscribed(&self, id: &SessionId) -> bool {
        self.by_session.contains_key(id)
    }

    /// Route tracks from `peer` to session `id` and arm remote binding
    pub fn bind_peer(&mut self, id: &SessionId, peer: PeerConnectionId) -> bool {
        let Some(subscription) = self.by_session.get_mut(id) else {
            return false;
        };
        if let Some(previous) = subscription.peer.replace(peer.clone()) {
            self.by_peer.remove(&previous);
        }
        subscription.remote_binding_armed = true;
        self.by_peer.insert(peer, id.clone());
        true
    }

    pub fn session_for_peer(&self, peer: &PeerConnectionId) -> Option<&SessionId> {
        self.by_peer.get(peer)
    }

    /// Strong handle to the session, if the external layer still holds it
    pub fn upgrade(&self, id: &SessionId) -> Option<Arc<dyn CallSession>> {
        self.by_session.get(id).and_then(|s| s.session.upgrade())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SessionId, &Subscription)> {
        self.by_session.iter()
    }

    pub fn len(&self) -> usize {
        self.by_session.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use crate::session::CallOptions;

    #[derive(Debug)]
    struct Stub(SessionId);

    impl CallSession for Stub {
        fn id(&self) -> &SessionId {
            &self.0
        }
        fn answer(&self, _options: &CallOptions) -> Result<(), SessionError> {
            Ok(())
        }
        fn terminate(&self) -> Result<(), SessionError> {
            Ok(())
        }
    }

    fn stub(id: &str) -> Arc<dyn CallSession> {
        Arc::new(Stub(SessionId::from(id)))
    }

    #[test]
    fn test_subscribe_once() {
        let session = stub("s1");
        let mut table = SubscriptionTable::new();
        assert!(table.subscribe(SessionId::from("s1"), SessionRole::Incoming, &session));
        assert!(!table.subscribe(SessionId::from("s1"), SessionRole::Incoming, &session));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_peer_index_follows_unsubscribe() {
        let session = stub("s1");
        let mut table = SubscriptionTable::new();
        table.subscribe(SessionId::from("s1"), SessionRole::Outgoing, &session);
        assert!(table.bind_peer(&SessionId::from("s1"), PeerConnectionId::from("pc-1")));
        assert_eq!(table.session_for_peer(&PeerConnectionId::from("pc-1")), Some(&SessionId::from("s1")));

        table.unsubscribe(&SessionId::from("s1"));
        assert!(table.session_for_peer(&PeerConnectionId::from("pc-1")).is_none());
    }

    #[test]
    fn test_rebinding_peer_drops_old_index() {
        let session = stub("s1");
        let mut table = SubscriptionTable::new();
        table.subscribe(SessionId::from("s1"), SessionRole::Incoming, &session);
        table.bind_peer(&SessionId::from("s1"), PeerConnectionId::from("pc-1"));
        table.bind_peer(&SessionId::from("s1"), PeerConnectionId::from("pc-2"));

        assert!(table.session_for_peer(&PeerConnectionId::from("pc-1")).is_none());
        assert!(table.session_for_peer(&PeerConnectionId::from("pc-2")).is_some());
    }

    #[test]
    fn test_reference_is_weak() {
        let session = stub("s1");
        let mut table = SubscriptionTable::new();
        table.subscribe(SessionId::from("s1"), SessionRole::Incoming, &session);
        assert!(table.upgrade(&SessionId::from("s1")).is_some());

        drop(session);
        assert!(table.upgrade(&SessionId::from("s1")).is_none());
    }
}
