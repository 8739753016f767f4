//! Current authenticated identity, with a change observer.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use utoipa::ToSchema;

/// An authenticated identity as resolved by the external auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    /// Opaque provider-assigned id.
    pub id: String,
    /// Display name shown to other participants.
    pub display_name: String,
    /// Avatar reference, if any.
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Holds the signed-in identity for the process lifetime.
///
/// The auth provider itself is external; this state receives its results and
/// fans them out. Observers see every change, including the initial `None`.
#[derive(Debug)]
pub struct SessionState {
    current: watch::Sender<Option<Identity>>,
}

impl Default for SessionState {
    fn default() -> Self {
        let (current, _rx) = watch::channel(None);
        Self { current }
    }
}

impl SessionState {
    /// Start signed out.
    pub fn new() -> Self {
        Self::default()
    }

    /// The identity currently signed in, if any.
    pub fn current(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    /// Id of the signed-in identity, if any.
    pub fn current_id(&self) -> Option<String> {
        self.current.borrow().as_ref().map(|i| i.id.clone())
    }

    /// Install a freshly authenticated identity.
    pub fn sign_in(&self, identity: Identity) {
        self.current.send_replace(Some(identity));
    }

    /// Clear the identity, returning what was signed in.
    pub fn sign_out(&self) -> Option<Identity> {
        self.current.send_replace(None)
    }

    /// Subscribe to identity changes.
    pub fn observe(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_and_out_round_trip() {
        let session = SessionState::new();
        assert_eq!(session.current(), None);

        let alice = Identity {
            id: "u1".into(),
            display_name: "Alice".into(),
            avatar_url: None,
        };
        session.sign_in(alice.clone());
        assert_eq!(session.current_id().as_deref(), Some("u1"));

        assert_eq!(session.sign_out(), Some(alice));
        assert_eq!(session.current(), None);
    }

    #[tokio::test]
    async fn observer_fires_on_every_change() {
        let session = SessionState::new();
        let mut observer = session.observe();
        assert_eq!(*observer.borrow_and_update(), None);

        session.sign_in(Identity {
            id: "u1".into(),
            display_name: "Alice".into(),
            avatar_url: None,
        });
        observer.changed().await.unwrap();
        assert!(observer.borrow_and_update().is_some());
    }
}
