//! Authenticated identity provider.

use std::sync::Arc;

use tokio::sync::watch;

use parley_shared::Identity;

/// Source of the signed-in identity and of sign-in / sign-out
/// notifications.
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Option<Identity>;

    /// A receiver that is marked changed on every sign-in or sign-out.
    fn watch(&self) -> watch::Receiver<Option<Identity>>;
}

/// In-process identity provider. Clones share the same state.
#[derive(Debug, Clone)]
pub struct AuthSession {
    tx: Arc<watch::Sender<Option<Identity>>>,
}

impl AuthSession {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn signed_in(identity: Identity) -> Self {
        let session = Self::new();
        session.sign_in(identity);
        session
    }

    pub fn sign_in(&self, identity: Identity) {
        tracing::info!(identity = %identity, "signed in");
        self.tx.send_replace(Some(identity));
    }

    pub fn sign_out(&self) {
        if self.tx.send_replace(None).is_some() {
            tracing::info!("signed out");
        }
    }
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for AuthSession {
    fn current(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn watchers_see_sign_in_and_out() {
        let auth = AuthSession::new();
        let mut rx = auth.watch();
        assert_eq!(auth.current(), None);

        let u1 = Identity::parse("u1").unwrap();
        auth.sign_in(u1.clone());
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some(u1));

        auth.sign_out();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), None);
        assert_eq!(auth.current(), None);
    }
}
