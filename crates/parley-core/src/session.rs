//! One open conversation screen.
//!
//! A [`ChatSession`] moves through [`SessionPhase`]s:
//!
//! - `AwaitingIdentity`: nobody is signed in.
//! - `Resolving`: the key is being derived and the record fetched or created.
//! - `Active`: the transcript is live and sends are accepted.
//! - `Errored`: resolution or the live transcript failed. Input is disabled.
//!   A later good snapshot returns the session to `Active`; a failed
//!   resolution stays here unless it was transient and the user retries.
//! - `Closed`: the screen is gone and the transcript subscription cancelled.

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use parley_shared::constants::NO_PAYMENT_METHOD;
use parley_shared::resolver::try_resolve_key;
use parley_shared::{ConversationKey, Identity};
use parley_store::{Message, PaymentInfo, Subscription};

use crate::directory::{CounterpartHint, ParticipantDirectory, ParticipantDisplay};
use crate::error::{ChatError, Result};
use crate::identity::IdentityProvider;
use crate::records::ConversationRecords;
use crate::stream::MessageStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    AwaitingIdentity,
    Resolving,
    Active,
    Errored,
    Closed,
}

/// Where a session was opened from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTarget {
    /// A screen that references the other participant: a listing, a
    /// profile. The reference may be missing or malformed.
    Counterpart {
        reference: Option<String>,
        hint: CounterpartHint,
    },
    /// An existing inbox row.
    Conversation(ConversationKey),
}

/// What [`ChatSession::next_update`] observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new transcript snapshot with this many messages.
    Messages(usize),
    Errored(ChatError),
    SignedOut,
    /// A different identity signed in and the conversation was resolved
    /// again, ending in this phase.
    Reopened(SessionPhase),
}

/// Everything a conversation screen renders.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub phase: SessionPhase,
    pub key: Option<ConversationKey>,
    pub me: Option<Identity>,
    pub counterpart_name: Option<String>,
    pub counterpart_avatar: Option<String>,
    pub messages: Vec<Message>,
    pub draft: String,
    pub input_enabled: bool,
    pub can_send: bool,
    pub error_text: Option<String>,
}

enum Incoming {
    Identity(bool),
    Snapshot(Option<parley_store::Result<Vec<Message>>>),
}

pub struct ChatSession {
    records: ConversationRecords,
    stream: MessageStream,
    directory: ParticipantDirectory,
    identity_rx: watch::Receiver<Option<Identity>>,
    identity_open: bool,
    target: SessionTarget,
    phase: SessionPhase,
    me: Option<Identity>,
    key: Option<ConversationKey>,
    counterpart: Option<ParticipantDisplay>,
    error: Option<ChatError>,
    messages: Vec<Message>,
    draft: String,
    subscription: Option<Subscription<Vec<Message>>>,
}

impl ChatSession {
    pub fn new(
        records: ConversationRecords,
        stream: MessageStream,
        directory: ParticipantDirectory,
        identity: &dyn IdentityProvider,
        target: SessionTarget,
    ) -> Self {
        Self {
            records,
            stream,
            directory,
            identity_rx: identity.watch(),
            identity_open: true,
            target,
            phase: SessionPhase::AwaitingIdentity,
            me: None,
            key: None,
            counterpart: None,
            error: None,
            messages: Vec::new(),
            draft: String::new(),
            subscription: None,
        }
    }

    /// Resolve the conversation for the current identity and start the live
    /// transcript.
    pub async fn open(&mut self) -> SessionPhase {
        if self.phase == SessionPhase::Closed {
            return self.phase;
        }
        self.teardown();
        self.me = self.identity_rx.borrow_and_update().clone();
        match self.me.clone() {
            Some(me) => self.resolve(me).await,
            None => self.phase = SessionPhase::AwaitingIdentity,
        }
        self.phase
    }

    /// Wait for the next transcript snapshot, transcript error or identity
    /// change. `None` once the session is closed or nothing can change.
    pub async fn next_update(&mut self) -> Option<SessionEvent> {
        loop {
            if self.phase == SessionPhase::Closed {
                return None;
            }

            let incoming = match self.subscription.as_mut() {
                Some(sub) => tokio::select! {
                    changed = self.identity_rx.changed(), if self.identity_open => {
                        Incoming::Identity(changed.is_ok())
                    }
                    item = sub.next() => Incoming::Snapshot(item),
                },
                None if self.identity_open => {
                    Incoming::Identity(self.identity_rx.changed().await.is_ok())
                }
                None => return None,
            };

            match incoming {
                Incoming::Identity(false) => self.identity_open = false,
                Incoming::Identity(true) => {
                    let next = self.identity_rx.borrow_and_update().clone();
                    if next == self.me {
                        continue;
                    }
                    self.teardown();
                    self.me = next.clone();
                    return Some(match next {
                        Some(me) => {
                            info!(identity = %me, "identity changed, reopening conversation");
                            self.resolve(me).await;
                            SessionEvent::Reopened(self.phase)
                        }
                        None => {
                            info!("signed out, conversation closed");
                            self.phase = SessionPhase::AwaitingIdentity;
                            SessionEvent::SignedOut
                        }
                    });
                }
                Incoming::Snapshot(Some(Ok(messages))) => {
                    debug!(count = messages.len(), "transcript snapshot");
                    self.messages = messages;
                    self.error = None;
                    self.phase = SessionPhase::Active;
                    return Some(SessionEvent::Messages(self.messages.len()));
                }
                Incoming::Snapshot(Some(Err(err))) => {
                    let err = ChatError::from(err);
                    self.fail(err.clone());
                    return Some(SessionEvent::Errored(err));
                }
                Incoming::Snapshot(None) => {
                    self.subscription = None;
                    return None;
                }
            }
        }
    }

    /// The screen gained focus: clear the signed-in user's unread count.
    pub async fn focus(&mut self) -> Result<()> {
        if self.phase != SessionPhase::Active {
            return Ok(());
        }
        let (me, key) = self.participant_and_key()?;
        self.records.reset_unread(&key, &me).await.map_err(|err| {
            warn!(key = %key, error = %err, "could not clear unread count");
            err
        })
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Send the composer draft.
    ///
    /// A blank draft is a no-op (`Ok(None)`). On failure the draft is kept
    /// and the error returned for an alert. Once the message is appended the
    /// draft is cleared; a failure to update the conversation preview after
    /// that is only logged.
    pub async fn send_draft(&mut self) -> Result<Option<Message>> {
        if self.draft.trim().is_empty() {
            return Ok(None);
        }
        if self.phase != SessionPhase::Active {
            return Err(self.unavailable_reason());
        }
        let (me, key) = self.participant_and_key()?;

        let text = self.draft.clone();
        let message = self.stream.append(&key, &me, &text).await.map_err(|err| {
            warn!(key = %key, error = %err, "send failed, draft kept");
            err
        })?;
        self.draft.clear();

        if let Err(err) = self.records.record_send(&key, &me, &text).await {
            warn!(key = %key, error = %err, "message sent but conversation metadata not updated");
        }
        Ok(Some(message))
    }

    /// Resolve again after a transient failure. Access denials and bad
    /// references stay put.
    pub async fn retry(&mut self) -> SessionPhase {
        let retryable = self.phase == SessionPhase::Errored
            && self.error.as_ref().is_some_and(ChatError::is_retryable);
        if retryable {
            if let Some(me) = self.me.clone() {
                info!("retrying conversation");
                self.teardown();
                self.resolve(me).await;
            }
        }
        self.phase
    }

    /// Leave the screen. Idempotent; no snapshot is delivered afterwards.
    pub fn close(&mut self) {
        if self.phase == SessionPhase::Closed {
            return;
        }
        info!(key = ?self.key.as_ref().map(ConversationKey::as_str), "conversation closed");
        self.teardown();
        self.phase = SessionPhase::Closed;
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn error(&self) -> Option<&ChatError> {
        self.error.as_ref()
    }

    pub fn key(&self) -> Option<&ConversationKey> {
        self.key.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn counterpart(&self) -> Option<&ParticipantDisplay> {
        self.counterpart.as_ref()
    }

    pub fn payment(&self) -> Option<&PaymentInfo> {
        self.counterpart.as_ref().and_then(|c| c.payment.as_ref())
    }

    pub fn payment_summary(&self) -> String {
        match &self.counterpart {
            Some(counterpart) => counterpart.payment_summary(),
            None => NO_PAYMENT_METHOD.to_string(),
        }
    }

    pub fn view(&self) -> SessionView {
        let input_enabled = self.phase == SessionPhase::Active;
        SessionView {
            phase: self.phase,
            key: self.key.clone(),
            me: self.me.clone(),
            counterpart_name: self.counterpart.as_ref().map(|c| c.display_name.clone()),
            counterpart_avatar: self.counterpart.as_ref().and_then(|c| c.avatar.clone()),
            messages: self.messages.clone(),
            draft: self.draft.clone(),
            input_enabled,
            can_send: input_enabled && !self.draft.trim().is_empty(),
            error_text: match self.phase {
                SessionPhase::Errored => self.error.as_ref().map(|e| e.user_message().to_string()),
                _ => None,
            },
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn resolve(&mut self, me: Identity) {
        self.phase = SessionPhase::Resolving;
        self.error = None;

        match self.establish(&me).await {
            Ok((key, counterpart)) => {
                info!(key = %key, identity = %me, "conversation open");
                self.subscription = Some(self.stream.subscribe(&key, &me));
                self.key = Some(key);
                self.counterpart = Some(counterpart);
                self.phase = SessionPhase::Active;
                // Best effort; the failure is already logged.
                let _ = self.focus().await;
            }
            Err(err) => self.fail(err),
        }
    }

    /// Derive the key, fetch or create the record and refresh the cached
    /// label of the counterpart.
    async fn establish(&self, me: &Identity) -> Result<(ConversationKey, ParticipantDisplay)> {
        let (counterpart, hint) = match &self.target {
            SessionTarget::Counterpart { reference, hint } => {
                let raw = reference
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| {
                        ChatError::InvalidReference("no participant to message".into())
                    })?;
                (Identity::parse(raw)?, hint.clone())
            }
            SessionTarget::Conversation(key) => {
                let counterpart = key.counterpart_of(me).ok_or_else(|| {
                    ChatError::AccessDenied(format!("{me} is not a participant of {key}"))
                })?;
                (counterpart, CounterpartHint::default())
            }
        };
        let key = try_resolve_key(me, &counterpart)?;

        let their_display = self.lookup(&counterpart, &hint).await;
        let my_display = self.lookup(me, &CounterpartHint::default()).await;
        let initial_meta = BTreeMap::from([
            (me.clone(), my_display.to_meta()),
            (counterpart.clone(), their_display.to_meta()),
        ]);

        let record = self
            .records
            .get_or_create(me, &key, [me.clone(), counterpart.clone()], initial_meta)
            .await?;

        let cached = record.meta_for(&counterpart);
        let stale = cached.map_or(true, |m| {
            m.display_name.as_deref() != Some(their_display.display_name.as_str())
                || m.avatar != their_display.avatar
        });
        if their_display.known && stale {
            if let Err(err) = self.records.refresh_participant(&key, me, &their_display).await {
                warn!(key = %key, error = %err, "could not refresh counterpart label");
            }
        }

        Ok((key, their_display))
    }

    async fn lookup(&self, identity: &Identity, hint: &CounterpartHint) -> ParticipantDisplay {
        match self.directory.resolve_display(identity).await {
            Ok(display) => display.with_hint(hint),
            Err(err) => {
                warn!(identity = %identity, error = %err, "directory lookup failed, using fallback");
                self.directory.fallback(identity).with_hint(hint)
            }
        }
    }

    fn fail(&mut self, err: ChatError) {
        warn!(error = %err, "conversation errored");
        self.error = Some(err);
        self.phase = SessionPhase::Errored;
    }

    /// Cancel the transcript and forget the conversation it belonged to.
    fn teardown(&mut self) {
        if let Some(mut sub) = self.subscription.take() {
            sub.cancel();
        }
        self.messages.clear();
        self.key = None;
        self.counterpart = None;
    }

    fn participant_and_key(&self) -> Result<(Identity, ConversationKey)> {
        match (&self.me, &self.key) {
            (Some(me), Some(key)) => Ok((me.clone(), key.clone())),
            (None, _) => Err(ChatError::SignedOut),
            (Some(_), None) => Err(self.unavailable_reason()),
        }
    }

    fn unavailable_reason(&self) -> ChatError {
        match (&self.phase, &self.error) {
            (SessionPhase::AwaitingIdentity, _) => ChatError::SignedOut,
            (_, Some(err)) => err.clone(),
            _ => ChatError::Transient("conversation is not open".into()),
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
