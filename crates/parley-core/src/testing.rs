//! Fixtures shared by the unit tests of this crate.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use parley_shared::{ConversationKey, Identity};
use parley_store::{
    ConversationRecord, ConversationUpdate, DocumentStore, Listing, LocalStore, Message,
    NewConversation, PaymentInfo, PaymentMethod, Profile, StoreError, Subscription,
};

type StoreResult<T> = parley_store::Result<T>;

pub fn id(raw: &str) -> Identity {
    Identity::parse(raw).unwrap()
}

/// In-memory store with two profiles:
/// - `u1`: Ama Mensah, a requester with an avatar.
/// - `u2`: Kojo Boateng, a provider with a "Plumbing" listing and a
///   mobile-money payment method.
pub fn seeded_store() -> LocalStore {
    let store = LocalStore::open_in_memory().unwrap();

    let mut requester = Profile::new(id("u1"));
    requester.first_name = Some("Ama".into());
    requester.last_name = Some("Mensah".into());
    requester.profile_image = Some("https://img.example/u1.png".into());
    store.put_profile(&requester).unwrap();

    let mut provider = Profile::new(id("u2"));
    provider.first_name = Some("Kojo".into());
    provider.last_name = Some("Boateng".into());
    provider.payment = Some(PaymentInfo::Method(PaymentMethod {
        network: Some("MTN".into()),
        account_name: Some("Kojo Boateng".into()),
        number: Some("0240000000".into()),
    }));
    store.put_profile(&provider).unwrap();
    store.put_listing(&Listing::new(id("u2"), "Plumbing")).unwrap();

    store
}

/// A [`DocumentStore`] that forwards to a [`LocalStore`] unless told to
/// fail, and counts the calls it sees.
pub struct FlakyStore {
    pub inner: LocalStore,
    /// Every call fails with `Unavailable`.
    pub offline: AtomicBool,
    /// Only `append_message` fails with `Unavailable`.
    pub fail_appends: AtomicBool,
    /// Only `update_conversation` fails with `Unavailable`.
    pub fail_updates: AtomicBool,
    /// Every conversation call is refused.
    pub deny: AtomicBool,
    pub appends: AtomicUsize,
    pub creates: AtomicUsize,
    pub profile_reads: AtomicUsize,
    scripted_messages: Mutex<Option<mpsc::Receiver<StoreResult<Vec<Message>>>>>,
}

impl FlakyStore {
    pub fn new(inner: LocalStore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            offline: AtomicBool::new(false),
            fail_appends: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
            deny: AtomicBool::new(false),
            appends: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
            profile_reads: AtomicUsize::new(0),
            scripted_messages: Mutex::new(None),
        })
    }

    pub fn set(flag: &AtomicBool, on: bool) {
        flag.store(on, Ordering::SeqCst);
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// The next `watch_messages` call returns a subscription fed by the
    /// returned sender instead of the real store.
    pub fn script_next_message_watch(&self) -> mpsc::Sender<StoreResult<Vec<Message>>> {
        let (tx, rx) = mpsc::channel(16);
        *self.scripted_messages.lock().unwrap() = Some(rx);
        tx
    }

    fn check(&self, extra: Option<&AtomicBool>) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) || extra.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            return Err(StoreError::Unavailable("connection lost".into()));
        }
        if self.deny.load(Ordering::SeqCst) {
            return Err(StoreError::AccessDenied("missing or insufficient permissions".into()));
        }
        Ok(())
    }

    fn check_read(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection lost".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get_conversation(
        &self,
        actor: &Identity,
        key: &ConversationKey,
    ) -> StoreResult<Option<ConversationRecord>> {
        self.check(None)?;
        self.inner.get_conversation(actor, key).await
    }

    async fn create_conversation(
        &self,
        actor: &Identity,
        draft: NewConversation,
    ) -> StoreResult<ConversationRecord> {
        self.check(None)?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create_conversation(actor, draft).await
    }

    async fn update_conversation(
        &self,
        actor: &Identity,
        key: &ConversationKey,
        update: ConversationUpdate,
    ) -> StoreResult<ConversationRecord> {
        self.check(Some(&self.fail_updates))?;
        self.inner.update_conversation(actor, key, update).await
    }

    async fn delete_conversation(
        &self,
        actor: &Identity,
        key: &ConversationKey,
    ) -> StoreResult<bool> {
        self.check(None)?;
        self.inner.delete_conversation(actor, key).await
    }

    fn watch_conversations(&self, participant: &Identity) -> Subscription<Vec<ConversationRecord>> {
        self.inner.watch_conversations(participant)
    }

    async fn append_message(
        &self,
        actor: &Identity,
        key: &ConversationKey,
        text: &str,
    ) -> StoreResult<Message> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        self.check(Some(&self.fail_appends))?;
        self.inner.append_message(actor, key, text).await
    }

    fn watch_messages(&self, actor: &Identity, key: &ConversationKey) -> Subscription<Vec<Message>> {
        match self.scripted_messages.lock().unwrap().take() {
            Some(rx) => Subscription::from_channel(rx),
            None => self.inner.watch_messages(actor, key),
        }
    }

    async fn get_profile(&self, identity: &Identity) -> StoreResult<Option<Profile>> {
        self.check_read()?;
        self.profile_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_profile(identity).await
    }

    async fn find_listing_by_owner(&self, owner: &Identity) -> StoreResult<Option<Listing>> {
        self.check_read()?;
        self.inner.find_listing_by_owner(owner).await
    }
}
