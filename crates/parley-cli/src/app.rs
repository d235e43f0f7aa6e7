//! Terminal front-end state: the inbox, at most one open conversation and a
//! pending delete confirmation.

use std::sync::Arc;

use tracing::{debug, info};

use parley_core::{
    AuthSession, ChatError, ChatSession, ConversationList, CounterpartHint, DeleteRequest,
    ListEvent, Messenger, SessionEvent, SessionPhase,
};
use parley_shared::{ConversationKey, Identity};
use parley_store::{DocumentStore, Listing, LocalStore, PaymentInfo, PaymentMethod, Profile};

use crate::commands::{Command, HELP};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App {
    store: LocalStore,
    auth: AuthSession,
    messenger: Messenger,
    pub list: ConversationList,
    pub session: Option<ChatSession>,
    pending_delete: Option<DeleteRequest>,
    /// Messages of the open conversation already printed.
    printed: usize,
}

impl App {
    pub fn new(store: LocalStore, auth: AuthSession, messenger: Messenger) -> Self {
        let list = messenger.conversation_list();
        Self {
            store,
            auth,
            messenger,
            list,
            session: None,
            pending_delete: None,
            printed: 0,
        }
    }

    pub async fn handle_line(&mut self, line: &str) -> anyhow::Result<Flow> {
        let Some(command) = Command::parse(line) else {
            return Ok(Flow::Continue);
        };
        debug!(?command, "command");

        match command {
            Command::Help => println!("{HELP}"),
            Command::Quit => return Ok(Flow::Quit),
            Command::Login(raw) => match Identity::parse(raw) {
                Ok(identity) => self.auth.sign_in(identity),
                Err(e) => println!("! invalid identity: {e}"),
            },
            Command::Logout => self.auth.sign_out(),
            Command::Profile { first, last } => self.update_profile(|profile| {
                profile.first_name = Some(first);
                profile.last_name = Some(last);
            })
            .await?,
            Command::Payment {
                network,
                name,
                number,
            } => self.update_profile(|profile| {
                profile.payment = Some(PaymentInfo::Method(PaymentMethod {
                    network: Some(network),
                    account_name: Some(name),
                    number: Some(number),
                }));
            })
            .await?,
            Command::Listing(service) => match self.messenger.current_identity() {
                Some(me) => {
                    self.store.put_listing(&Listing::new(me, service.clone()))?;
                    println!("Listed \"{service}\".");
                }
                None => println!("! {}", ChatError::SignedOut.user_message()),
            },
            Command::List => self.print_rows(),
            Command::Open { counterpart, hint } => {
                let hint = hint.map(CounterpartHint::named).unwrap_or_default();
                let session = self
                    .messenger
                    .open_or_create_conversation(&counterpart, hint)
                    .await;
                self.show_session(session);
            }
            Command::Chat(raw) => match ConversationKey::parse(&raw) {
                Ok(key) => {
                    let session = self.messenger.open_conversation(key).await;
                    self.show_session(session);
                }
                Err(e) => println!("! not a conversation key: {e}"),
            },
            Command::Close => self.close_session(),
            Command::Retry => match self.session.as_mut() {
                Some(session) => {
                    let phase = session.retry().await;
                    self.print_phase(phase);
                }
                None => println!("No open conversation."),
            },
            Command::Pay => match &self.session {
                Some(session) => println!("{}", session.payment_summary()),
                None => println!("No open conversation."),
            },
            Command::Delete(raw) => {
                let request = ConversationKey::parse(&raw)
                    .ok()
                    .and_then(|key| self.list.request_delete(&key));
                match request {
                    Some(request) => {
                        println!("{}: {} (/yes or /no)", request.title(), request.prompt());
                        self.pending_delete = Some(request);
                    }
                    None => println!("! no conversation {raw} in your list"),
                }
            }
            Command::Confirm => match self.pending_delete.take() {
                Some(request) => {
                    let key = request.key.clone();
                    match self.list.confirm_delete(request).await {
                        Ok(_) => {
                            if self.session.as_ref().and_then(ChatSession::key) == Some(&key) {
                                self.close_session();
                            }
                            println!("Deleted.");
                        }
                        Err(e) => println!("! {}", e.user_message()),
                    }
                }
                None => println!("Nothing to confirm."),
            },
            Command::Cancel => {
                if self.pending_delete.take().is_some() {
                    println!("Cancelled.");
                }
            }
            Command::Say(text) => self.send(text).await,
            Command::Unknown(input) => println!("Unknown command: {input} (try /help)"),
        }
        Ok(Flow::Continue)
    }

    pub fn on_list_event(&mut self, event: ListEvent) {
        match event {
            ListEvent::Rows(_) => {
                // Rows change on every send; only report what is unread.
                let unread: u32 = self.list.rows().iter().map(|r| r.unread_count).sum();
                if unread > 0 && self.session.is_none() {
                    println!("({unread} unread, /list to see)");
                }
            }
            ListEvent::Failed(e) => println!("! {}", e.user_message()),
            ListEvent::Resubscribed(me) => println!("Signed in as {me}."),
            ListEvent::SignedOut => println!("Signed out."),
        }
    }

    pub fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Messages(_) => self.print_new_messages(),
            SessionEvent::Errored(e) => {
                println!("! {}", e.user_message());
                if e.is_retryable() {
                    println!("  (/retry to try again)");
                }
            }
            SessionEvent::SignedOut => self.close_session(),
            SessionEvent::Reopened(phase) => {
                self.printed = 0;
                self.print_phase(phase);
            }
        }
    }

    async fn send(&mut self, text: String) {
        let Some(session) = self.session.as_mut() else {
            println!("No open conversation. Use /open <id> first.");
            return;
        };
        session.set_draft(text);
        if let Err(e) = session.send_draft().await {
            println!("! {}", e.send_failure_message());
        }
    }

    async fn update_profile(&self, edit: impl FnOnce(&mut Profile)) -> anyhow::Result<()> {
        let Some(me) = self.messenger.current_identity() else {
            println!("! {}", ChatError::SignedOut.user_message());
            return Ok(());
        };
        let mut profile = self
            .store
            .get_profile(&me)
            .await?
            .unwrap_or_else(|| Profile::new(me.clone()));
        edit(&mut profile);
        self.store.put_profile(&profile)?;
        info!(identity = %me, "profile updated");
        println!("Profile saved.");
        Ok(())
    }

    fn show_session(&mut self, session: ChatSession) {
        self.close_session();
        let phase = session.phase();
        self.session = Some(session);
        self.printed = 0;
        self.print_phase(phase);
    }

    fn close_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
            println!("Conversation closed.");
        }
        self.printed = 0;
    }

    fn print_phase(&self, phase: SessionPhase) {
        let Some(session) = &self.session else {
            return;
        };
        let view = session.view();
        match phase {
            SessionPhase::Active => println!(
                "-- {} ({}) --",
                view.counterpart_name.as_deref().unwrap_or_default(),
                view.key.as_ref().map(ConversationKey::as_str).unwrap_or_default()
            ),
            SessionPhase::AwaitingIdentity => println!("Sign in with /login <id> first."),
            _ => {
                if let Some(text) = view.error_text {
                    println!("! {text}");
                }
            }
        }
    }

    fn print_new_messages(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        let messages = session.messages();
        if messages.len() < self.printed {
            self.printed = 0;
        }
        let me = self.messenger.current_identity();
        let them = session
            .counterpart()
            .map(|c| c.display_name.clone())
            .unwrap_or_default();
        for message in &messages[self.printed..] {
            let who = if Some(&message.sender_id) == me.as_ref() {
                "you"
            } else {
                them.as_str()
            };
            println!(
                "[{}] {who}: {}",
                message.created_at.with_timezone(&chrono::Local).format("%H:%M"),
                message.text
            );
        }
        self.printed = messages.len();
    }

    fn print_rows(&self) {
        let rows = self.list.rows();
        if rows.is_empty() {
            println!("No conversations.");
            return;
        }
        for row in rows {
            let badge = match row.unread_count {
                0 => String::new(),
                n => format!(" [{n}]"),
            };
            println!(
                "{}  {}{badge}\n    {}",
                row.key, row.counterpart_display, row.last_message_preview
            );
        }
    }
}

/// Identity to start with: the first argument, else `PARLEY_IDENTITY`.
pub fn initial_identity(arg: Option<String>, configured: Option<String>) -> Option<Identity> {
    arg.or(configured).and_then(|raw| match Identity::parse(raw) {
        Ok(identity) => Some(identity),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring invalid startup identity");
            None
        }
    })
}

pub fn build(store: LocalStore, identity: Option<Identity>, config: &parley_core::ChatConfig) -> App {
    let auth = match identity {
        Some(identity) => AuthSession::signed_in(identity),
        None => AuthSession::new(),
    };
    let messenger =
        Messenger::new(Arc::new(store.clone()), Arc::new(auth.clone())).with_config(config);
    App::new(store, auth, messenger)
}
