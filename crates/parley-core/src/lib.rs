//! # parley-core
//!
//! Two-party conversations between a requester and a provider.
//!
//! The pieces, leaf first:
//! - [`directory::ParticipantDirectory`] turns an identity into a display
//!   label, avatar and payment info.
//! - [`records::ConversationRecords`] owns conversation documents: lazy
//!   creation, preview and unread bookkeeping, deletion, live listing.
//! - [`stream::MessageStream`] appends to and follows a conversation's
//!   transcript.
//! - [`list::ConversationList`] is the live inbox of the signed-in user.
//! - [`session::ChatSession`] drives one open conversation screen.
//!
//! [`Messenger`] wires them to a [`parley_store::DocumentStore`] and an
//! [`identity::IdentityProvider`].

pub mod config;
pub mod directory;
pub mod error;
pub mod identity;
pub mod list;
pub mod messenger;
pub mod records;
pub mod session;
pub mod stream;

#[cfg(test)]
mod testing;

pub use config::ChatConfig;
pub use directory::{CounterpartHint, ParticipantDirectory, ParticipantDisplay};
pub use error::{ChatError, Result};
pub use identity::{AuthSession, IdentityProvider};
pub use list::{ConversationList, ConversationRow, DeleteRequest, ListEvent};
pub use messenger::Messenger;
pub use records::ConversationRecords;
pub use session::{ChatSession, SessionEvent, SessionPhase, SessionTarget, SessionView};
pub use stream::MessageStream;
