//! # parley-shared
//!
//! Types shared by every Parley crate: participant identities, the
//! conversation key derived from two of them, and the constants the
//! store, core and front-end agree on.

pub mod constants;
pub mod error;
pub mod resolver;
pub mod types;

pub use error::IdentityError;
pub use resolver::resolve_key;
pub use types::{ConversationKey, Identity};
