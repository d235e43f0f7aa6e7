//! # parley-store
//!
//! Durable storage for Parley conversations, backed by SQLite.
//!
//! The crate has two layers. [`Database`] is a synchronous handle over a
//! `rusqlite::Connection` with typed CRUD helpers for every record kind.
//! [`LocalStore`] wraps it behind the async [`DocumentStore`] trait, adding
//! server-assigned timestamps, participant access rules and live
//! [`Subscription`]s fed by a change feed. Everything above this crate talks
//! to the trait, so a hosted backend can be swapped in without touching the
//! conversation logic.

pub mod backend;
pub mod clock;
pub mod conversations;
pub mod database;
pub mod feed;
pub mod local;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod profiles;

mod error;

pub use backend::DocumentStore;
pub use clock::ServerClock;
pub use database::Database;
pub use error::{Result, StoreError};
pub use feed::{ChangeEvent, ChangeFeed, Subscription};
pub use local::LocalStore;
pub use models::*;
