//! # parley
//!
//! Terminal front-end for Parley conversations.
//!
//! Runs against a local SQLite database, so two terminals pointed at the
//! same file act as the two sides of a conversation. Usage:
//!
//! ```text
//! parley [identity]
//! ```
//!
//! Configuration comes from `PARLEY_*` environment variables, see
//! [`parley_core::ChatConfig`].

mod app;
mod commands;

use std::future::pending;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use parley_core::{ChatConfig, ChatSession, ConversationList, ListEvent, SessionEvent};
use parley_store::{Database, LocalStore};

use crate::app::Flow;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var). Logs go to stderr so
    //    they do not mix with the conversation.
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("parley_cli=debug,parley_core=debug,parley_store=info,warn")
        }))
        .init();

    info!("Starting Parley v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration and open the store
    // -----------------------------------------------------------------------
    let config = ChatConfig::from_env();
    info!(?config, "Loaded configuration");

    let db = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    info!(path = ?db.path(), "Database opened");
    let store = LocalStore::new(db).with_subscription_buffer(config.subscription_buffer);

    let identity = app::initial_identity(std::env::args().nth(1), config.identity.clone());
    let mut app = app::build(store, identity.clone(), &config);

    match identity {
        Some(identity) => println!("Signed in as {identity}. Type /help for commands."),
        None => println!("Not signed in. Use /login <id>, or /help for commands."),
    }

    // -----------------------------------------------------------------------
    // 3. Event loop: typed lines, inbox updates, transcript updates
    // -----------------------------------------------------------------------
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if app.handle_line(&line).await? == Flow::Quit {
                    break;
                }
            }
            event = next_list_event(&mut app.list) => app.on_list_event(event),
            event = next_session_event(&mut app.session) => app.on_session_event(event),
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    if let Some(mut session) = app.session.take() {
        session.close();
    }
    Ok(())
}

/// Next inbox event; never resolves once the inbox has nothing left to say.
async fn next_list_event(list: &mut ConversationList) -> ListEvent {
    match list.next_update().await {
        Some(event) => event,
        None => pending().await,
    }
}

/// Next event of the open conversation; never resolves when none is open.
async fn next_session_event(session: &mut Option<ChatSession>) -> SessionEvent {
    let Some(session) = session.as_mut() else {
        return pending().await;
    };
    match session.next_update().await {
        Some(event) => event,
        None => pending().await,
    }
}
