//! duochat - two-party terminal chat client
//!
//! Loads history over HTTP and exchanges live messages over a Socket.IO channel.

mod api;
mod auth;
mod channel;
mod chat;
mod config;
mod models;
mod tui;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::api::{HistoryClient, HistoryService, SignedOut};
use crate::auth::TokenStore;
use crate::channel::SocketIoConnector;
use crate::chat::{ChatSession, ChatView};
use crate::config::Config;
use crate::models::{ConversationProps, Participant};

#[derive(Parser)]
#[command(name = "duochat")]
#[command(about = "Terminal client for one-to-one chat", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Chat service base URL for this run
    #[arg(long, global = true)]
    endpoint: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a bearer token
    Login {
        /// Token issued by the chat service
        #[arg(short, long)]
        token: String,

        /// Seconds until the token expires
        #[arg(long)]
        expires_in: Option<u64>,
    },

    /// Clear the stored token
    Logout,

    /// Show endpoint, identity and token state
    Status,

    /// Set the local participant identity
    Whoami {
        /// Your participant id
        #[arg(long)]
        id: String,

        /// Your participant role
        #[arg(long)]
        role: String,
    },

    /// Print the conversation with another participant
    History {
        receiver_id: String,
        receiver_role: String,
    },

    /// Send one message
    Send {
        receiver_id: String,
        receiver_role: String,

        /// Message content
        message: String,
    },

    /// Print incoming messages until Ctrl-C
    Listen,

    /// Launch the terminal chat view
    Tui {
        receiver_id: String,
        receiver_role: String,

        /// Display name of the other participant
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // The TUI owns the terminal, so its logs go to an in-memory buffer.
    let log_buffer = matches!(cli.command, Commands::Tui { .. }).then(tui::LogBuffer::new);
    match &log_buffer {
        Some(buffer) => tracing_subscriber::registry()
            .with(env_filter())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(buffer.clone()),
            )
            .init(),
        None => tracing_subscriber::registry()
            .with(env_filter())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }

    let mut config = Config::load()?;
    if let Some(endpoint) = &cli.endpoint {
        config.override_endpoint(endpoint.as_str());
    }

    match cli.command {
        Commands::Login { token, expires_in } => {
            auth::login(&token, expires_in)?;
        }
        Commands::Logout => {
            auth::logout()?;
        }
        Commands::Status => {
            auth::status(&config)?;
        }
        Commands::Whoami { id, role } => {
            let me = Participant::new(id, role);
            config.set_participant(&me);
            config.save()?;
            println!("Identity set to {} ({})", me.id, me.role);
        }
        Commands::History {
            receiver_id,
            receiver_role,
        } => {
            api::read_history(&config, Participant::new(receiver_id, receiver_role)).await?;
        }
        Commands::Send {
            receiver_id,
            receiver_role,
            message,
        } => {
            tracing::info!("Sending message...");
            let receiver = Participant::new(receiver_id, receiver_role);
            channel::send_once(&config, receiver, &message).await?;
        }
        Commands::Listen => {
            channel::listen(&config).await?;
        }
        Commands::Tui {
            receiver_id,
            receiver_role,
            name,
        } => {
            let props = ConversationProps::new(
                config.participant()?,
                Participant::new(receiver_id, receiver_role),
                name.as_deref().unwrap_or_default(),
            );
            let session = build_session(&config, props)?;
            let logs = log_buffer.unwrap_or_default();
            tui::run(session, logs).await?;
        }
    }

    Ok(())
}

/// Wire a chat session to the configured endpoint and credential.
fn build_session(config: &Config, props: ConversationProps) -> Result<ChatSession> {
    let endpoint = config.endpoint();
    let credential = config.credential();

    let history: Arc<dyn HistoryService> = match &credential {
        Some(credential) => Arc::new(HistoryClient::new(&endpoint, credential.clone())?),
        None => Arc::new(SignedOut),
    };
    let connector = Arc::new(SocketIoConnector::new(endpoint));
    let view = ChatView::new(props, credential).with_policy(config.history_policy);

    Ok(ChatSession::new(view, connector, history))
}
