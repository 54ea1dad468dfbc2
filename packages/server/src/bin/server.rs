//! Agora chat server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin agora-server
//! cargo run --bin agora-server -- --host 0.0.0.0 --port 3000 --data-dir ./data
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use agora_server::{
    domain::{MessageKind, Username},
    infrastructure::{Stores, message_pusher::WebSocketMessagePusher},
    ui::{DEFAULT_OUTBOUND_BUFFER, Server, ServerOptions, spawn_purge_scheduler},
    usecase::{AccessPolicy, SeedHostUseCase},
};
use agora_shared::{logger::setup_logger, time::SystemClock};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "agora-server")]
#[command(about = "Realtime chat server with role-based moderation", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "AGORA_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "AGORA_PORT", default_value = "8080")]
    port: u16,

    /// Directory for users.json, bans.json, site.json and messages.jsonl (in-memory when omitted)
    #[arg(long, env = "AGORA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Capacity of each connection's outbound queue
    #[arg(long, env = "AGORA_OUTBOUND_BUFFER", default_value_t = DEFAULT_OUTBOUND_BUFFER)]
    outbound_buffer: usize,

    /// Accept users that have no account, with the `user` role
    #[arg(long, env = "AGORA_ALLOW_UNKNOWN_USERS")]
    allow_unknown_users: bool,

    /// Message category purged by the background scheduler
    #[arg(long, env = "AGORA_PURGE_CATEGORY", requires = "purge_interval_secs")]
    purge_category: Option<MessageKind>,

    /// Interval of the background purge in seconds
    #[arg(long, env = "AGORA_PURGE_INTERVAL_SECS", requires = "purge_category")]
    purge_interval_secs: Option<u64>,

    /// Host account created at startup when the directory has no host
    #[arg(long, env = "AGORA_SEED_HOST")]
    seed_host: Option<String>,

    /// Credential stored for the seeded host account
    #[arg(long, env = "AGORA_SEED_HOST_CREDENTIAL", default_value = "")]
    seed_host_credential: String,

    /// Take the client IP from `x-forwarded-for` (only behind a trusted proxy)
    #[arg(long, env = "AGORA_TRUST_FORWARDED_FOR")]
    trust_forwarded_for: bool,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    // Initialize dependencies in order:
    // 1. Stores
    // 2. MessagePusher
    // 3. Server (UseCases)
    // 4. Background tasks

    // 1. Create Stores (file-backed when a data directory is given)
    let stores = match &args.data_dir {
        Some(dir) => match Stores::open(dir).await {
            Ok(stores) => {
                tracing::info!("Using data directory {}", dir.display());
                stores
            }
            Err(e) => {
                tracing::error!("Failed to open data directory {}: {}", dir.display(), e);
                std::process::exit(1);
            }
        },
        None => {
            tracing::warn!("No data directory configured, state is kept in memory only");
            Stores::in_memory()
        }
    };

    if let Some(name) = args.seed_host {
        let username = match Username::new(name) {
            Ok(username) => username,
            Err(e) => {
                tracing::error!("Invalid seed host name: {}", e);
                std::process::exit(1);
            }
        };
        let seed = SeedHostUseCase::new(stores.directory.clone());
        if let Err(e) = seed.execute(username, args.seed_host_credential).await {
            tracing::error!("Failed to seed host account: {}", e);
            std::process::exit(1);
        }
    }

    // 2. Create MessagePusher (WebSocket implementation)
    let message_pusher = Arc::new(WebSocketMessagePusher::new());

    // 3. Create the server
    let options = ServerOptions {
        outbound_buffer: args.outbound_buffer,
        trust_forwarded_for: args.trust_forwarded_for,
        access: AccessPolicy {
            allow_unknown_users: args.allow_unknown_users,
        },
    };
    let server = Server::new(stores, message_pusher, Arc::new(SystemClock), options);

    // 4. Background purge
    if let (Some(kind), Some(secs)) = (args.purge_category, args.purge_interval_secs) {
        spawn_purge_scheduler(
            server.purge_category_usecase(),
            kind,
            Duration::from_secs(secs.max(1)),
        );
    }

    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
