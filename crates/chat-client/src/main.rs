mod connection;
mod repl;

use std::sync::Arc;

use chat_core::ports::StoragePort;
use chat_core::session_store::SessionStore;
use chat_core::state::ChatStateMachine;
use chat_platform::storage::{FileStorage, MemoryStorage};
use chat_types::config::ClientConfig;

use connection::ConnectionHandle;

/// An explicitly configured data directory must be usable; the platform
/// default may not resolve at all, in which case chats live only for the
/// session.
fn open_storage(config: &ClientConfig) -> Arc<dyn StoragePort> {
    match &config.data_dir {
        Some(dir) => match FileStorage::open(dir) {
            Ok(storage) => Arc::new(storage),
            Err(e) => {
                eprintln!("startup failed: {e}");
                std::process::exit(1);
            }
        },
        None => match FileStorage::open_default() {
            Ok(storage) => Arc::new(storage),
            Err(e) => {
                log::warn!("no persistent storage, keeping chats in memory: {e}");
                Arc::new(MemoryStorage::new())
            }
        },
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_target(false)
        .init();

    let config = ClientConfig::from_env();

    let store = SessionStore::new(open_storage(&config));
    let machine = ChatStateMachine::load(store).await;

    let handle = match ConnectionHandle::connect(&config.server_url) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("startup failed: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = repl::run(machine, handle).await {
        eprintln!("client exited with an error: {e}");
        std::process::exit(1);
    }
}
