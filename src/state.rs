use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::routes::messages::ChatMessage;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    /// Fan-out channel for chat messages; every SSE subscriber holds a receiver.
    pub messages: broadcast::Sender<ChatMessage>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let (messages, _) = broadcast::channel(config.server.broadcast_capacity.max(1));
        Self {
            db,
            config,
            messages,
        }
    }
}
