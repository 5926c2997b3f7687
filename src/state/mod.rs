mod answer;
mod player;
mod question;
mod session;

pub use question::{QuestionPage, DEFAULT_PAGE_LIMIT};

use crate::protocol::ServerMessage;
use crate::storage::{DiskStore, ObjectStore};
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Shared application state: the four authoritative collections plus the
/// change feed. All mutation goes through the command methods in the
/// submodules; every mutation is followed by a change event on the feed.
#[derive(Clone)]
pub struct AppState {
    pub questions: Arc<RwLock<HashMap<QuestionId, Question>>>,
    pub sessions: Arc<RwLock<HashMap<SessionId, GameSession>>>,
    pub players: Arc<RwLock<HashMap<PlayerId, Player>>>,
    pub answers: Arc<RwLock<HashMap<AnswerId, PlayerAnswer>>>,
    /// Change feed delivered to every attached client.
    pub broadcast: broadcast::Sender<ServerMessage>,
    /// Host-only feed carrying unredacted records.
    pub host_broadcast: broadcast::Sender<ServerMessage>,
    /// Image store backing question uploads.
    pub storage: Arc<dyn ObjectStore>,
}

impl AppState {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(100);
        let (host_tx, _host_rx) = broadcast::channel(100);
        Self {
            questions: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            players: Arc::new(RwLock::new(HashMap::new())),
            answers: Arc::new(RwLock::new(HashMap::new())),
            broadcast: tx,
            host_broadcast: host_tx,
            storage: Arc::new(DiskStore::new("uploads", "/uploads")),
        }
    }

    /// Swap in the configured storage backend. `new` defaults to the disk
    /// store so tests and local runs need no setup.
    pub fn with_storage(mut self, storage: Arc<dyn ObjectStore>) -> Self {
        self.storage = storage;
        self
    }

    /// Open a change-feed subscription. Dropping the receiver unsubscribes.
    /// Consumers must apply events idempotently; a slow consumer can lag and
    /// observe a gap, which it recovers from with a snapshot.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<ServerMessage> {
        self.broadcast.subscribe()
    }

    pub fn subscribe_host(&self) -> broadcast::Receiver<ServerMessage> {
        self.host_broadcast.subscribe()
    }

    /// Send errors only mean nobody is attached right now.
    pub fn broadcast_change(&self, msg: ServerMessage) {
        let _ = self.broadcast.send(msg);
    }

    pub fn broadcast_to_host(&self, msg: ServerMessage) {
        let _ = self.host_broadcast.send(msg);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
