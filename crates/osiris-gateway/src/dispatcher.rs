use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::debug;
use uuid::Uuid;

use osiris_types::events::ServerEvent;

/// One user's open sockets: conn_id -> targeted sender.
struct UserConnections {
    username: String,
    senders: HashMap<Uuid, mpsc::UnboundedSender<ServerEvent>>,
}

/// Registry of connected clients. Fans events out either to everyone
/// (through a broadcast channel) or to every socket of a single user.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Every connection receives every broadcast; scoping happens per connection.
    broadcast_tx: broadcast::Sender<ServerEvent>,

    /// user_id -> open connections
    users: RwLock<HashMap<Uuid, UserConnections>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                users: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to broadcast events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients. Dropped silently when nobody listens.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register a new connection for `user_id`. Returns (conn_id, receiver).
    /// The user's first connection announces them online.
    pub async fn register(&self, user_id: Uuid, username: &str) -> (Uuid, mpsc::UnboundedReceiver<ServerEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        let came_online = {
            let mut users = self.inner.users.write().await;
            let entry = users.entry(user_id).or_insert_with(|| UserConnections {
                username: username.to_string(),
                senders: HashMap::new(),
            });
            entry.senders.insert(conn_id, tx);
            entry.senders.len() == 1
        };

        if came_online {
            self.broadcast(ServerEvent::PresenceUpdate {
                user_id,
                username: username.to_string(),
                online: true,
            });
        }

        (conn_id, rx)
    }

    /// Drop one connection. The user's last connection announces them offline.
    pub async fn unregister(&self, user_id: Uuid, conn_id: Uuid) {
        let went_offline = {
            let mut users = self.inner.users.write().await;
            let Some(entry) = users.get_mut(&user_id) else {
                return;
            };
            entry.senders.remove(&conn_id);
            if entry.senders.is_empty() {
                users.remove(&user_id).map(|e| e.username)
            } else {
                None
            }
        };

        if let Some(username) = went_offline {
            self.broadcast(ServerEvent::PresenceUpdate {
                user_id,
                username,
                online: false,
            });
        }
    }

    /// Send an event to every open connection of one user.
    /// Returns how many connections it was queued on.
    pub async fn send_to_user(&self, user_id: Uuid, event: ServerEvent) -> usize {
        let users = self.inner.users.read().await;
        let Some(entry) = users.get(&user_id) else {
            debug!("{} is offline, skipping push", user_id);
            return 0;
        };
        entry
            .senders
            .values()
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }

    /// Online users as (user_id, username).
    pub async fn online_users(&self) -> Vec<(Uuid, String)> {
        self.inner
            .users
            .read()
            .await
            .iter()
            .map(|(id, entry)| (*id, entry.username.clone()))
            .collect()
    }
}
