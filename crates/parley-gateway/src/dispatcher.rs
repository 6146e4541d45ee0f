use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use parley_types::events::GatewayEvent;

use crate::presence::PresenceRegistry;

/// Where a live connection is in its lifecycle. Disconnected sessions are
/// simply gone from the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Handshake carried no usable identity; the connection can join rooms
    /// but never receives directed events.
    Unauthenticated,
    /// Registered, not in any room.
    Idle,
    /// Registered and joined to this many rooms.
    InRoom(usize),
}

struct Session {
    user_id: Option<Uuid>,
    tx: mpsc::UnboundedSender<GatewayEvent>,
    rooms: HashSet<Uuid>,
}

impl Session {
    fn deliver(&self, conn_id: Uuid, event: GatewayEvent) -> bool {
        // A closed receiver means the socket is going away; its own task
        // cleans the session up.
        if self.tx.send(event).is_err() {
            trace!("dropping event for closed connection {}", conn_id);
            return false;
        }
        true
    }
}

/// Tracks live connections, their room memberships, and routes events to
/// them. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    presence: PresenceRegistry,

    /// conn_id -> session. Lock before `rooms` when both are needed.
    sessions: RwLock<HashMap<Uuid, Session>>,

    /// room_id (group id) -> joined conn_ids
    rooms: RwLock<HashMap<Uuid, HashSet<Uuid>>>,
}

impl Dispatcher {
    pub fn new(presence: PresenceRegistry) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                presence,
                sessions: RwLock::new(HashMap::new()),
                rooms: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.inner.presence
    }

    /// Open a session. `Ready` is queued first; when the connection carries
    /// a user id it is registered and every connection gets the new online
    /// snapshot. Returns (conn_id, receiver).
    pub async fn connect(&self, user_id: Option<Uuid>) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        let _ = tx.send(GatewayEvent::Ready {
            user_id,
            authenticated: user_id.is_some(),
        });

        self.inner.sessions.write().await.insert(
            conn_id,
            Session {
                user_id,
                tx,
                rooms: HashSet::new(),
            },
        );

        match user_id {
            Some(user_id) => {
                if let Some(previous) = self.inner.presence.register(user_id, conn_id) {
                    info!("{} reconnected; connection {} replaces {}", user_id, conn_id, previous);
                }
                self.broadcast_online_users().await;
            }
            None => warn!("connection {} has no identity; accepted without registration", conn_id),
        }

        (conn_id, rx)
    }

    /// Tear a session down: leave every room, and unregister the user if the
    /// registry still points at this connection.
    pub async fn disconnect(&self, conn_id: Uuid) {
        let session = self.inner.sessions.write().await.remove(&conn_id);
        let Some(session) = session else {
            return;
        };

        if !session.rooms.is_empty() {
            let mut rooms = self.inner.rooms.write().await;
            for room_id in &session.rooms {
                if let Some(members) = rooms.get_mut(room_id) {
                    members.remove(&conn_id);
                    if members.is_empty() {
                        rooms.remove(room_id);
                    }
                }
            }
        }

        if let Some(user_id) = session.user_id {
            if self.inner.presence.release(user_id, conn_id) {
                self.broadcast_online_users().await;
            } else {
                debug!("{} already has a newer connection; registry untouched", user_id);
            }
        }
    }

    /// Add a connection to a room. Joining twice is harmless.
    /// Returns false for unknown connections.
    pub async fn join_room(&self, conn_id: Uuid, room_id: Uuid) -> bool {
        let mut sessions = self.inner.sessions.write().await;
        let Some(session) = sessions.get_mut(&conn_id) else {
            return false;
        };
        session.rooms.insert(room_id);
        self.inner
            .rooms
            .write()
            .await
            .entry(room_id)
            .or_default()
            .insert(conn_id);
        true
    }

    pub async fn leave_room(&self, conn_id: Uuid, room_id: Uuid) {
        let mut sessions = self.inner.sessions.write().await;
        if let Some(session) = sessions.get_mut(&conn_id) {
            session.rooms.remove(&room_id);
        }
        let mut rooms = self.inner.rooms.write().await;
        if let Some(members) = rooms.get_mut(&room_id) {
            members.remove(&conn_id);
            if members.is_empty() {
                rooms.remove(&room_id);
            }
        }
    }

    /// Deliver to the connection registered for `user_id`. Offline users are
    /// a silent no-op. Returns whether an event was handed to a connection.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) -> bool {
        let Some(conn_id) = self.inner.presence.lookup(user_id) else {
            trace!("{} is offline; skipping {}", user_id, event.name());
            return false;
        };

        let sessions = self.inner.sessions.read().await;
        match sessions.get(&conn_id) {
            Some(session) => session.deliver(conn_id, event),
            None => false,
        }
    }

    /// Deliver to every connection joined to `room_id`. Returns the number of
    /// connections reached.
    pub async fn send_to_room(&self, room_id: Uuid, event: GatewayEvent) -> usize {
        self.send_to_room_except(room_id, None, event).await
    }

    /// Same as [`send_to_room`](Self::send_to_room) but skips `except`.
    pub async fn send_to_room_except(
        &self,
        room_id: Uuid,
        except: Option<Uuid>,
        event: GatewayEvent,
    ) -> usize {
        let sessions = self.inner.sessions.read().await;
        let rooms = self.inner.rooms.read().await;
        let Some(members) = rooms.get(&room_id) else {
            return 0;
        };

        let mut delivered = 0;
        for conn_id in members {
            if Some(*conn_id) == except {
                continue;
            }
            if let Some(session) = sessions.get(conn_id) {
                if session.deliver(*conn_id, event.clone()) {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Deliver to every live connection, authenticated or not.
    pub async fn broadcast(&self, event: GatewayEvent) -> usize {
        let sessions = self.inner.sessions.read().await;
        sessions
            .iter()
            .filter(|(conn_id, session)| session.deliver(**conn_id, event.clone()))
            .count()
    }

    async fn broadcast_online_users(&self) {
        let online = self.inner.presence.snapshot();
        debug!("{} users online", online.len());
        self.broadcast(GatewayEvent::GetOnlineUsers(online)).await;
    }

    pub async fn session_state(&self, conn_id: Uuid) -> Option<SessionState> {
        let sessions = self.inner.sessions.read().await;
        let session = sessions.get(&conn_id)?;
        Some(match (session.user_id, session.rooms.len()) {
            (None, _) => SessionState::Unauthenticated,
            (Some(_), 0) => SessionState::Idle,
            (Some(_), n) => SessionState::InRoom(n),
        })
    }

    pub async fn room_size(&self, room_id: Uuid) -> usize {
        self.inner
            .rooms
            .read()
            .await
            .get(&room_id)
            .map_or(0, HashSet::len)
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }
}
