//! In-memory session store — the conversation state behind the orchestrator.
//!
//! The store is a keyed lock table: each session lives behind its own
//! `tokio::sync::Mutex`, and `checkout` hands back an owned guard that is
//! the per-session critical section. Two concurrent queries for the same
//! session serialize on that guard; queries for different sessions never
//! contend. Sessions are process-scoped: created on first query, evicted
//! when idle past a TTL or when the store hits its capacity bound, and
//! gone on restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use riskpilot_core::message::{Message, Session, SessionId};
use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;
use tracing::{debug, info};

pub use riskpilot_core::error::SessionError;

/// A summary of one live session, for listing endpoints.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub message_count: usize,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

struct SessionSlot {
    session: Arc<tokio::sync::Mutex<Session>>,
    last_used: Mutex<Instant>,
}

impl SessionSlot {
    fn new(session: Session) -> Self {
        Self {
            session: Arc::new(tokio::sync::Mutex::new(session)),
            last_used: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_used.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_used
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
    }
}

/// The conversation store.
pub struct SessionStore {
    slots: Mutex<HashMap<String, Arc<SessionSlot>>>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            idle_ttl,
            max_sessions,
        }
    }

    /// Check out a session for exclusive use.
    ///
    /// An absent id creates a fresh session; a present but unknown id is a
    /// client error (`UnknownSession`), never an implicit create. The
    /// returned guard holds the session's lock until dropped — callers keep
    /// it across their whole read-modify-append sequence.
    pub async fn checkout(&self, session_id: Option<&str>) -> Result<SessionGuard, SessionError> {
        let slot = match session_id {
            Some(id) => {
                let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
                slots
                    .get(id)
                    .cloned()
                    .ok_or_else(|| SessionError::UnknownSession(id.to_string()))?
            }
            None => self.insert_new().1,
        };

        slot.touch();
        // The map lock is released; only this session's lock is awaited.
        let guard = slot.session.clone().lock_owned().await;
        Ok(SessionGuard { guard })
    }

    /// Append a message to an existing session.
    ///
    /// Convenience wrapper over `checkout`; fails with `UnknownSession` if
    /// the session does not exist.
    pub async fn append(&self, session_id: &str, message: Message) -> Result<(), SessionError> {
        let mut guard = self.checkout(Some(session_id)).await?;
        guard.append(message);
        Ok(())
    }

    /// Create a new empty session and return its id without holding a lock.
    pub fn create(&self) -> SessionId {
        self.insert_new().0
    }

    fn insert_new(&self) -> (SessionId, Arc<SessionSlot>) {
        let session = Session::new();
        let id = session.id.clone();
        let slot = Arc::new(SessionSlot::new(session));

        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if slots.len() >= self.max_sessions {
            Self::evict_oldest_idle(&mut slots);
        }
        slots.insert(id.0.clone(), slot.clone());
        debug!(session = %id, live = slots.len(), "Session created");
        (id, slot)
    }

    /// Evict the least recently used slot that is not mid-request.
    fn evict_oldest_idle(slots: &mut HashMap<String, Arc<SessionSlot>>) {
        let oldest = slots
            .iter()
            .filter(|(_, slot)| slot.session.try_lock().is_ok())
            .max_by_key(|(_, slot)| slot.idle_for())
            .map(|(id, _)| id.clone());

        if let Some(id) = oldest {
            slots.remove(&id);
            info!(session = %id, "Evicted oldest idle session at capacity");
        }
    }

    /// Remove sessions idle longer than the TTL. In-flight sessions (whose
    /// lock is held) are skipped. Returns the number evicted.
    pub fn evict_idle(&self) -> usize {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let before = slots.len();
        let ttl = self.idle_ttl;
        slots.retain(|_, slot| slot.session.try_lock().is_err() || slot.idle_for() < ttl);
        let evicted = before - slots.len();
        if evicted > 0 {
            info!(evicted, live = slots.len(), "Idle session sweep");
        }
        evicted
    }

    /// The idle TTL this store sweeps against.
    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summaries of all live sessions, newest activity first.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let slots: Vec<Arc<SessionSlot>> = {
            let map = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            map.values().cloned().collect()
        };

        let mut summaries = Vec::with_capacity(slots.len());
        for slot in slots {
            let session = slot.session.lock().await;
            summaries.push(SessionSummary {
                id: session.id.0.clone(),
                message_count: session.messages.len(),
                created_at: session.created_at,
                updated_at: session.updated_at,
            });
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    /// A point-in-time copy of one session's transcript.
    pub async fn snapshot(&self, session_id: &str) -> Option<Session> {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.get(session_id).cloned()
        }?;
        Some(slot.session.lock().await.clone())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600), 1_000)
    }
}

/// Exclusive access to one session for the duration of a request.
///
/// Dropping the guard releases the per-session lock on every exit path,
/// success or failure alike.
pub struct SessionGuard {
    guard: OwnedMutexGuard<Session>,
}

impl SessionGuard {
    pub fn id(&self) -> &SessionId {
        &self.guard.id
    }

    pub fn messages(&self) -> &[Message] {
        &self.guard.messages
    }

    pub fn append(&mut self, message: Message) {
        self.guard.push(message);
    }
}
