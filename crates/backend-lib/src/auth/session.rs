// ============================
// crates/backend-lib/src/auth/session.rs
// ============================
//! Legacy server-side sessions.
//!
//! Before tokens existed the browser front-end kept the caller in a session:
//! an opaque id in a cookie pointing at plain string values on the server.
//! Sessions are still written at browser login and read as a fallback when a
//! request carries no valid token.
use std::{collections::HashMap, sync::Arc, time::Duration};

use metrics::{counter, gauge};
use tokio::{sync::RwLock, task::JoinHandle, time::Instant};

use super::token_generator::generate_session_id;

/// Session idle timeout (30 minutes)
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

pub const SESSION_USERNAME: &str = "Username";
pub const SESSION_USER_ID: &str = "UserId";
pub const SESSION_IS_ADMIN: &str = "IsAdmin";

/// String key/value snapshot of one session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    values: HashMap<String, String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The values the browser login writes
    pub fn for_user(username: &str, user_id: i64, is_admin: bool) -> Self {
        let mut state = Self::new();
        state.set(SESSION_USERNAME, username);
        state.set(SESSION_USER_ID, user_id.to_string());
        // Stored the way the old front-end wrote booleans
        state.set(SESSION_IS_ADMIN, if is_admin { "True" } else { "False" });
        state
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone)]
struct SessionEntry {
    state: SessionState,
    last_access: Instant,
}

/// In-memory session store with sliding idle expiry
#[derive(Debug, Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    idle_timeout: Duration,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(SESSION_IDLE_TIMEOUT)
    }
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Start a session holding `state`; returns its id
    pub async fn create(&self, state: SessionState) -> String {
        let id = generate_session_id();
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            id.clone(),
            SessionEntry {
                state,
                last_access: Instant::now(),
            },
        );

        counter!("session.created").increment(1);
        gauge!("session.active").set(sessions.len() as f64);

        id
    }

    /// Snapshot of a live session. Touching it renews the idle timer; an
    /// idle session is dropped and reported as absent.
    pub async fn load(&self, id: &str) -> Option<SessionState> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();

        let expired = match sessions.get_mut(id) {
            Some(entry) if now.duration_since(entry.last_access) < self.idle_timeout => {
                entry.last_access = now;
                return Some(entry.state.clone());
            },
            Some(_) => true,
            None => false,
        };

        if expired {
            sessions.remove(id);
            counter!("session.expired").increment(1);
            gauge!("session.active").set(sessions.len() as f64);
        }
        None
    }

    /// Replace the values of a live session
    pub async fn store(&self, id: &str, state: SessionState) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(entry) => {
                entry.state = state;
                entry.last_access = Instant::now();
                true
            },
            None => false,
        }
    }

    /// Drop a session (logout)
    pub async fn clear(&self, id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(id).is_some();
        gauge!("session.active").set(sessions.len() as f64);
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Remove every idle session, returning how many went
    pub async fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        let before_count = sessions.len();

        sessions.retain(|_, entry| now.duration_since(entry.last_access) < self.idle_timeout);

        let after_count = sessions.len();
        let removed = before_count - after_count;

        if removed > 0 {
            counter!("session.expired").increment(removed as u64);
            gauge!("session.active").set(after_count as f64);
            tracing::debug!(removed, remaining = after_count, "expired idle sessions");
        }
        removed
    }

    /// Periodically sweep idle sessions until the handle is aborted
    pub fn spawn_cleanup(&self, every: Duration) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                manager.cleanup_expired().await;
            }
        })
    }
}
