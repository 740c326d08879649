//! Session store
//!
//! Maps a user id to that user's agent session. In-memory only.
//! Sessions idle past the TTL are swept by [`SessionStore::evict_idle`];
//! inserting into a full store evicts the least recently active session.

use crate::agent::AgentHandle;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

pub const DEFAULT_IDLE_TTL_SECS: i64 = 60 * 60;
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub idle_ttl: Duration,
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::seconds(DEFAULT_IDLE_TTL_SECS),
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

/// Agent slot of a session
pub enum AgentSlot {
    /// Initialization failed; the reason is kept for logs.
    Uninitialized { reason: String },
    Ready(Arc<AgentHandle>),
}

pub struct Session {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    agent: AgentSlot,
    last_active: RwLock<DateTime<Utc>>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, agent: AgentSlot) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            created_at: now,
            agent,
            last_active: RwLock::new(now),
        }
    }

    pub fn agent(&self) -> &AgentSlot {
        &self.agent
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.agent, AgentSlot::Ready(_))
    }

    pub async fn last_active(&self) -> DateTime<Utc> {
        *self.last_active.read().await
    }

    pub async fn touch(&self) {
        self.touch_at(Utc::now()).await;
    }

    async fn touch_at(&self, at: DateTime<Utc>) {
        let mut last = self.last_active.write().await;
        if at > *last {
            *last = at;
        }
    }
}

/// Concurrency-safe map of user id → session
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    config: SessionConfig,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Look up a session and mark it active
    pub async fn get(&self, user_id: &str) -> Option<Arc<Session>> {
        let session = {
            let sessions = self.sessions.read().await;
            sessions.get(user_id).cloned()
        };

        if let Some(session) = &session {
            session.touch().await;
        }
        session
    }

    /// Insert a session, replacing any previous session of the same user.
    ///
    /// Returns the replaced session, if any.
    pub async fn insert(&self, session: Session) -> Option<Arc<Session>> {
        let user_id = session.user_id.clone();
        let mut sessions = self.sessions.write().await;

        if !sessions.contains_key(&user_id) && sessions.len() >= self.config.max_sessions {
            if let Some(victim) = least_recently_active(&sessions).await {
                sessions.remove(&victim);
                info!(user_id = %victim, "Evicted least recently active session");
            }
        }

        let replaced = sessions.insert(user_id.clone(), Arc::new(session));
        if replaced.is_some() {
            debug!(user_id = %user_id, "Replaced existing session");
        }
        replaced
    }

    pub async fn remove(&self, user_id: &str) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(user_id)
    }

    /// Drop sessions idle past the TTL. Returns how many were removed.
    pub async fn evict_idle(&self) -> usize {
        self.evict_idle_at(Utc::now()).await
    }

    pub async fn evict_idle_at(&self, now: DateTime<Utc>) -> usize {
        // a TTL reaching past the earliest representable time expires nothing
        let Some(cutoff) = now.checked_sub_signed(self.config.idle_ttl) else {
            return 0;
        };
        let mut sessions = self.sessions.write().await;

        let mut expired = Vec::new();
        for (user_id, session) in sessions.iter() {
            if session.last_active().await < cutoff {
                expired.push(user_id.clone());
            }
        }

        for user_id in &expired {
            sessions.remove(user_id);
        }

        if !expired.is_empty() {
            info!(evicted = expired.len(), remaining = sessions.len(), "Evicted idle sessions");
        }
        expired.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

async fn least_recently_active(sessions: &HashMap<String, Arc<Session>>) -> Option<String> {
    let mut oldest: Option<(DateTime<Utc>, &String)> = None;
    for (user_id, session) in sessions {
        let last = session.last_active().await;
        if oldest.map_or(true, |(t, _)| last < t) {
            oldest = Some((last, user_id));
        }
    }
    oldest.map(|(_, user_id)| user_id.clone())
}
