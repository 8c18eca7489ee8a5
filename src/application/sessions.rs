//! Session registry: one `SessionState` per user session.
//!
//! The registry lock is held only to look up or insert a session handle.
//! Each session has its own lock, so requests from different sessions never
//! wait on each other's submissions.
//!
//! Sessions idle for longer than the TTL are dropped. When the registry is
//! full, creating a session evicts the least recently used one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::domain::{new_session_id, SessionState};
use crate::HealthHorizonError;

pub type SessionHandle = Arc<Mutex<SessionState>>;

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

struct SessionEntry {
    handle: SessionHandle,
    last_access: Instant,
}

pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    ttl: Duration,
    max_sessions: usize,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_limits(DEFAULT_SESSION_TTL, DEFAULT_MAX_SESSIONS)
    }
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry dropping sessions idle for `ttl` and holding at most
    /// `max_sessions` (at least one).
    #[must_use]
    pub fn with_limits(ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    fn sessions(&self) -> Result<MutexGuard<'_, HashMap<String, SessionEntry>>, HealthHorizonError> {
        self.sessions
            .lock()
            .map_err(|_| HealthHorizonError::Session("session registry lock poisoned".to_string()))
    }

    fn is_expired(&self, entry: &SessionEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.last_access) > self.ttl
    }

    fn evict_expired(&self, sessions: &mut HashMap<String, SessionEntry>, now: Instant) {
        let before = sessions.len();
        sessions.retain(|_, entry| !self.is_expired(entry, now));
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} idle sessions", evicted);
        }
    }

    fn evict_least_recent(sessions: &mut HashMap<String, SessionEntry>) {
        let oldest = sessions
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(id, _)| id.clone());
        if let Some(id) = oldest {
            sessions.remove(&id);
            tracing::debug!("Session registry full; evicted least recently used session");
        }
    }

    /// Create an empty session and return its id.
    ///
    /// # Errors
    /// Returns error if the registry lock is poisoned.
    pub fn create(&self) -> Result<(String, SessionHandle), HealthHorizonError> {
        let mut sessions = self.sessions()?;
        let now = Instant::now();
        self.evict_expired(&mut sessions, now);
        while sessions.len() >= self.max_sessions {
            Self::evict_least_recent(&mut sessions);
        }

        let id = new_session_id();
        let handle = Arc::new(Mutex::new(SessionState::new()));
        sessions.insert(
            id.clone(),
            SessionEntry {
                handle: Arc::clone(&handle),
                last_access: now,
            },
        );
        tracing::debug!("Created session ({} active)", sessions.len());
        Ok((id, handle))
    }

    /// Look up an existing session and mark it as used.
    ///
    /// # Errors
    /// Returns `HealthHorizonError::NotFound` for an unknown or expired id.
    pub fn get(&self, id: &str) -> Result<SessionHandle, HealthHorizonError> {
        let mut sessions = self.sessions()?;
        let now = Instant::now();

        let expired = match sessions.get_mut(id) {
            Some(entry) => {
                if !self.is_expired(entry, now) {
                    entry.last_access = now;
                    return Ok(Arc::clone(&entry.handle));
                }
                true
            }
            None => false,
        };
        if expired {
            sessions.remove(id);
            tracing::debug!("Session expired");
        }
        Err(HealthHorizonError::NotFound("session".to_string()))
    }

    /// Existing session for `id`, or a new one when `id` is absent.
    ///
    /// An id that is present but unknown is an error rather than silently
    /// starting a fresh session.
    ///
    /// # Errors
    /// Returns `HealthHorizonError::NotFound` for an unknown id.
    pub fn get_or_create(
        &self,
        id: Option<&str>,
    ) -> Result<(String, SessionHandle), HealthHorizonError> {
        match id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => Ok((id.to_string(), self.get(id)?)),
            None => self.create(),
        }
    }

    /// Copy of the current session state.
    ///
    /// # Errors
    /// Returns error if the session is unknown or its lock is poisoned.
    pub fn snapshot(&self, id: &str) -> Result<SessionState, HealthHorizonError> {
        let handle = self.get(id)?;
        let state = handle
            .lock()
            .map_err(|_| HealthHorizonError::Session("session state lock poisoned".to_string()))?;
        Ok(state.clone())
    }

    /// Clear last assessment and field values. The session id stays valid.
    ///
    /// # Errors
    /// Returns error if the session is unknown or its lock is poisoned.
    pub fn reset(&self, id: &str) -> Result<(), HealthHorizonError> {
        let handle = self.get(id)?;
        let mut state = handle
            .lock()
            .map_err(|_| HealthHorizonError::Session("session state lock poisoned".to_string()))?;
        state.reset();
        tracing::info!("Session reset");
        Ok(())
    }

    /// Number of live sessions. Expired ones are dropped first.
    ///
    /// # Errors
    /// Returns error if the registry lock is poisoned.
    pub fn active_count(&self) -> Result<usize, HealthHorizonError> {
        let mut sessions = self.sessions()?;
        self.evict_expired(&mut sessions, Instant::now());
        Ok(sessions.len())
    }
}
