//! In-memory token rotation runtime for attendance sessions.
//!
//! Each active session owns one periodic task that replaces the session's
//! check-in token on a fixed cadence. The current and immediately previous
//! token are kept together behind a single lock so a reader can never observe
//! a half-updated pair. Rotation state is an ephemeral cache: it is never
//! persisted, and a fresh window is started whenever a live session is seen
//! without one (for example after a process restart).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use rand::RngCore;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};

/// Generates an unpredictable check-in token: 128 bits from the OS RNG,
/// hex encoded.
pub fn generate_token() -> String {
    let mut buf = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// The two-generation token window for one session.
///
/// `previous` is retained for exactly one rotation cycle so that a check-in
/// racing a rotation (or delayed by the network) is still accepted.
#[derive(Debug, Clone)]
pub struct TokenWindow {
    current: String,
    previous: Option<String>,
    issued_at: DateTime<Utc>,
}

impl TokenWindow {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            current: generate_token(),
            previous: None,
            issued_at: now,
        }
    }

    /// Installs a fresh current token and demotes the old one to `previous`.
    pub fn rotate(&mut self, now: DateTime<Utc>) {
        self.previous = Some(std::mem::replace(&mut self.current, generate_token()));
        self.issued_at = now;
    }

    /// A presented token is valid iff it equals the current token or the
    /// immediately previous one. Anything older is stale.
    pub fn matches(&self, presented: &str) -> bool {
        presented == self.current || self.previous.as_deref() == Some(presented)
    }

    pub fn snapshot(&self) -> (String, DateTime<Utc>) {
        (self.current.clone(), self.issued_at)
    }
}

struct SessionRotation {
    window: Mutex<TokenWindow>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// Registry of per-session rotation tasks, shared via `AppState`.
#[derive(Clone, Default)]
pub struct RotationManager {
    sessions: Arc<RwLock<HashMap<i64, Arc<SessionRotation>>>>,
}

impl RotationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins rotating tokens for `session_id` every `every` until
    /// `expires_at`, returning the first token and its issue time.
    ///
    /// Calling `start` for a session that is already rotating is a no-op and
    /// returns the live window's current token.
    pub fn start(
        &self,
        session_id: i64,
        every: Duration,
        expires_at: DateTime<Utc>,
    ) -> (String, DateTime<Utc>) {
        let now = Utc::now();
        // Check-and-insert under one write lock so two racing starts for the
        // same session cannot each spawn a task.
        let rot = {
            let mut map = self.sessions.write().expect("rotation registry lock");
            if let Some(existing) = map.get(&session_id) {
                return existing.window.lock().expect("token window lock").snapshot();
            }
            let rot = Arc::new(SessionRotation {
                window: Mutex::new(TokenWindow::new(now)),
                handle: Mutex::new(None),
            });
            map.insert(session_id, rot.clone());
            rot
        };
        let snapshot = rot.window.lock().expect("token window lock").snapshot();

        let lifetime = (expires_at - now).to_std().unwrap_or(Duration::ZERO);
        let deadline = time::Instant::now() + lifetime;
        let registry = self.sessions.clone();
        let task_rot = rot.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval fires immediately; the window already holds the first token
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if time::Instant::now() >= deadline {
                    break;
                }
                task_rot
                    .window
                    .lock()
                    .expect("token window lock")
                    .rotate(Utc::now());
            }

            // Session lifetime is over; deregister so a stale entry never
            // serves tokens past expiry.
            registry
                .write()
                .expect("rotation registry lock")
                .remove(&session_id);
            tracing::debug!(session_id, "token rotation stopped at session expiry");
        });

        *rot.handle.lock().expect("rotation handle lock") = Some(handle);
        snapshot
    }

    /// Stops rotation for `session_id`. Idempotent: stopping a session that
    /// is not rotating does nothing.
    pub fn stop(&self, session_id: i64) {
        let removed = {
            let mut map = self.sessions.write().expect("rotation registry lock");
            map.remove(&session_id)
        };
        if let Some(rot) = removed {
            if let Some(handle) = rot.handle.lock().expect("rotation handle lock").take() {
                handle.abort();
            }
            tracing::debug!(session_id, "token rotation stopped");
        }
    }

    /// Current token and issue time for a rotating session.
    pub fn current(&self, session_id: i64) -> Option<(String, DateTime<Utc>)> {
        let map = self.sessions.read().expect("rotation registry lock");
        map.get(&session_id)
            .map(|rot| rot.window.lock().expect("token window lock").snapshot())
    }

    /// Checks a presented token against the session's live window.
    /// Returns `None` when the session is not rotating.
    pub fn verify(&self, session_id: i64, presented: &str) -> Option<bool> {
        let map = self.sessions.read().expect("rotation registry lock");
        map.get(&session_id)
            .map(|rot| rot.window.lock().expect("token window lock").matches(presented))
    }

    pub fn is_rotating(&self, session_id: i64) -> bool {
        self.sessions
            .read()
            .expect("rotation registry lock")
            .contains_key(&session_id)
    }
}
