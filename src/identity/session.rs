use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;
use tracing::debug;

use super::principal::Principal;

pub type SessionToken = String;

/// Absolute session horizon: 24 hours from creation.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub principal: Principal,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

fn gen_token() -> String {
    // 256-bit random token, base64url without padding
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// Owner of the in-process session registry. Cloneable; clones share the
/// registry. Expiry is enforced lazily at validation time, there is no
/// background sweep.
#[derive(Clone)]
pub struct SessionManager {
    ttl: Duration,
    sessions: Arc<RwLock<HashMap<SessionToken, Session>>>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::new(SESSION_TTL) }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, sessions: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub fn ttl(&self) -> Duration { self.ttl }

    pub fn issue(&self, principal: Principal) -> Session {
        let now = Instant::now();
        let sess = Session {
            token: gen_token(),
            principal,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions.write().insert(sess.token.clone(), sess.clone());
        debug!(user = %sess.principal.username, ttl_secs = self.ttl.as_secs(), "session issued");
        sess
    }

    /// Resolve a token to its principal. An expired session is treated
    /// identically to no session and is pruned on the way out.
    pub fn validate(&self, token: &str) -> Option<Principal> {
        let now = Instant::now();
        let mut expired = false;
        let out = {
            let map = self.sessions.read();
            match map.get(token) {
                Some(sess) if sess.expires_at > now => Some(sess.principal.clone()),
                Some(_) => { expired = true; None }
                None => None,
            }
        };
        if expired {
            self.sessions.write().remove(token);
        }
        out
    }

    /// Destroy a session. Returns whether a live session was removed.
    pub fn logout(&self, token: &str) -> bool {
        let removed = self.sessions.write().remove(token);
        if let Some(sess) = &removed {
            debug!(user = %sess.principal.username, "session destroyed");
        }
        removed.is_some()
    }

    #[cfg(test)]
    fn set_expiry(&self, token: &str, expires_at: Instant) {
        if let Some(sess) = self.sessions.write().get_mut(token) {
            sess.expires_at = expires_at;
        }
    }
}
