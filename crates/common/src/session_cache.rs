//! In-memory custody of unlocked private keys
//!
//! A successful login unlocks the user's private key once and parks it here
//! under a freshly minted [`SessionId`] until the bearer token expires. Every
//! later request carrying that token reads the key back instead of asking for
//! the password again.
//!
//! Per session the life cycle is `Absent -> Active -> (Expired | Revoked) -> Absent`.
//! Expired entries are evicted lazily by [`SessionKeyCache::get`] and in bulk
//! by [`SessionKeyCache::purge_expired`]. Nothing here survives a restart.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::crypto::SecretKey;

/// Opaque session identifier, carried as the token's `jti`
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// A new random identifier (UUID v4, simple hex form)
    pub fn generate() -> Self {
        SessionId(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        SessionId(id)
    }
}

impl FromStr for SessionId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SessionId(s.to_string()))
    }
}

// session ids are bearer material, keep them out of logs
impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionId(..)")
    }
}

struct Entry {
    key: Arc<SecretKey>,
    expires_at: OffsetDateTime,
}

/// Session id -> unlocked private key, with expiry
#[derive(Default)]
pub struct SessionKeyCache {
    entries: Mutex<HashMap<SessionId, Entry>>,
}

impl fmt::Debug for SessionKeyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeyCache")
            .field("sessions", &self.len())
            .finish()
    }
}

impl SessionKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the key for `session_id`
    pub fn put(&self, session_id: SessionId, key: SecretKey, expires_at: OffsetDateTime) {
        let entry = Entry {
            key: Arc::new(key),
            expires_at,
        };
        self.entries.lock().insert(session_id, entry);
    }

    /// Fetch the key for an active session
    pub fn get(&self, session_id: &SessionId) -> Option<Arc<SecretKey>> {
        self.get_at(session_id, OffsetDateTime::now_utc())
    }

    /// [`get`](Self::get) against an explicit clock. An entry whose expiry is
    /// at or before `now` is evicted.
    pub fn get_at(&self, session_id: &SessionId, now: OffsetDateTime) -> Option<Arc<SecretKey>> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(session_id) {
            None => return None,
            Some(entry) if now < entry.expires_at => return Some(entry.key.clone()),
            Some(_) => true,
        };
        if expired {
            entries.remove(session_id);
        }
        None
    }

    /// Drop a session. Returns whether it was present.
    pub fn revoke(&self, session_id: &SessionId) -> bool {
        self.entries.lock().remove(session_id).is_some()
    }

    /// Evict every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(OffsetDateTime::now_utc())
    }

    pub fn purge_expired_at(&self, now: OffsetDateTime) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use time::Duration;

    use super::*;
    use crate::testkit;

    #[test]
    fn test_session_id_format() {
        let id = SessionId::generate();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, SessionId::generate());
        assert_eq!(format!("{:?}", id), "SessionId(..)");
    }

    #[test]
    fn test_put_get() {
        let cache = SessionKeyCache::new();
        let key = testkit::secret_key(0);
        let id = SessionId::generate();
        let now = OffsetDateTime::now_utc();

        cache.put(id.clone(), key.clone(), now + Duration::minutes(5));
        let cached = cache.get_at(&id, now).unwrap();
        assert_eq!(cached.public(), key.public());
        assert!(cache.get_at(&SessionId::generate(), now).is_none());
    }

    #[test]
    fn test_expiry_evicts() {
        let cache = SessionKeyCache::new();
        let id = SessionId::generate();
        let now = OffsetDateTime::now_utc();
        let expires_at = now + Duration::seconds(30);

        cache.put(id.clone(), testkit::secret_key(0), expires_at);
        assert!(cache.get_at(&id, expires_at - Duration::seconds(1)).is_some());

        // expiry is inclusive
        assert!(cache.get_at(&id, expires_at).is_none());
        assert_eq!(cache.len(), 0);
        assert!(cache.get_at(&id, now).is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let cache = SessionKeyCache::new();
        let id = SessionId::generate();
        let now = OffsetDateTime::now_utc();

        cache.put(id.clone(), testkit::secret_key(0), now + Duration::minutes(1));
        cache.put(id.clone(), testkit::secret_key(1), now + Duration::minutes(10));

        let cached = cache.get_at(&id, now + Duration::minutes(5)).unwrap();
        assert_eq!(cached.public(), testkit::secret_key(1).public());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let cache = SessionKeyCache::new();
        let id = SessionId::generate();
        let now = OffsetDateTime::now_utc();

        cache.put(id.clone(), testkit::secret_key(0), now + Duration::minutes(5));
        assert!(cache.revoke(&id));
        assert!(cache.get_at(&id, now).is_none());
        assert!(!cache.revoke(&id));
        assert!(!cache.revoke(&SessionId::generate()));
    }

    #[test]
    fn test_purge_expired() {
        let cache = SessionKeyCache::new();
        let now = OffsetDateTime::now_utc();
        let live = SessionId::generate();

        cache.put(live.clone(), testkit::secret_key(0), now + Duration::minutes(5));
        cache.put(SessionId::generate(), testkit::secret_key(1), now - Duration::seconds(1));
        cache.put(SessionId::generate(), testkit::secret_key(2), now);

        assert_eq!(cache.purge_expired_at(now), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get_at(&live, now).is_some());
    }
}
