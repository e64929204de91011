//! Durable session cache.
//!
//! Only the session is persisted, never the derived user; the authentication
//! provider stays authoritative on whether a cached session is still valid.

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::models::Session;

/// JSON file under the data directory holding the cached session.
#[derive(Debug, Clone)]
pub struct SessionCache {
    path: PathBuf,
}

impl SessionCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read the cached session, if any. An unreadable or malformed cache
    /// counts as no cache.
    pub fn load(&self) -> Option<Session> {
        let raw = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(err) => {
                tracing::debug!(%err, path = %self.path.display(), "discarding malformed session cache");
                None
            }
        }
    }

    pub fn store(&self, session: &Session) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, raw)
    }

    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            access_token: "tok".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: Some(1_900_000_000),
        }
    }

    #[test]
    fn round_trips_a_session() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SessionCache::new(dir.path().join("session.json"));
        cache.store(&session()).unwrap();
        assert_eq!(cache.load(), Some(session()));
    }

    #[test]
    fn missing_file_is_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SessionCache::new(dir.path().join("session.json"));
        assert_eq!(cache.load(), None);
    }

    #[test]
    fn malformed_cache_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(SessionCache::new(path).load(), None);
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SessionCache::new(dir.path().join("session.json"));
        cache.store(&session()).unwrap();
        cache.clear().unwrap();
        cache.clear().unwrap();
        assert_eq!(cache.load(), None);
    }
}
