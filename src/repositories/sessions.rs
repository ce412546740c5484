use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::models::sessions::Session;

struct Entry {
    session: Session,
    touched_at: Instant,
}

/// In-memory conversation store keyed by normalized phone number. Each
/// operation is atomic per key; `lock` hands out the per-phone guard the
/// conversation driver holds for a whole turn. Idle entries are evicted by
/// the sweep task; losing them is fine, a miss restarts the conversation.
pub struct SessionStore {
    entries: DashMap<String, Entry>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            entries: DashMap::new(),
            locks: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, phone: &str) -> Option<Session> {
        self.entries.get(phone).map(|entry| entry.session.clone())
    }

    pub fn put(&self, phone: &str, session: Session) {
        self.entries.insert(
            phone.to_string(),
            Entry {
                session,
                touched_at: Instant::now(),
            },
        );
    }

    pub fn delete(&self, phone: &str) {
        self.entries.remove(phone);
    }

    pub fn lock(&self, phone: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(phone.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops sessions idle past the TTL; returns how many were evicted.
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.touched_at.elapsed() < self.ttl);
        self.locks
            .retain(|phone, lock| self.entries.contains_key(phone) || Arc::strong_count(lock) > 1);

        before - self.entries.len()
    }

    pub fn start_sweep_task(self: &Arc<Self>) {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                let evicted = store.sweep();
                if evicted > 0 {
                    log::debug!("Evicted {} idle sessions.", evicted);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sessions::ConversationState;

    #[test]
    fn miss_means_new_conversation() {
        let store = SessionStore::new(Duration::from_secs(60));
        assert!(store.get("+5511999999999").is_none());
    }

    #[test]
    fn put_get_delete_roundtrip() {
        let store = SessionStore::new(Duration::from_secs(60));
        let mut session = Session::default();
        session.state = ConversationState::Confirming;

        store.put("+5511999999999", session.clone());
        assert_eq!(store.get("+5511999999999"), Some(session));

        store.delete("+5511999999999");
        assert!(store.get("+5511999999999").is_none());
    }

    #[test]
    fn sweep_evicts_only_idle_sessions() {
        let store = SessionStore::new(Duration::from_millis(20));
        store.put("+551100000001", Session::default());
        std::thread::sleep(Duration::from_millis(40));
        store.put("+551100000002", Session::default());

        assert_eq!(store.sweep(), 1);
        assert!(store.get("+551100000001").is_none());
        assert!(store.get("+551100000002").is_some());
    }

    #[tokio::test]
    async fn per_phone_lock_serializes_turns() {
        let store = SessionStore::new(Duration::from_secs(60));
        let lock = store.lock("+5511999999999");
        let guard = lock.lock().await;

        let second = store.lock("+5511999999999");
        assert!(second.try_lock().is_err());

        drop(guard);
        assert!(store.lock("+5511999999999").try_lock().is_ok());
    }

    #[tokio::test]
    async fn sweep_keeps_locks_in_use() {
        let store = SessionStore::new(Duration::from_millis(1));
        let lock = store.lock("+5511999999999");
        let _guard = lock.lock().await;

        std::thread::sleep(Duration::from_millis(5));
        store.sweep();

        // Still the same mutex while a turn holds it.
        assert!(store.lock("+5511999999999").try_lock().is_err());
    }
}
