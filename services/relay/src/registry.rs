use std::collections::HashMap;
use std::sync::Arc;

use chat_protocol::naming::next_auto_name;
use parking_lot::Mutex;

use crate::session::Session;

struct RegistryState {
    sessions: HashMap<String, Arc<Session>>,
    ticket: u64,
}

/// The relay's name → session index. All composite find-then-mutate
/// operations (`insert`, `rename`, `remove`) take the single lock for their
/// full duration, so the registry's identity invariants hold under
/// concurrent access from every connection's task.
pub struct SessionRegistry {
    inner: Mutex<RegistryState>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryState {
                sessions: HashMap::new(),
                ticket: 0,
            }),
        }
    }

    /// Allocates the next unused `u<N>` name under the registry lock, builds
    /// the session via `build`, and inserts it in the same critical section.
    pub fn insert_auto_named<F>(&self, build: F) -> Arc<Session>
    where
        F: FnOnce(String) -> Arc<Session>,
    {
        let mut guard = self.inner.lock();
        let RegistryState { sessions, ticket } = &mut *guard;
        let name = next_auto_name(ticket, |candidate| sessions.contains_key(candidate));
        let session = build(name.clone());
        sessions.insert(name, session.clone());
        session
    }

    pub fn find(&self, name: &str) -> Option<Arc<Session>> {
        self.inner.lock().sessions.get(name).cloned()
    }

    pub fn list(&self) -> Vec<Arc<Session>> {
        self.inner.lock().sessions.values().cloned().collect()
    }

    /// Succeeds only when `registry[session.name()] == session` and
    /// `new_name` is unused; old and new keys are swapped atomically.
    pub fn rename(&self, session: &Arc<Session>, new_name: &str) -> bool {
        let mut guard = self.inner.lock();
        let current = session.name();
        match guard.sessions.get(&current) {
            Some(existing) if Arc::ptr_eq(existing, session) => {}
            _ => return false,
        }
        if guard.sessions.contains_key(new_name) {
            return false;
        }
        guard.sessions.remove(&current);
        session.set_name(new_name.to_string());
        guard.sessions.insert(new_name.to_string(), session.clone());
        true
    }

    /// Succeeds only when `registry[session.name()] == session`.
    pub fn remove(&self, session: &Arc<Session>) -> bool {
        let mut guard = self.inner.lock();
        let current = session.name();
        match guard.sessions.get(&current) {
            Some(existing) if Arc::ptr_eq(existing, session) => {
                guard.sessions.remove(&current);
                true
            }
            _ => false,
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
