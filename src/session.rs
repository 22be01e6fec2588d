//! Session table: process-wide, per-user dialog state.
//!
//! Each user gets their own slot (an async mutex around `Option<Session>`)
//! inside a sharded map. Holding a slot's guard serializes every
//! read-modify-write for that user, including the store call that ends the
//! dialog, while users in other slots proceed independently. Empty slots
//! are dropped from the map once nobody holds them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::dialog::{Session, UserId};

type Slot = Arc<Mutex<Option<Session>>>;

/// Concurrency-safe map from user identity to in-progress session.
#[derive(Default)]
pub struct SessionTable {
    slots: DashMap<UserId, Slot>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take exclusive access to one user's session.
    ///
    /// Waits while another task holds the same user's guard. Never waits on
    /// other users.
    pub async fn lock(&self, user_id: UserId) -> SessionGuard<'_> {
        // The map entry must be released before awaiting the slot.
        let slot = Arc::clone(self.slots.entry(user_id).or_default().value());
        let guard = slot.lock_owned().await;
        SessionGuard {
            table: self,
            user_id,
            guard: Some(guard),
        }
    }

    /// Copy of the user's current session, if any.
    pub async fn get(&self, user_id: UserId) -> Option<Session> {
        self.lock(user_id).await.get().cloned()
    }

    /// Replace the user's session.
    pub async fn set(&self, user_id: UserId, session: Session) {
        self.lock(user_id).await.set(session);
    }

    /// Remove the user's session. Returns the removed session, if any.
    pub async fn remove(&self, user_id: UserId) -> Option<Session> {
        self.lock(user_id).await.remove()
    }

    /// Number of users with a slot in the map (held or holding a session).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop sessions untouched for longer than `max_idle` (abandoned
    /// dialogs). Slots currently held are skipped. Returns how many
    /// sessions were dropped.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        let now = Utc::now();
        let mut pruned = 0;
        self.slots.retain(|user_id, slot| {
            let Ok(mut session) = slot.try_lock() else {
                return true;
            };
            let idle = session.as_ref().is_some_and(|s| {
                now.signed_duration_since(s.updated_at)
                    .to_std()
                    .is_ok_and(|elapsed| elapsed > max_idle)
            });
            if idle {
                debug!(user_id, "Pruning idle session");
                *session = None;
                pruned += 1;
            }
            session.is_some() || Arc::strong_count(slot) > 1
        });
        if pruned > 0 {
            info!(pruned, "Pruned idle sessions");
        }
        pruned
    }

    fn reclaim(&self, user_id: UserId) {
        self.slots.remove_if(&user_id, |_, slot| {
            Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|s| s.is_none())
        });
    }
}

/// Exclusive access to one user's session for the guard's lifetime.
pub struct SessionGuard<'a> {
    table: &'a SessionTable,
    user_id: UserId,
    guard: Option<OwnedMutexGuard<Option<Session>>>,
}

impl SessionGuard<'_> {
    pub fn get(&self) -> Option<&Session> {
        self.guard.as_ref().and_then(|g| g.as_ref())
    }

    pub fn set(&mut self, session: Session) {
        if let Some(g) = self.guard.as_mut() {
            **g = Some(session);
        }
    }

    pub fn remove(&mut self) -> Option<Session> {
        self.guard.as_mut().and_then(|g| g.take())
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        let empty = self.guard.as_ref().is_some_and(|g| g.is_none());
        // Release the lock (and our reference to the slot) before reclaiming.
        self.guard.take();
        if empty {
            self.table.reclaim(self.user_id);
        }
    }
}
