//! Mutual exclusion for webhook processing

use crate::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Proof of a held lock, handed back on release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    pub key: String,
    pub token: String,
}

/// Keyed locks shared by every process sending webhooks
#[async_trait]
pub trait LockService: Send + Sync {
    /// `None` when the key is already held
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockHandle>>;

    async fn release(&self, handle: LockHandle) -> Result<()>;
}

#[derive(Debug)]
struct HeldLock {
    token: String,
    expires_at: Instant,
}

/// Process-local locks that expire after their TTL
#[derive(Debug, Default)]
pub struct InMemoryLockService {
    locks: DashMap<String, HeldLock>,
}

impl InMemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.locks
            .get(key)
            .is_some_and(|lock| lock.expires_at > Instant::now())
    }

    /// Number of entries, expired ones included until replaced
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[async_trait]
impl LockService for InMemoryLockService {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockHandle>> {
        let now = Instant::now();
        let token = Uuid::new_v4().to_string();

        let mut entry = self.locks.entry(key.to_string()).or_insert_with(|| HeldLock {
            token: String::new(),
            expires_at: now,
        });
        if entry.expires_at > now {
            return Ok(None);
        }

        entry.token = token.clone();
        entry.expires_at = now + ttl;

        Ok(Some(LockHandle {
            key: key.to_string(),
            token,
        }))
    }

    async fn release(&self, handle: LockHandle) -> Result<()> {
        // a lock that expired and was taken over belongs to someone else now
        self.locks
            .remove_if(&handle.key, |_, lock| lock.token == handle.token);
        Ok(())
    }
}
