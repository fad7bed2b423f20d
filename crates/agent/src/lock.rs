//! Processing Lock Manager: a process-local lock table keyed by
//! conversation id, serializing bot and operator writers on the same
//! thread of conversation. Lock identity is time-bounded: expiry is
//! evaluated lazily at check time, with a background sweep as backstop,
//! so an abandoned lock can never wedge a conversation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LockType {
    BotProcessing,
    OwnerSending,
    General,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockInfo {
    pub conversation_id: String,
    pub lock_type: LockType,
    pub acquired_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl LockInfo {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let Ok(ttl) = chrono::Duration::from_std(self.ttl) else {
            return true;
        };
        now >= self.acquired_at + ttl
    }
}

/// Injected time source so TTL behavior is testable without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(now)) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = match self.now.lock() {
            Ok(now) => now,
            Err(poisoned) => poisoned.into_inner(),
        };
        *now += chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct ProcessingLockManager {
    locks: Mutex<HashMap<String, LockInfo>>,
    clock: Arc<dyn Clock>,
}

impl ProcessingLockManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { locks: Mutex::new(HashMap::new()), clock }
    }

    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<String, LockInfo>> {
        match self.locks.lock() {
            Ok(table) => table,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Installs a lock for the conversation if it is unlocked, or if the
    /// existing record has passed its expiry.
    pub fn acquire(&self, conversation_id: &str, lock_type: LockType, ttl: Duration) -> bool {
        let now = self.clock.now();
        let mut table = self.table();

        if let Some(existing) = table.get(conversation_id) {
            if !existing.is_expired(now) {
                return false;
            }
        }

        table.insert(
            conversation_id.to_string(),
            LockInfo {
                conversation_id: conversation_id.to_string(),
                lock_type,
                acquired_at: now,
                ttl,
            },
        );
        true
    }

    /// Unconditionally clears the record for the conversation.
    pub fn release(&self, conversation_id: &str) {
        self.table().remove(conversation_id);
    }

    /// Current lock status; an expired record is removed and reported as
    /// unlocked.
    pub fn is_locked(&self, conversation_id: &str) -> Option<LockInfo> {
        let now = self.clock.now();
        let mut table = self.table();

        match table.get(conversation_id) {
            Some(existing) if existing.is_expired(now) => {
                table.remove(conversation_id);
                None
            }
            Some(existing) => Some(existing.clone()),
            None => None,
        }
    }

    /// Cooperatively polls until the conversation unlocks. Returns false on
    /// timeout with the lock still held.
    pub async fn wait_for_release(&self, conversation_id: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.is_locked(conversation_id).is_none() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL.min(timeout)).await;
        }
    }

    /// Drops every expired record; redundant with lazy expiry so abandoned
    /// locks cannot grow the table unbounded.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut table = self.table();
        let before = table.len();
        table.retain(|_, info| !info.is_expired(now));
        before - table.len()
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Background sweep on a fixed interval. The handle aborts with the
    /// owning runtime on shutdown.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let purged = self.purge_expired();
                if purged > 0 {
                    tracing::debug!(
                        event_name = "lock.sweep",
                        purged,
                        "purged expired conversation locks"
                    );
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;

    use super::{LockType, ManualClock, ProcessingLockManager};

    fn manager() -> (ProcessingLockManager, ManualClock) {
        let clock = ManualClock::starting_at(Utc::now());
        let manager = ProcessingLockManager::new(Arc::new(clock.clone()));
        (manager, clock)
    }

    #[test]
    fn acquire_on_unexpired_lock_fails() {
        let (manager, _clock) = manager();

        assert!(manager.acquire("wa-1", LockType::BotProcessing, Duration::from_secs(30)));
        assert!(!manager.acquire("wa-1", LockType::OwnerSending, Duration::from_secs(30)));
    }

    #[test]
    fn acquire_succeeds_after_ttl_without_release() {
        let (manager, clock) = manager();

        assert!(manager.acquire("wa-1", LockType::BotProcessing, Duration::from_secs(30)));
        clock.advance(Duration::from_secs(31));
        assert!(manager.acquire("wa-1", LockType::BotProcessing, Duration::from_secs(30)));
    }

    #[test]
    fn distinct_conversations_never_contend() {
        let (manager, _clock) = manager();

        assert!(manager.acquire("wa-1", LockType::BotProcessing, Duration::from_secs(30)));
        assert!(manager.acquire("wa-2", LockType::BotProcessing, Duration::from_secs(30)));
    }

    #[test]
    fn is_locked_lazily_expires() {
        let (manager, clock) = manager();

        manager.acquire("wa-1", LockType::BotProcessing, Duration::from_secs(10));
        assert!(manager.is_locked("wa-1").is_some());

        clock.advance(Duration::from_secs(11));
        assert!(manager.is_locked("wa-1").is_none());
        assert!(manager.is_empty(), "expired record should be removed on check");
    }

    #[test]
    fn release_clears_unconditionally() {
        let (manager, _clock) = manager();

        manager.acquire("wa-1", LockType::OwnerSending, Duration::from_secs(30));
        manager.release("wa-1");
        assert!(manager.is_locked("wa-1").is_none());
    }

    #[test]
    fn purge_drops_only_expired_records() {
        let (manager, clock) = manager();

        manager.acquire("wa-1", LockType::BotProcessing, Duration::from_secs(5));
        manager.acquire("wa-2", LockType::BotProcessing, Duration::from_secs(60));
        clock.advance(Duration::from_secs(10));

        assert_eq!(manager.purge_expired(), 1);
        assert!(manager.is_locked("wa-2").is_some());
    }

    #[tokio::test]
    async fn wait_for_release_returns_once_unlocked() {
        let (manager, _clock) = manager();
        let manager = Arc::new(manager);

        manager.acquire("wa-1", LockType::BotProcessing, Duration::from_secs(30));

        let waiter = Arc::clone(&manager);
        let handle = tokio::spawn(async move {
            waiter.wait_for_release("wa-1", Duration::from_secs(2)).await
        });

        tokio::time::sleep(Duration::from_millis(80)).await;
        manager.release("wa-1");

        assert!(handle.await.expect("waiter task"));
    }

    #[tokio::test]
    async fn wait_for_release_times_out_while_held() {
        let (manager, _clock) = manager();

        manager.acquire("wa-1", LockType::BotProcessing, Duration::from_secs(30));
        let released = manager.wait_for_release("wa-1", Duration::from_millis(120)).await;

        assert!(!released);
    }

    #[test]
    fn lock_info_reports_type_and_ttl() {
        let (manager, _clock) = manager();

        manager.acquire("wa-1", LockType::OwnerSending, Duration::from_secs(15));
        let info = manager.is_locked("wa-1").expect("lock present");

        assert_eq!(info.lock_type, LockType::OwnerSending);
        assert_eq!(info.ttl, Duration::from_secs(15));
        assert_eq!(info.conversation_id, "wa-1");
    }
}
