use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use lablingo::{Controller, EncodeSlot};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::info;
use uuid::Uuid;

/// Upper bound on how long an expired session can linger before a sweep.
const MAX_SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// One browser session: its form state and the uploaded file, if any
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub controller: Controller,
    pub upload: EncodeSlot,
}

impl Session {
    pub fn new(controller: Controller) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            controller,
            upload: EncodeSlot::new(),
        }
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

/// Trait for storing and retrieving sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn insert(&self, session: Session) -> SessionHandle;
    async fn get(&self, id: &str) -> Option<SessionHandle>;
    async fn delete(&self, id: &str) -> bool;
    /// Drop sessions nobody has looked up for `max_idle`, returning how many
    /// went. Sessions in use or waiting on the model are kept.
    async fn evict_idle(&self, max_idle: Duration) -> usize;
}

struct StoredSession {
    handle: SessionHandle,
    last_seen: DateTime<Utc>,
}

/// In-memory implementation of SessionStorage; nothing outlives the process
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, StoredSession>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for InMemorySessionStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn insert(&self, session: Session) -> SessionHandle {
        let id = session.id.clone();
        let handle = Arc::new(Mutex::new(session));
        self.sessions.insert(
            id,
            StoredSession {
                handle: handle.clone(),
                last_seen: Utc::now(),
            },
        );
        handle
    }

    async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.get_mut(id).map(|mut entry| {
            entry.last_seen = Utc::now();
            entry.handle.clone()
        })
    }

    async fn delete(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    async fn evict_idle(&self, max_idle: Duration) -> usize {
        let Some(cutoff) = TimeDelta::from_std(max_idle)
            .ok()
            .and_then(|max_idle| Utc::now().checked_sub_signed(max_idle))
        else {
            return 0;
        };
        let mut evicted = 0;

        self.sessions.retain(|_, stored| {
            if stored.last_seen > cutoff {
                return true;
            }
            // A held lock means a request is working on the session right now.
            let keep = match stored.handle.try_lock() {
                Ok(session) => session.controller.is_analyzing(),
                Err(_) => true,
            };
            if !keep {
                evicted += 1;
            }
            keep
        });

        evicted
    }
}

/// Periodically evict sessions idle for longer than `max_idle`.
pub fn spawn_idle_sweeper(storage: Arc<dyn SessionStorage>, max_idle: Duration) -> JoinHandle<()> {
    let period = max_idle.min(MAX_SWEEP_PERIOD).max(Duration::from_millis(1));

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = storage.evict_idle(max_idle).await;
            if evicted > 0 {
                info!(evicted, "Evicted idle sessions");
            }
        }
    })
}
