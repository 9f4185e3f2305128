pub mod game;
pub mod registry;
pub mod rounds;
mod sse;
pub mod state_machine;

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tracing::info;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::game_store::GameStore,
    dto::sse::{ServerEvent, SystemStatus},
    services::timers::TimerOrchestrator,
};

pub use self::sse::SseHub;
use self::{registry::GameRegistry, sse::SseState};

pub type SharedState = Arc<AppState>;

#[derive(Clone)]
/// Handle used to push messages to a connected controller hub.
pub struct ControllerConnection {
    /// Game the hub identified for.
    pub game_id: Uuid,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Last persisted ticket of a game, guarding against out-of-order saves.
pub type PersistGuard = Arc<Mutex<u64>>;

/// Central application state: hosted games, their timers, fan-out channels and storage.
pub struct AppState {
    config: Arc<AppConfig>,
    registry: GameRegistry,
    timers: TimerOrchestrator,
    sse: SseState,
    controllers: DashMap<Uuid, ControllerConnection>,
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    degraded: watch::Sender<bool>,
    persist_tickets: AtomicU64,
    persisted: DashMap<Uuid, PersistGuard>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            registry: GameRegistry::new(config.max_games()),
            config: Arc::new(config),
            timers: TimerOrchestrator::new(),
            sse: SseState::default(),
            controllers: DashMap::new(),
            game_store: RwLock::new(None),
            degraded: degraded_tx,
            persist_tickets: AtomicU64::new(0),
            persisted: DashMap::new(),
        })
    }

    /// Shared immutable configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Hosted games.
    pub fn registry(&self) -> &GameRegistry {
        &self.registry
    }

    /// Named per-game timers.
    pub fn timers(&self) -> &TimerOrchestrator {
        &self.timers
    }

    /// Obtain a handle to the current game store, unless running degraded.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        if self.is_degraded() {
            return None;
        }
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn set_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update the degraded flag, notifying watchers and SSE clients when it changes.
    pub fn update_degraded(&self, value: bool) {
        let changed = self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
        if !changed {
            return;
        }
        info!(degraded = value, "storage availability changed");
        if let Ok(event) = ServerEvent::json(
            Some("system.status".to_string()),
            &SystemStatus { degraded: value },
        ) {
            self.public_sse().broadcast(event.clone());
            self.admin_sse().broadcast(event);
        }
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        self.sse.public()
    }

    /// Broadcast hub used for the admin SSE stream.
    pub fn admin_sse(&self) -> &SseHub {
        self.sse.admin().hub()
    }

    /// Token guard that ensures a single admin SSE subscriber at a time.
    pub fn admin_token(&self) -> &Mutex<Option<String>> {
        self.sse.admin().token()
    }

    /// Registry of live controller sockets keyed by connection id.
    pub fn controllers(&self) -> &DashMap<Uuid, ControllerConnection> {
        &self.controllers
    }

    /// Monotonic ticket ordering snapshots taken for persistence.
    pub fn next_persist_ticket(&self) -> u64 {
        self.persist_tickets.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Per-game guard holding the last persisted ticket.
    pub fn persist_guard(&self, game_id: Uuid) -> PersistGuard {
        self.persisted.entry(game_id).or_default().clone()
    }

    /// Forget the persistence bookkeeping of a removed game.
    pub fn forget_persisted(&self, game_id: Uuid) {
        self.persisted.remove(&game_id);
    }
}
