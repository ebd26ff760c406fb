pub mod catalog;
pub mod session;
mod sse;
pub mod state_machine;
pub mod store;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};

use crate::{config::AppConfig, engine::SensorHost, services::gameplay::SessionRuntime};

pub use self::catalog::{CatalogError, DeckCatalog};
pub use self::sse::SseHub;
pub use self::state_machine::{SessionAction, Snapshot, Transition};
pub use self::store::SessionStore;

pub type SharedState = Arc<AppState>;

const SSE_CAPACITY: usize = 64;

/// Central application state: the session store, the deck catalog and the live connections.
pub struct AppState {
    config: AppConfig,
    store: SessionStore,
    catalog: RwLock<DeckCatalog>,
    sse: SseHub,
    sensor_hosts: DashMap<String, Arc<dyn SensorHost>>,
    runtime: Mutex<Option<Arc<SessionRuntime>>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig, catalog: DeckCatalog) -> SharedState {
        let store = SessionStore::new(
            config.gameplay.session_duration,
            config.gameplay.ready_countdown,
        );
        Arc::new(Self {
            config,
            store,
            catalog: RwLock::new(catalog),
            sse: SseHub::new(SSE_CAPACITY),
            sensor_hosts: DashMap::new(),
            runtime: Mutex::new(None),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Store owning the game session.
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Deck catalog offered on the picker.
    pub fn catalog(&self) -> &RwLock<DeckCatalog> {
        &self.catalog
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        &self.sse
    }

    /// Sensor hosts of connected headsets keyed by player id.
    pub fn sensor_hosts(&self) -> &DashMap<String, Arc<dyn SensorHost>> {
        &self.sensor_hosts
    }

    /// Sensor host registered for `player_id`, if its headset is connected.
    pub fn sensor_host(&self, player_id: &str) -> Option<Arc<dyn SensorHost>> {
        self.sensor_hosts
            .get(player_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Slot holding the runtime of the running session. Locking it serializes
    /// session start, cancellation and completion.
    pub fn runtime(&self) -> &Mutex<Option<Arc<SessionRuntime>>> {
        &self.runtime
    }

    /// Snapshot the current session state.
    pub async fn snapshot(&self) -> Snapshot {
        self.store.get_state().await
    }
}
