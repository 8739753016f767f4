//! Shared application state: the composition root every component hangs off.

pub mod chat;
pub mod debounce;
pub mod events;
pub mod library;
pub mod room;
pub mod session;

use std::sync::{Arc, Mutex};

use tokio::sync::{RwLock, watch};

use crate::catalog::CatalogClient;
use crate::config::AppConfig;
use crate::dao::documents::CandidateId;
use crate::dao::local::LocalStore;
use crate::dao::sync_store::SyncStore;

pub use self::chat::ChatState;
pub use self::debounce::Debouncer;
pub use self::events::EventHub;
pub use self::library::Library;
pub use self::room::{RoomPhase, RoomState};
pub use self::session::SessionState;

/// Cheap clonable handle to [`AppState`].
pub type SharedState = Arc<AppState>;

/// Broadcast capacity of the UI event hub.
const EVENT_HUB_CAPACITY: usize = 32;

/// Central application state owned by the composition root; components
/// receive it by handle and never reach into ambient globals.
pub struct AppState {
    config: AppConfig,
    local: LocalStore,
    catalog: Option<CatalogClient>,
    sync_store: RwLock<Option<Arc<dyn SyncStore>>>,
    degraded: watch::Sender<bool>,
    events: EventHub,
    session: SessionState,
    room: RoomState,
    library: RwLock<Library>,
    chat: ChatState,
    last_pick: Mutex<Option<CandidateId>>,
    save_debouncer: Debouncer,
}

impl AppState {
    /// Construct the shared state from configuration, loading the library
    /// from local storage. Starts in degraded mode until a sync store is
    /// installed.
    pub fn new(config: AppConfig) -> SharedState {
        let local = LocalStore::open(&config.data_dir);
        let library = Library::load(&local);
        let catalog = config
            .catalog
            .as_ref()
            .map(|settings| CatalogClient::new(&settings.base_url, settings.api_key.clone()));
        let (degraded_tx, _rx) = watch::channel(true);

        Arc::new(Self {
            config,
            local,
            catalog,
            sync_store: RwLock::new(None),
            degraded: degraded_tx,
            events: EventHub::new(EVENT_HUB_CAPACITY),
            session: SessionState::new(),
            room: RoomState::default(),
            library: RwLock::new(library),
            chat: ChatState::default(),
            last_pick: Mutex::new(None),
            save_debouncer: Debouncer::new(),
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// On-device blob store.
    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    /// Catalog client, `None` when the feature is unconfigured.
    pub fn catalog(&self) -> Option<&CatalogClient> {
        self.catalog.as_ref()
    }

    /// Obtain a handle to the current sync store, if one is installed.
    pub async fn sync_store(&self) -> Option<Arc<dyn SyncStore>> {
        let guard = self.sync_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a sync store implementation and leave degraded mode.
    pub async fn install_sync_store(&self, store: Arc<dyn SyncStore>) {
        {
            let mut guard = self.sync_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current sync store and enter degraded mode.
    pub async fn clear_sync_store(&self) {
        {
            let mut guard = self.sync_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.sync_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        if *self.degraded.borrow() == value {
            return;
        }
        let _ = self.degraded.send(value);
    }

    /// Hub feeding the UI event stream.
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Current identity state.
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Room synchronization bookkeeping.
    pub fn room(&self) -> &RoomState {
        &self.room
    }

    /// Pool/watched/filters/prefs aggregate.
    pub fn library(&self) -> &RwLock<Library> {
        &self.library
    }

    /// Chat bookkeeping for the active room.
    pub fn chat(&self) -> &ChatState {
        &self.chat
    }

    /// Remember the locally picked candidate for reroll avoidance.
    pub fn set_last_pick(&self, id: Option<CandidateId>) {
        *self.last_pick.lock().expect("app state poisoned") = id;
    }

    /// The last locally picked candidate.
    pub fn last_pick(&self) -> Option<CandidateId> {
        *self.last_pick.lock().expect("app state poisoned")
    }

    /// Debouncer collapsing rapid remote saves.
    pub fn save_debouncer(&self) -> &Debouncer {
        &self.save_debouncer
    }
}
