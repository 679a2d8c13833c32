//! The sync engine: save-status machine, single-flight save, load and autosave.
//!
//! Lifecycle: [`SyncEngine::new`] probes the container and installs the
//! bookkeeping namespace; nothing is read or written remotely until the host
//! calls [`SyncEngine::set_environment_ready`], which loads the remote state
//! and starts autosave. Saves requested before that first load completes
//! are skipped. [`SyncEngine::destroy`] detaches everything but lets work
//! already in flight run to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use chrono::{DateTime, Utc};
use statesync_core::{
    codec, FileMetadata, HostContainer, NoopHooks, Notice, ProjectFileClient, SaveStatus,
    SaveVerdict, StateValue, SyncError, UiHooks, Unsubscribe,
};
use tokio::sync::{watch, OnceCell};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::adapter::{probe_adapter, StoreAdapter, WriteMarks};
use crate::config::EngineConfig;
use crate::locator::FileLocator;
use crate::retry;

/// Result of a [`SyncEngine::save`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// State written remotely.
    Saved,
    /// Not attempted: another save was in flight, or the engine is not running.
    Skipped,
    /// Aborted by the before-save hook.
    Vetoed,
    /// Attempted and failed after retries.
    Failed,
}

impl SaveOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SaveOutcome::Saved)
    }
}

/// Clears a flag when dropped.
struct FlagGuard<'a>(&'a AtomicBool);

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SyncEngine {
    config: EngineConfig,
    adapter: Arc<dyn StoreAdapter>,
    client: Arc<dyn ProjectFileClient>,
    locator: FileLocator,
    hooks: RwLock<Arc<dyn UiHooks>>,
    status: Mutex<SaveStatus>,
    last_saved_at: Mutex<Option<DateTime<Utc>>>,
    ready: AtomicBool,
    /// Outcome of the load run by the first readiness signal
    initial_load: OnceCell<bool>,
    destroyed: AtomicBool,
    /// Single-flight flag for `save`
    saving: AtomicBool,
    /// Marks the thread writing remote state into the container
    applying_remote: WriteMarks,
    subscription: Mutex<Option<Unsubscribe>>,
    /// Flipped to `true` on destroy; the autosave loop watches it between ticks
    shutdown: watch::Sender<bool>,
}

impl SyncEngine {
    /// Bind an engine to `container`.
    ///
    /// Fails with a configuration error if `config` is invalid or the
    /// container offers no supported shape.
    pub fn new(
        container: Arc<dyn HostContainer>,
        client: Arc<dyn ProjectFileClient>,
        config: EngineConfig,
    ) -> Result<Arc<Self>, SyncError> {
        config.validate()?;
        let adapter = probe_adapter(container)?;
        adapter.setup();
        info!(
            "Sync engine bound to a {} container (project {}, key {})",
            adapter.kind(),
            config.project_id,
            config.storage_key
        );

        let locator = FileLocator::new(Arc::clone(&client), &config);
        let (shutdown, _) = watch::channel(false);
        let engine = Arc::new(Self {
            config,
            adapter,
            client,
            locator,
            hooks: RwLock::new(Arc::new(NoopHooks)),
            status: Mutex::new(SaveStatus::Saved),
            last_saved_at: Mutex::new(None),
            ready: AtomicBool::new(false),
            initial_load: OnceCell::new(),
            destroyed: AtomicBool::new(false),
            saving: AtomicBool::new(false),
            applying_remote: WriteMarks::default(),
            subscription: Mutex::new(None),
            shutdown,
        });

        let weak: Weak<SyncEngine> = Arc::downgrade(&engine);
        let subscription = engine.adapter.subscribe(Arc::new(move || {
            if let Some(engine) = weak.upgrade() {
                engine.on_mutation();
            }
        }));
        *engine.subscription.lock().expect("subscription lock poisoned") = Some(subscription);

        Ok(engine)
    }

    /// Install the host's UI hooks.
    pub fn set_host(&self, hooks: Arc<dyn UiHooks>) {
        *self.hooks.write().expect("hooks lock poisoned") = hooks;
    }

    pub fn status(&self) -> SaveStatus {
        *self.status.lock().expect("status lock poisoned")
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        *self.last_saved_at.lock().expect("last_saved_at lock poisoned")
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn is_running(&self) -> bool {
        self.is_ready() && !self.is_destroyed()
    }

    fn hooks(&self) -> Arc<dyn UiHooks> {
        Arc::clone(&self.hooks.read().expect("hooks lock poisoned"))
    }

    fn set_status(&self, status: SaveStatus) {
        let previous = std::mem::replace(
            &mut *self.status.lock().expect("status lock poisoned"),
            status,
        );
        if previous != status {
            debug!("Save status {} -> {}", previous, status);
        }
        // The bookkeeping namespace is gone once destroyed; do not bring it back.
        if !self.is_destroyed() {
            self.adapter.update_save_status(status);
        }
    }

    fn on_mutation(&self) {
        if !self.is_running() || self.applying_remote.on_current_thread() {
            return;
        }
        {
            let mut status = self.status.lock().expect("status lock poisoned");
            match *status {
                SaveStatus::Saved => *status = SaveStatus::Unsaved,
                // A save in flight settles the status itself; UNSAVED is already there.
                SaveStatus::Saving | SaveStatus::Unsaved => return,
            }
        }
        debug!("Save status SAVED -> UNSAVED");
        self.adapter.update_save_status(SaveStatus::Unsaved);
    }

    /// Write remote state into the container without it counting as a user change.
    fn apply_remote(&self, state: StateValue) {
        self.applying_remote.write(|| self.adapter.replace_state(state));
    }

    /// Signal that the host environment is ready: load the remote state and
    /// start autosave. Later calls load nothing and wait for the first one.
    ///
    /// # Returns
    /// Whether the initial load left the state usable (it succeeded or found
    /// nothing); every call reports that same first outcome
    pub async fn set_environment_ready(self: &Arc<Self>) -> bool {
        if self.is_destroyed() {
            warn!("Ignoring readiness signal on a destroyed engine");
            return false;
        }
        if self.initial_load.initialized() {
            debug!("Environment already ready");
        }
        *self
            .initial_load
            .get_or_init(|| async {
                self.ready.store(true, Ordering::SeqCst);
                info!("Environment ready, loading {}", self.config.storage_key);
                let loaded = self.load().await;
                self.start_autosave();
                loaded
            })
            .await
    }

    fn start_autosave(self: &Arc<Self>) {
        let period = self.config.autosave_interval;
        if period.is_zero() {
            debug!("Autosave disabled");
            return;
        }

        let weak = Arc::downgrade(self);
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // Stops only between ticks: a save already started runs to completion.
                // The wait also ends, with an error, once the engine is dropped.
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.wait_for(|stopped| *stopped) => break,
                }
                let Some(engine) = weak.upgrade() else {
                    break;
                };
                if engine.is_destroyed() {
                    break;
                }
                engine.autosave_tick().await;
            }
            debug!("Autosave stopped");
        });
    }

    async fn autosave_tick(&self) {
        if self.status() == SaveStatus::Saved {
            debug!("Autosave: nothing to save");
            return;
        }
        let outcome = self.save().await;
        debug!("Autosave finished: {:?}", outcome);
    }

    /// Write the container state to the backing file.
    ///
    /// At most one save runs at a time; a call made while another is in
    /// flight, or before the initial load has completed, returns
    /// [`SaveOutcome::Skipped`] without touching the status.
    #[instrument(skip(self), level = "debug")]
    pub async fn save(&self) -> SaveOutcome {
        if !self.is_running() {
            debug!("Save skipped: engine not running");
            return SaveOutcome::Skipped;
        }
        if !self.initial_load.initialized() {
            debug!("Save skipped: initial load still running");
            return SaveOutcome::Skipped;
        }
        if self
            .saving
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Save skipped: another save is in flight");
            return SaveOutcome::Skipped;
        }
        let _flight = FlagGuard(&self.saving);

        let hooks = self.hooks();
        if let SaveVerdict::Veto(message) = hooks.before_save().await {
            info!("Save vetoed by host");
            if let Some(message) = message.filter(|m| !m.is_empty()) {
                hooks.notify(Notice::warning(message));
            }
            return SaveOutcome::Vetoed;
        }

        self.set_status(SaveStatus::Saving);
        hooks.set_busy(true);
        let result = self.write_state().await;
        hooks.set_busy(false);

        match result {
            Ok(file_name) => {
                self.set_status(SaveStatus::Saved);
                *self.last_saved_at.lock().expect("last_saved_at lock poisoned") =
                    Some(Utc::now());
                info!("Saved {} to {}", self.config.storage_key, file_name);
                SaveOutcome::Saved
            }
            Err(e) => {
                self.set_status(SaveStatus::Unsaved);
                warn!("Save of {} failed: {}", self.config.storage_key, e);
                hooks.notify(Notice::error(format!("Saving failed: {}", e.root())));
                SaveOutcome::Failed
            }
        }
    }

    async fn write_state(&self) -> Result<String, SyncError> {
        let key = self.locator.key().await?;
        let file_name = self
            .locator
            .resolve(&key, || codec::encode(&self.adapter.get_state()))
            .await?;
        let document = codec::encode(&self.adapter.get_state())?;

        retry::run_logged("Save state", &self.config.save_retry, || {
            self.client
                .save_file_content(&self.config.project_id, &file_name, &document)
        })
        .await?;
        Ok(file_name)
    }

    /// Replace the container state with the backing file's content.
    ///
    /// A missing or empty file leaves the container as is and marks it
    /// UNSAVED. On failure the container is left untouched.
    ///
    /// # Returns
    /// `false` if the engine is not running or the load failed
    #[instrument(skip(self), level = "debug")]
    pub async fn load(&self) -> bool {
        if !self.is_running() {
            debug!("Load skipped: engine not running");
            return false;
        }

        let hooks = self.hooks();
        hooks.set_busy(true);
        let result = self.read_state().await;
        hooks.set_busy(false);

        match result {
            Ok(Some(state)) => {
                self.apply_remote(state);
                self.set_status(SaveStatus::Saved);
                info!("Loaded {}", self.config.storage_key);
                true
            }
            Ok(None) => {
                info!("No saved state for {} yet", self.config.storage_key);
                self.set_status(SaveStatus::Unsaved);
                true
            }
            Err(e) => {
                warn!("Load of {} failed: {}", self.config.storage_key, e);
                hooks.notify(Notice::error(format!("Loading failed: {}", e.root())));
                self.set_status(SaveStatus::Unsaved);
                false
            }
        }
    }

    async fn read_state(&self) -> Result<Option<StateValue>, SyncError> {
        let key = self.locator.key().await?;
        let file_name = self
            .locator
            .resolve(&key, || codec::encode(&self.adapter.get_state()))
            .await?;
        self.read_file(&file_name).await
    }

    async fn read_file(&self, file_name: &str) -> Result<Option<StateValue>, SyncError> {
        let content = retry::run_logged("Load state", &self.config.load_retry, || {
            self.client
                .get_file_content(&self.config.project_id, file_name)
        })
        .await?;

        match content {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(document) => codec::decode(&document).map(Some),
        }
    }

    /// Let the user pick another project file, load it and make it the
    /// backing file of the current key.
    ///
    /// # Returns
    /// `true` if a file was loaded; `false` if the user cancelled or the
    /// file could not be read, in which case nothing changes
    #[instrument(skip(self), level = "debug")]
    pub async fn prompt_load_from_file(&self) -> bool {
        if !self.is_running() {
            debug!("Prompt load skipped: engine not running");
            return false;
        }

        let hooks = self.hooks();
        let Some(file_name) = hooks.pick_file().await else {
            debug!("File selection cancelled");
            return false;
        };

        hooks.set_busy(true);
        let result = self.load_and_repoint(&file_name).await;
        hooks.set_busy(false);

        match result {
            Ok(state) => {
                self.apply_remote(state);
                self.set_status(SaveStatus::Saved);
                info!("Loaded {} from {}", self.config.storage_key, file_name);
                hooks.notify(Notice::info(format!("Loaded {}", file_name)));
                true
            }
            Err(e) => {
                warn!("Loading from {} failed: {}", file_name, e);
                hooks.notify(Notice::error(format!(
                    "Could not load {}: {}",
                    file_name,
                    e.root()
                )));
                false
            }
        }
    }

    async fn load_and_repoint(&self, file_name: &str) -> Result<StateValue, SyncError> {
        let state = self
            .read_file(file_name)
            .await?
            .ok_or_else(|| SyncError::Decoding(format!("{} holds no state", file_name)))?;
        let key = self.locator.key().await?;
        self.locator.repoint(&key, file_name).await?;
        Ok(state)
    }

    /// Metadata of the backing file. Does not provision one.
    ///
    /// # Returns
    /// `None` if no file is mapped yet or the service could not be reached
    pub async fn file_metadata(&self) -> Option<FileMetadata> {
        let result: Result<Option<FileMetadata>, SyncError> = async {
            let key = self.locator.key().await?;
            let Some(file_name) = self.locator.lookup(&key).await? else {
                return Ok(None);
            };
            retry::run_logged("Read file metadata", &self.config.load_retry, || {
                self.client
                    .get_file_metadata(&self.config.project_id, &file_name)
            })
            .await
        }
        .await;

        result.unwrap_or_else(|e| {
            warn!("Could not read file metadata: {}", e);
            None
        })
    }

    /// Detach from the container: stop tracking, stop autosave and remove
    /// the bookkeeping namespace. A save or load already in flight finishes
    /// but no longer mirrors its status. Later calls do nothing.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(subscription) = self
            .subscription
            .lock()
            .expect("subscription lock poisoned")
            .take()
        {
            subscription.unsubscribe();
        }
        self.shutdown.send_replace(true);
        self.adapter.destroy();
        info!("Sync engine for {} destroyed", self.config.storage_key);
    }
}
