// ABOUTME: Shared application state for the partshelf HTTP server.
// ABOUTME: Holds config, the log channel, the orchestrator, per-instance locks, and the retention policy sender.

use std::sync::Arc;

use tokio::sync::watch;

use partshelf_converter::{ConverterRuntime, Easyeda2Kicad, Orchestrator};
use partshelf_core::LogBroadcaster;
use partshelf_store::{LibraryInstance, LibraryLocks, RetentionPolicy, SelectorError, resolve_active};

use crate::config::ServerConfig;
use crate::settings::RuntimeSettings;

/// Shared application state accessible by all Axum handlers.
pub struct AppState {
    pub config: ServerConfig,
    pub log: LogBroadcaster,
    pub orchestrator: Orchestrator,
    pub locks: LibraryLocks,
    retention: watch::Sender<RetentionPolicy>,
}

/// Type alias for the Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    /// State backed by the real easyeda2kicad process runtime.
    pub fn new(config: ServerConfig, log: LogBroadcaster) -> Self {
        let converter = Easyeda2Kicad::new(config.converter_program.clone())
            .with_timeout(config.converter_timeout);
        Self::with_converter(config, log, Arc::new(converter))
    }

    /// State with an arbitrary converter runtime (scripted in tests).
    pub fn with_converter(
        config: ServerConfig,
        log: LogBroadcaster,
        converter: Arc<dyn ConverterRuntime>,
    ) -> Self {
        let initial = RuntimeSettings::load_or_default(&config.settings_path).retention_policy();
        let (retention, _) = watch::channel(initial);
        let orchestrator = Orchestrator::new(converter, config.temp_root(), log.clone());
        Self {
            config,
            log,
            orchestrator,
            locks: LibraryLocks::new(),
            retention,
        }
    }

    /// A receiver for the sweeper; it sees every policy change made by
    /// [`AppState::reload_settings`].
    pub fn retention_policy(&self) -> watch::Receiver<RetentionPolicy> {
        self.retention.subscribe()
    }

    /// Re-read the settings file and push a changed retention policy to the
    /// sweeper.
    pub fn reload_settings(&self) -> RuntimeSettings {
        let settings = RuntimeSettings::load_or_default(&self.config.settings_path);
        let policy = settings.retention_policy();
        let changed = self.retention.send_if_modified(|current| {
            if *current == policy {
                return false;
            }
            *current = policy;
            true
        });
        if changed {
            tracing::info!(
                "Automatic cleanup is {} based on config.",
                if policy.enabled { "enabled" } else { "disabled" }
            );
        }
        settings
    }

    /// The instance new parts go into, created on demand.
    pub fn active_library(&self) -> Result<LibraryInstance, SelectorError> {
        resolve_active(
            &self.config.library_root(),
            &self.config.lib_prefix,
            &self.config.default_library_name(),
        )
    }
}
