//! The engine: mode switch, protocol registry, recorder, replayer and cache
//! wired together.

use std::sync::{Arc, LazyLock};

use tracing::info;
use tr_common::Mode;
use tr_config::Settings;

use crate::cache::{ApcuProtocol, LocalCache};
use crate::mode::ModeSwitch;
use crate::protocol::{Protocol, ProtocolRegistry, APCU};
use crate::recorder::Recorder;
use crate::replayer::Replayer;

static GLOBAL: LazyLock<Engine> = LazyLock::new(Engine::new);

struct Inner {
    mode: Arc<ModeSwitch>,
    registry: Arc<ProtocolRegistry>,
    recorder: Arc<Recorder>,
    replayer: Replayer,
    cache: LocalCache,
}

/// Shared handle; clones refer to the same engine.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    /// Engine with default settings, mode off.
    pub fn new() -> Self {
        Self::from_settings(&Settings::default())
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let mode = Arc::new(ModeSwitch::new(settings.mode));
        let registry = Arc::new(ProtocolRegistry::new());
        registry.register(APCU, Arc::new(ApcuProtocol));

        let recorder = Arc::new(Recorder::new(
            Arc::clone(&mode),
            Arc::clone(&registry),
            settings.recorder.clone(),
        ));
        let replayer = Replayer::new(
            Arc::clone(&mode),
            Arc::clone(&registry),
            settings.replay.clone(),
        );
        let cache = LocalCache::new(Arc::clone(&mode), Arc::clone(&recorder), &settings.cache);

        info!(mode = %settings.mode, "traffic engine initialized");
        Self {
            inner: Arc::new(Inner {
                mode,
                registry,
                recorder,
                replayer,
                cache,
            }),
        }
    }

    /// Process-wide engine, created with defaults on first use.
    pub fn global() -> &'static Engine {
        &GLOBAL
    }

    pub fn mode(&self) -> Mode {
        self.inner.mode.get()
    }

    /// Switch modes, returning the previous one. Do this between traffic,
    /// not during it.
    pub fn set_mode(&self, mode: Mode) -> Mode {
        self.inner.mode.set(mode)
    }

    pub fn register(&self, name: impl Into<String>, plugin: Arc<dyn Protocol>) {
        self.inner.registry.register(name, plugin);
    }

    pub fn registry(&self) -> &ProtocolRegistry {
        &self.inner.registry
    }

    pub fn recorder(&self) -> &Recorder {
        &self.inner.recorder
    }

    pub fn replayer(&self) -> &Replayer {
        &self.inner.replayer
    }

    pub fn cache(&self) -> &LocalCache {
        &self.inner.cache
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("mode", &self.mode())
            .field("registry", &self.inner.registry)
            .field("recorder", &self.inner.recorder)
            .field("replayer", &self.inner.replayer)
            .finish()
    }
}
