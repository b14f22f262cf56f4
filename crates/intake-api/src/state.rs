//! # Application State
//!
//! Shared state for all handlers. Cheap to clone: every field is an `Arc`
//! or a handle around one.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::MissedTickBehavior;

use intake_client::{AddressLookup, DebouncedLookup, Debouncer};
use intake_compliance::{PageFetcher, WebsiteCheckService};
use intake_core::SessionId;
use intake_state::StepRegistry;

use crate::config::AppConfig;
use crate::db::memory::MemoryRepository;
use crate::db::{IntakeRepository, RepositoryChecks};
use crate::dispatcher::{Dispatcher, EffectContext};
use crate::middleware::metrics::ApiMetrics;
use crate::session::{SessionRegistry, SnapshotBackend};
use crate::uploads::{FileStorage, LocalFileStorage};

type SessionLookups = DashMap<SessionId, DebouncedLookup<dyn AddressLookup>>;

/// External collaborators the state is built from.
pub struct Backends {
    pub repository: Arc<dyn IntakeRepository>,
    pub storage: Arc<dyn FileStorage>,
    pub fetcher: Arc<dyn PageFetcher>,
    /// `None` disables address suggestions.
    pub address_lookup: Option<Arc<dyn AddressLookup>>,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<StepRegistry>,
    pub repository: Arc<dyn IntakeRepository>,
    pub sessions: SessionRegistry,
    pub dispatcher: Dispatcher,
    pub storage: Arc<dyn FileStorage>,
    pub website_checks: WebsiteCheckService,
    address_lookup: Option<Arc<dyn AddressLookup>>,
    /// One debouncer per session, so bursts from one applicant collapse
    /// without cancelling another applicant's lookup.
    lookups: Arc<SessionLookups>,
    pub metrics: ApiMetrics,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("steps", &self.registry.len())
            .field("sessions", &self.sessions.len())
            .field("address_lookup", &self.address_lookup.is_some())
            .finish()
    }
}

impl AppState {
    /// Build the state and spawn the side-effect worker and the idle
    /// session sweep. Must be called inside a Tokio runtime.
    pub fn new(config: AppConfig, registry: Arc<StepRegistry>, backends: Backends) -> Self {
        let metrics = ApiMetrics::new();
        let backend = match &config.snapshot_dir {
            Some(dir) => SnapshotBackend::Directory(dir.clone()),
            None => SnapshotBackend::memory(),
        };
        let sessions = SessionRegistry::new(Arc::clone(&registry), backend);
        let website_checks = WebsiteCheckService::new(
            backends.fetcher,
            Arc::new(RepositoryChecks(Arc::clone(&backends.repository))),
        );
        let dispatcher = Dispatcher::spawn(EffectContext {
            repository: Arc::clone(&backends.repository),
            website_checks: website_checks.clone(),
            sessions: sessions.clone(),
            metrics: metrics.clone(),
        });

        let lookups = Arc::new(DashMap::new());
        spawn_idle_sweep(
            sessions.clone(),
            Arc::clone(&lookups),
            config.session_idle_timeout,
        );

        Self {
            config: Arc::new(config),
            registry,
            repository: backends.repository,
            sessions,
            dispatcher,
            storage: backends.storage,
            website_checks,
            address_lookup: backends.address_lookup,
            lookups,
            metrics,
        }
    }

    /// In-memory repository and snapshots, local file storage, the given
    /// fetcher, no address lookup. For development and tests.
    pub fn in_memory(config: AppConfig, fetcher: Arc<dyn PageFetcher>) -> Self {
        let storage = LocalFileStorage::new(&config.upload_dir, &config.public_base_url);
        Self::new(
            config,
            Arc::new(StepRegistry::loan_application()),
            Backends {
                repository: Arc::new(MemoryRepository::new()),
                storage: Arc::new(storage),
                fetcher,
                address_lookup: None,
            },
        )
    }

    /// The session's debounced address lookup, `None` when lookups are
    /// disabled.
    pub fn address_lookup_for(&self, session: SessionId) -> Option<DebouncedLookup<dyn AddressLookup>> {
        let inner = self.address_lookup.as_ref()?;
        Some(
            self.lookups
                .entry(session)
                .or_insert_with(|| {
                    DebouncedLookup::new(
                        Arc::clone(inner),
                        Debouncer::new(self.config.debounce_window),
                    )
                })
                .value()
                .clone(),
        )
    }

    /// Drop a session together with its address debouncer.
    pub fn close_session(&self, id: SessionId) -> bool {
        self.lookups.remove(&id);
        self.sessions.remove(id)
    }

    /// Close every session idle for at least `max_idle`. Returns how many
    /// were closed.
    pub fn evict_idle_sessions(&self, max_idle: Duration) -> usize {
        evict_idle(&self.sessions, &self.lookups, max_idle)
    }
}

fn evict_idle(sessions: &SessionRegistry, lookups: &SessionLookups, max_idle: Duration) -> usize {
    let evicted = sessions.evict_idle(max_idle);
    for id in &evicted {
        lookups.remove(id);
    }
    evicted.len()
}

fn spawn_idle_sweep(sessions: SessionRegistry, lookups: Arc<SessionLookups>, max_idle: Duration) {
    let period = (max_idle / 4).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            evict_idle(&sessions, &lookups, max_idle);
        }
    });
}
