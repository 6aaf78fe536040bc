use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use beacon_config::{load_config, BeaconConfig};
use beacon_core::SessionStatusStore;
use beacon_events::{ActiveSession, BackendBus, EventBridge};
use beacon_gateway::{
    CancelConfirmer, CancelError, CancelOutcome, CancellationGateway, CancellationRpc,
};
use beacon_view::SessionStatusView;
use tokio::task::JoinHandle;

/// Store, backend channel, bridge and gateway wired from one configuration.
///
/// The bridge task starts with the runtime and is aborted when it is dropped.
pub struct StatusRuntime {
    config: BeaconConfig,
    store: SessionStatusStore,
    bus: BackendBus,
    active: ActiveSession,
    gateway: CancellationGateway,
    bridge: Option<JoinHandle<()>>,
}

impl StatusRuntime {
    /// Must be called from within a Tokio runtime.
    pub fn new(config: BeaconConfig, rpc: Arc<dyn CancellationRpc>) -> Result<Self> {
        tokio::runtime::Handle::try_current()
            .context("StatusRuntime must be created inside a Tokio runtime")?;

        let store = SessionStatusStore::new();
        let bus = BackendBus::with_capacity(config.bridge.channel_capacity);
        let active = ActiveSession::new();

        let bridge = EventBridge::new(store.clone(), active.clone())
            .with_legacy_policy(config.bridge.legacy_policy)
            .start(bus.subscribe());

        let gateway = CancellationGateway::new(store.clone(), rpc).with_settings(&config.cancel);

        tracing::info!(
            legacy_policy = ?config.bridge.legacy_policy,
            channel_capacity = config.bridge.channel_capacity,
            "Status runtime started"
        );

        Ok(Self {
            config,
            store,
            bus,
            active,
            gateway,
            bridge: Some(bridge),
        })
    }

    /// Load configuration (see [`load_config`]) and start a runtime from it.
    pub fn from_config_file(
        config_path: Option<&Path>,
        rpc: Arc<dyn CancellationRpc>,
    ) -> Result<Self> {
        let config = load_config(config_path).context("Failed to load Beacon configuration")?;
        Self::new(config, rpc)
    }

    pub fn with_confirmer(mut self, confirmer: Arc<dyn CancelConfirmer>) -> Self {
        self.gateway.set_confirmer(confirmer);
        self
    }

    pub fn config(&self) -> &BeaconConfig {
        &self.config
    }

    pub fn store(&self) -> &SessionStatusStore {
        &self.store
    }

    /// Channel the backend publishes its events on.
    pub fn bus(&self) -> &BackendBus {
        &self.bus
    }

    pub fn active_session(&self) -> &ActiveSession {
        &self.active
    }

    pub fn focus(&self, session_id: &str) {
        self.active.focus(session_id);
    }

    pub fn blur(&self) {
        self.active.blur();
    }

    pub fn view(&self, session_id: &str) -> SessionStatusView {
        SessionStatusView::acquire(&self.store, session_id, &self.config.view)
    }

    pub fn can_cancel(&self, session_id: &str) -> bool {
        self.gateway.can_cancel(session_id)
    }

    pub async fn cancel(&self, session_id: &str) -> Result<CancelOutcome, CancelError> {
        self.gateway.cancel(session_id).await
    }

    /// Stop routing backend events. The store stays readable.
    pub fn shutdown(&mut self) {
        if let Some(bridge) = self.bridge.take() {
            bridge.abort();
            tracing::info!("Status runtime stopped");
        }
    }
}

impl Drop for StatusRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}
