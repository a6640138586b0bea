//! Core collaborators of the multi-cluster observation gateway: the
//! config/client/discovery layer, the informer pool, the event coalescer,
//! the SSE broker, and the action executor. No HTTP framework dependency —
//! the `gateway` binary crate wires these into actix-web handlers.

pub mod action;
pub mod broker;
pub mod client_factory;
pub mod coalescer;
pub mod config_registry;
pub mod discovery;
pub mod error;
pub mod informer_pool;
pub mod kinds;
pub mod metrics;
pub mod settings;
pub mod stream_id;
pub mod telemetry;
pub mod transform;

pub use action::ActionExecutor;
pub use broker::SseBroker;
pub use client_factory::ClientFactory;
pub use coalescer::EventCoalescer;
pub use config_registry::ConfigRegistry;
pub use discovery::DiscoveryCache;
pub use error::{CoreError, Result};
pub use informer_pool::InformerPool;
pub use metrics::Metrics;
pub use settings::GatewaySettings;
pub use stream_id::StreamId;

/// The process-wide collaborators, constructed once at startup and handed
/// to every handler (§9 design note: "model them as explicit collaborators
/// passed to handlers via a dependency container").
#[derive(Clone)]
pub struct Gateway {
    pub config_registry: ConfigRegistry,
    pub client_factory: ClientFactory,
    pub discovery: DiscoveryCache,
    pub coalescer: EventCoalescer,
    pub broker: SseBroker,
    pub informers: InformerPool,
    pub actions: ActionExecutor,
    pub settings: GatewaySettings,
    pub metrics: Metrics,
}

impl Gateway {
    pub fn new(config_registry: ConfigRegistry, settings: GatewaySettings, metrics: Metrics) -> Self {
        let client_factory = ClientFactory::new(config_registry.clone());
        let discovery = DiscoveryCache::new(client_factory.clone());
        let coalescer = EventCoalescer::new();
        let broker = SseBroker::new(metrics.clone());
        let informers = InformerPool::new(
            client_factory.clone(),
            discovery.clone(),
            coalescer.clone(),
            broker.clone(),
            metrics.clone(),
        );
        let actions = ActionExecutor::new(client_factory.clone(), discovery.clone());

        Self {
            config_registry,
            client_factory,
            discovery,
            coalescer,
            broker,
            informers,
            actions,
            settings,
            metrics,
        }
    }

    /// Reloads the config registry and invalidates any client whose
    /// connection material changed (§4.1, C1/C2 reload handshake).
    pub fn reload_config(&self) -> Result<()> {
        self.config_registry.reload()?;
        self.client_factory.invalidate_stale();
        Ok(())
    }
}
