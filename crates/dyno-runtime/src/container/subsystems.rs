//! # Subsystem Container
//!
//! Holds every subsystem instance and the shared infrastructure they use.
//!
//! ## Initialization Order
//!
//! ```text
//! Level 0: event bus, time source
//! Level 1: reliability agent, ingestion queue
//! Level 2: registry, discovery service, clock reconciler, pin filter
//! Level 3: channel validator
//! Level 4: preflight engine (reads registry and validator)
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use dl_02_clock_sync::{ClockReconciler, SyncTable};
use dl_03_provider_discovery::{DiscoveryError, DiscoveryService, MessageSink, ProviderRegistry};
use dl_04_session_pinning::PinFilter;
use dl_05_channel_validator::{ChannelValidator, UnitRanges};
use dl_06_preflight::PreflightEngine;
use dl_07_reliability::{IngestionQueue, ReliabilityAgent, SAMPLE_FORWARDER_BREAKER};
use shared_bus::{EventPublisher, InMemoryEventBus};
use shared_types::{TimeSource, Timestamp};
use tracing::info;

use crate::adapters::{PipelineSources, SampleForwarder};
use crate::container::config::RuntimeConfig;

/// A datagram as it waits in the ingestion queue.
#[derive(Debug, Clone)]
pub struct InboundDatagram {
    pub bytes: Vec<u8>,
    pub source: SocketAddr,
    /// Local time at which the socket read returned.
    pub received_at: Timestamp,
}

/// Central container holding all subsystem instances.
pub struct SubsystemContainer {
    // =========================================================================
    // SHARED INFRASTRUCTURE
    // =========================================================================
    pub config: RuntimeConfig,
    pub time_source: Arc<dyn TimeSource>,
    pub event_bus: Arc<InMemoryEventBus>,

    // =========================================================================
    // LEVEL 1
    // =========================================================================
    pub reliability: Arc<ReliabilityAgent>,
    pub queue: Arc<IngestionQueue<InboundDatagram>>,

    // =========================================================================
    // LEVEL 2
    // =========================================================================
    pub registry: Arc<ProviderRegistry>,
    pub discovery: Arc<DiscoveryService>,
    /// Written by whatever performs the time-sync exchange.
    pub sync_table: Arc<SyncTable>,
    pub reconciler: Arc<ClockReconciler>,
    pub pin_filter: Arc<PinFilter>,

    // =========================================================================
    // LEVEL 3-4
    // =========================================================================
    pub validator: Arc<ChannelValidator>,
    pub preflight: Arc<PreflightEngine>,

    /// Optional collaborator receiving validated samples.
    pub forwarder: Option<Arc<dyn SampleForwarder>>,
}

impl SubsystemContainer {
    /// Build every subsystem in dependency order.
    ///
    /// # Errors
    ///
    /// `InvalidNodeId` if the configured node id is the broadcast id.
    pub fn new(
        config: RuntimeConfig,
        sink: Arc<dyn MessageSink>,
        time_source: Arc<dyn TimeSource>,
        forwarder: Option<Arc<dyn SampleForwarder>>,
    ) -> Result<Self, DiscoveryError> {
        info!("Initializing subsystems");

        // Level 0
        let event_bus = Arc::new(InMemoryEventBus::with_capacity(
            config.runtime.event_bus_capacity,
        ));
        let publisher: Arc<dyn EventPublisher> = event_bus.clone();

        // Level 1
        let reliability_config = config.reliability_config();
        let queue_config = reliability_config.queue.clone();
        let reliability = Arc::new(ReliabilityAgent::new(
            reliability_config,
            Arc::clone(&time_source),
            Some(Arc::clone(&publisher)),
        ));
        let queue = Arc::new(IngestionQueue::new(queue_config, Some(reliability.alerts())));
        reliability.attach_queue(queue.clone());
        if forwarder.is_some() {
            reliability.register_dependency(SAMPLE_FORWARDER_BREAKER);
        }

        // Level 2
        let registry = Arc::new(match config.node_id() {
            Some(node_id) => ProviderRegistry::with_node_id(node_id)?,
            None => ProviderRegistry::new(),
        });
        let discovery = Arc::new(DiscoveryService::new(
            Arc::clone(&registry),
            sink,
            Arc::clone(&reliability),
            Arc::clone(&publisher),
            Arc::clone(&time_source),
            config.discovery_config(),
        ));
        let sync_table = Arc::new(SyncTable::new());
        let reconciler = Arc::new(ClockReconciler::new(sync_table.clone()));
        let pin_filter = Arc::new(PinFilter::new());

        // Level 3
        let validator = Arc::new(ChannelValidator::new(
            config.validator_config(),
            UnitRanges::default(),
            Arc::clone(&time_source),
        ));

        // Level 4
        let sources = Arc::new(PipelineSources::new(
            Arc::clone(&registry),
            Arc::clone(&validator),
            Arc::clone(&time_source),
        ));
        let preflight = Arc::new(PreflightEngine::new(
            config.preflight_config(),
            sources,
            Arc::clone(&event_bus),
        ));

        info!(
            node_id = ?registry.node_id(),
            queue_capacity = queue.stats().capacity,
            workers = config.runtime.workers,
            "Subsystems initialized"
        );

        Ok(Self {
            config,
            time_source,
            event_bus,
            reliability,
            queue,
            registry,
            discovery,
            sync_table,
            reconciler,
            pin_filter,
            validator,
            preflight,
            forwarder,
        })
    }
}
