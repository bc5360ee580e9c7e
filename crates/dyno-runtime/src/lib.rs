//! # DynoLink Runtime
//!
//! Wires the subsystems into one ingestion pipeline and exposes the
//! operations the application drives it with.
//!
//! ## Modular Structure
//!
//! - `container/` - configuration and dependency-ordered construction
//! - `adapters/` - port implementations (preflight sources, sample forwarder)
//! - `wiring/` - receive loop, decode workers, maintenance
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file, then environment)
//! 2. Bind the transport (fatal on failure)
//! 3. Initialize subsystems in dependency order
//! 4. Spawn the receive loop, the decode workers and maintenance
//! 5. Discover providers; assign a node id if none was configured
//! 6. Preflight, then pin a provider and capture
//!
//! ## Example
//!
//! ```rust,ignore
//! let runtime = DynoRuntime::bind_udp(RuntimeConfig::load(None)?).await?;
//! runtime.start()?;
//! let found = runtime.discover(cancel.clone()).await;
//! let preflight = runtime.run_preflight(None, PreflightMode::Blocking, None, cancel).await;
//! if preflight.permits_capture() {
//!     runtime.start_session(preflight.provider_id.unwrap(), Some(&preflight))?;
//! }
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod container;
pub mod errors;
pub mod wiring;

pub use adapters::{ChannelForwarder, ForwardError, SampleForwarder};
pub use container::{ConfigError, RuntimeConfig, SubsystemContainer};
pub use errors::RuntimeError;

use std::sync::Arc;
use std::time::Duration;

use dl_03_provider_discovery::{
    DiscoveryResult, MessageSink, MessageSource, UdpMulticastTransport,
};
use dl_04_session_pinning::SessionPin;
use dl_05_channel_validator::{CaptureSummary, PipelineHealth};
use dl_06_preflight::{PreflightMode, PreflightRequest, PreflightResult};
use dl_07_reliability::ReliabilityHealth;
use dyno_telemetry::{log_provider_event, subsystem_span};
use parking_lot::Mutex;
use shared_bus::{EventFilter, EventPublisher, Subscription, TelemetryEvent};
use shared_types::{Provider, ProviderId, SystemTimeSource, TimeSource};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use crate::wiring::{
    run_dispatcher, run_lane_worker, run_maintenance, run_receive_loop, run_worker, FramePipeline,
    LANE_CAPACITY,
};

/// The running telemetry pipeline.
pub struct DynoRuntime {
    container: Arc<SubsystemContainer>,
    pipeline: Arc<FramePipeline>,
    source: Arc<dyn MessageSource>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DynoRuntime {
    /// Build the runtime over an existing transport.
    pub fn new(
        config: RuntimeConfig,
        source: Arc<dyn MessageSource>,
        sink: Arc<dyn MessageSink>,
        time_source: Arc<dyn TimeSource>,
        forwarder: Option<Arc<dyn SampleForwarder>>,
    ) -> Result<Self, RuntimeError> {
        let container = Arc::new(SubsystemContainer::new(config, sink, time_source, forwarder)?);
        let pipeline = Arc::new(FramePipeline::new(Arc::clone(&container)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            container,
            pipeline,
            source,
            shutdown_tx,
            shutdown_rx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Bind the configured multicast group and build the runtime on it.
    ///
    /// # Errors
    ///
    /// `Transport` if the socket cannot be bound or the group joined.
    pub async fn bind_udp(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let transport = Arc::new(UdpMulticastTransport::bind(&config.multicast()).await?);
        Self::new(
            config,
            transport.clone(),
            transport,
            Arc::new(SystemTimeSource),
            None,
        )
    }

    /// Spawn the receive loop, the decode workers and maintenance.
    pub fn start(&self) -> Result<(), RuntimeError> {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return Err(RuntimeError::AlreadyStarted);
        }

        tasks.push(tokio::spawn(
            run_receive_loop(
                Arc::clone(&self.source),
                Arc::clone(&self.container),
                self.shutdown_rx.clone(),
            )
            .instrument(subsystem_span!("receive", subsystem = "transport")),
        ));
        let workers = self.container.config.runtime.workers;
        if workers == 1 {
            tasks.push(tokio::spawn(
                run_worker(0, Arc::clone(&self.pipeline), self.shutdown_rx.clone())
                    .instrument(subsystem_span!("decode", subsystem = "pipeline", worker = 0)),
            ));
        } else {
            let mut lanes = Vec::with_capacity(workers);
            for worker in 0..workers {
                let (lane_tx, lane_rx) = mpsc::channel(LANE_CAPACITY);
                lanes.push(lane_tx);
                tasks.push(tokio::spawn(
                    run_lane_worker(
                        worker,
                        Arc::clone(&self.pipeline),
                        lane_rx,
                        self.shutdown_rx.clone(),
                    )
                    .instrument(subsystem_span!("decode", subsystem = "pipeline", worker)),
                ));
            }
            tasks.push(tokio::spawn(
                run_dispatcher(Arc::clone(&self.pipeline), lanes, self.shutdown_rx.clone())
                    .instrument(subsystem_span!("dispatch", subsystem = "pipeline")),
            ));
        }
        tasks.push(tokio::spawn(
            run_maintenance(Arc::clone(&self.pipeline), self.shutdown_rx.clone())
                .instrument(subsystem_span!("maintenance", subsystem = "discovery")),
        ));

        info!(
            node_id = ?self.node_id(),
            workers = self.container.config.runtime.workers,
            "Pipeline started"
        );
        Ok(())
    }

    pub fn container(&self) -> &Arc<SubsystemContainer> {
        &self.container
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.container.config
    }

    pub fn node_id(&self) -> Option<ProviderId> {
        self.container.registry.node_id()
    }

    pub fn providers(&self) -> Vec<Provider> {
        self.container.registry.snapshot()
    }

    // =========================================================================
    // DISCOVERY
    // =========================================================================

    /// Listen for announcements for the discovery timeout.
    ///
    /// Without a configured node id, a random one avoiding every sender seen
    /// so far is assigned afterwards.
    pub async fn discover(&self, cancel: watch::Receiver<bool>) -> DiscoveryResult {
        let discovery = &self.container.discovery;
        let result = discovery
            .discover(discovery.config().discovery_timeout, cancel)
            .await;

        if self.container.registry.node_id().is_none() {
            let assigned = self
                .container
                .registry
                .assign_random_node_id(&mut rand::thread_rng());
            match assigned {
                Ok(node_id) => info!(node_id = %node_id, "Random node id assigned"),
                Err(err) => warn!(error = %err, "No node id assigned, self-filtering disabled"),
            }
        }
        result
    }

    /// Request a fresh announcement from `provider` and wait for it.
    pub async fn connect(&self, provider: ProviderId) -> Result<Provider, RuntimeError> {
        Ok(self.container.discovery.connect(provider).await?)
    }

    // =========================================================================
    // PREFLIGHT & SESSIONS
    // =========================================================================

    /// Run the preflight gate. `provider` of `None` auto-selects.
    pub async fn run_preflight(
        &self,
        provider: Option<ProviderId>,
        mode: PreflightMode,
        sample_window: Option<Duration>,
        cancel: watch::Receiver<bool>,
    ) -> PreflightResult {
        let request = PreflightRequest {
            provider,
            mode,
            sample_window,
        };
        self.container.preflight.run(request, cancel).await
    }

    /// Pin `provider` and start capturing its channels.
    ///
    /// `gate` must be a preflight result for the same provider that passed
    /// or carries an explicit override. With `runtime.require_preflight`
    /// disabled the gate may be omitted.
    pub fn start_session(
        &self,
        provider: ProviderId,
        gate: Option<&PreflightResult>,
    ) -> Result<SessionPin, RuntimeError> {
        self.check_gate(provider, gate)?;

        let c = &self.container;
        let declared = c
            .registry
            .get(provider)
            .ok_or(RuntimeError::UnknownProvider(provider))?;
        let pin = c.pin_filter.pin(provider, c.time_source.now())?;
        c.validator.begin_session(pin.session_id, &declared);

        c.event_bus.publish(TelemetryEvent::SessionStarted {
            session_id: pin.session_id,
            provider_id: provider,
        });
        log_provider_event!(
            info,
            "session",
            "Session started",
            provider,
            session_id = %pin.session_id,
            name = %declared.name
        );
        Ok(pin)
    }

    fn check_gate(
        &self,
        provider: ProviderId,
        gate: Option<&PreflightResult>,
    ) -> Result<(), RuntimeError> {
        let Some(result) = gate else {
            if self.container.config.runtime.require_preflight {
                return Err(RuntimeError::PreflightRequired);
            }
            warn!(provider_id = %provider, "Starting session without preflight");
            return Ok(());
        };

        if result.provider_id != Some(provider) {
            return Err(RuntimeError::PreflightMismatch {
                requested: provider,
                checked: result.provider_id,
            });
        }
        if !result.permits_capture() {
            let failed: Vec<&str> = result.failed_checks().map(|c| c.name.as_str()).collect();
            return Err(RuntimeError::PreflightFailed {
                failed: failed.join(", "),
            });
        }
        if let Some(record) = &result.override_record {
            warn!(
                provider_id = %provider,
                operator = %record.operator,
                reason = %record.reason,
                "Starting session on overridden preflight"
            );
        }
        Ok(())
    }

    /// Stop the active session and return its final metrics.
    pub fn stop_session(&self) -> Result<CaptureSummary, RuntimeError> {
        let c = &self.container;
        let pin = c.pin_filter.unpin()?;
        let stats = c.pin_filter.stats();
        let summary = c.validator.end_session().unwrap_or_else(|| CaptureSummary {
            session_id: pin.session_id,
            provider: pin.provider,
            started_at: pin.started_at,
            stopped_at: c.time_source.now(),
            channels: Vec::new(),
        });

        c.event_bus.publish(TelemetryEvent::SessionStopped {
            session_id: pin.session_id,
            provider_id: pin.provider,
        });
        log_provider_event!(
            info,
            "session",
            "Session stopped",
            pin.provider,
            session_id = %pin.session_id,
            admitted = stats.admitted,
            non_provider = stats.non_provider
        );
        Ok(summary)
    }

    pub fn active_session(&self) -> Option<SessionPin> {
        self.container.pin_filter.current()
    }

    // =========================================================================
    // HEALTH
    // =========================================================================

    pub fn channel_health(&self) -> PipelineHealth {
        self.container.validator.pipeline_health()
    }

    pub fn reliability_health(&self) -> ReliabilityHealth {
        self.container.reliability.health()
    }

    pub fn reset_circuit_breaker(&self, name: &str) -> bool {
        self.container.reliability.reset_circuit_breaker(name)
    }

    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.container.event_bus.subscribe(filter)
    }

    // =========================================================================
    // SHUTDOWN
    // =========================================================================

    /// Receiver that reads `true` once shutdown began.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Signal every task to stop and wait for them.
    pub async fn shutdown(&self) {
        info!("Shutting down pipeline");
        // send only fails without receivers, and we hold one
        let _ = self.shutdown_tx.send(true);
        self.container.queue.close();

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "Pipeline task ended abnormally");
            }
        }
        debug!("Pipeline stopped");
    }
}
