//! Shared harness for the end-to-end scenarios.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dl_03_provider_discovery::testing::SimulatedProvider;
use dl_03_provider_discovery::{InMemoryEndpoint, InMemoryNetwork};
use dyno_runtime::{DynoRuntime, RuntimeConfig, SampleForwarder};
use shared_types::{SystemTimeSource, TimeSource, Unit};
use tokio::sync::watch;

/// Address of the runtime's own endpoint.
pub const RUNTIME_HOST: u8 = 1;

pub fn addr(last: u8) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, last], 22344))
}

pub struct Bench {
    pub runtime: DynoRuntime,
    pub network: Arc<InMemoryNetwork>,
    /// The runtime's own endpoint, for driving pipeline tasks by hand.
    pub endpoint: Arc<InMemoryEndpoint>,
}

pub struct BenchBuilder {
    config: RuntimeConfig,
    time_source: Arc<dyn TimeSource>,
    forwarder: Option<Arc<dyn SampleForwarder>>,
    start: bool,
}

impl BenchBuilder {
    pub fn new() -> Self {
        Self {
            config: RuntimeConfig::for_testing(),
            time_source: Arc::new(SystemTimeSource),
            forwarder: None,
            start: true,
        }
    }

    pub fn config(mut self, edit: impl FnOnce(&mut RuntimeConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    pub fn time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    pub fn forwarder(mut self, forwarder: Arc<dyn SampleForwarder>) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    /// Build without spawning the pipeline tasks.
    pub fn stopped(mut self) -> Self {
        self.start = false;
        self
    }

    pub fn build(self) -> Bench {
        let network = InMemoryNetwork::new();
        let endpoint = Arc::new(network.endpoint(addr(RUNTIME_HOST)));
        let runtime = DynoRuntime::new(
            self.config,
            endpoint.clone(),
            endpoint.clone(),
            self.time_source,
            self.forwarder,
        )
        .unwrap();
        if self.start {
            runtime.start().unwrap();
        }
        Bench {
            runtime,
            network,
            endpoint,
        }
    }
}

impl Bench {
    pub fn dyno(&self, last: u8, id: u16, name: &str) -> Arc<SimulatedProvider> {
        self.provider(last, id, name, &[(1, "RPM", Unit::EngineSpeed), (2, "AFR", Unit::Afr)])
    }

    pub fn provider(
        &self,
        last: u8,
        id: u16,
        name: &str,
        channels: &[(u16, &str, Unit)],
    ) -> Arc<SimulatedProvider> {
        Arc::new(SimulatedProvider::new(&self.network, addr(last), id, name, channels))
    }

    /// Announce `provider` and wait until the registry holds it.
    pub async fn register(&self, provider: &SimulatedProvider) {
        provider.announce().await.unwrap();
        let id = provider.id;
        wait_until("provider registered", || {
            self.runtime.providers().iter().any(|p| p.id == id)
        })
        .await;
    }
}

pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Stream `frames` values frames at 50 Hz; `values(i)` gives the RPM and
/// AFR of frame `i`.
pub fn stream(
    provider: Arc<SimulatedProvider>,
    frames: u32,
    values: impl Fn(u32) -> (f32, f32) + Send + 'static,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        for i in 0..frames {
            let (rpm, afr) = values(i);
            provider
                .send_values(&[(1, i * 20, rpm), (2, i * 20, afr)])
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
}

/// A sweeping pull: RPM climbs, AFR wanders inside its plausible range.
pub fn sweep(i: u32) -> (f32, f32) {
    (3_000.0 + (i % 50) as f32 * 40.0, 13.0 + (i % 10) as f32 * 0.1)
}

pub fn never_cancelled() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    std::mem::forget(tx);
    rx
}
