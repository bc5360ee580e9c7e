use std::time::Duration;

use dl_01_wire_codec::MessageBody;
use serde::{Deserialize, Serialize};
use shared_types::{Provider, ProviderId};
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};

use crate::domain::DiscoveryError;
use crate::ports::SendTarget;
use crate::service::DiscoveryService;

/// Providers known when `discover` returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub providers: Vec<Provider>,
    /// Cancelled before the timeout elapsed.
    pub incomplete: bool,
    pub elapsed_ms: u64,
}

/// Resolves once `cancel` reads `true`; never if its sender is gone.
pub async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

impl DiscoveryService {
    /// Ask `provider` (or everyone) to re-announce.
    pub async fn request_channel_info(&self, provider: Option<ProviderId>) -> Result<(), DiscoveryError> {
        let (destination, target) = match provider {
            Some(id) => {
                let target = self
                    .registry
                    .get(id)
                    .map(|p| SendTarget::Unicast(p.address))
                    .unwrap_or(SendTarget::Group);
                (id, target)
            }
            None => (ProviderId::BROADCAST, SendTarget::Group),
        };
        self.send(&MessageBody::RequestChannelInfo, destination, target)
            .await
    }

    /// Collect announcements for `timeout` and return the provider set.
    ///
    /// Announcements are applied by the receive workers while this waits.
    /// Cancellation returns the partial set flagged incomplete.
    pub async fn discover(
        &self,
        timeout: Duration,
        mut cancel: watch::Receiver<bool>,
    ) -> DiscoveryResult {
        let started = Instant::now();

        if self.config.request_on_discover {
            if let Err(err) = self.request_channel_info(None).await {
                warn!(error = %err, "Channel info request failed, listening passively");
            }
        }

        let incomplete = tokio::select! {
            _ = sleep_until(started + timeout) => false,
            _ = cancelled(&mut cancel) => true,
        };

        let providers = self.registry.snapshot();
        info!(
            providers = providers.len(),
            incomplete,
            "Discovery finished"
        );
        DiscoveryResult {
            providers,
            incomplete,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Request a fresh announcement from `provider` and wait for it.
    ///
    /// # Errors
    ///
    /// - `CircuitOpen` / `Transport` if the request could not be sent
    /// - `NotFound` if the provider was unknown and stayed silent
    /// - `Timeout` if a known provider did not re-announce in time
    pub async fn connect(&self, provider: ProviderId) -> Result<Provider, DiscoveryError> {
        let baseline = self.registry.get(provider).map(|p| p.announcements);
        let timeout = self.config.discovery_timeout;
        let deadline = Instant::now() + timeout;

        self.request_channel_info(Some(provider)).await?;

        loop {
            let notified = self.announcements.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(current) = self.registry.get(provider) {
                if baseline.map_or(true, |seen| current.announcements > seen) {
                    info!(provider_id = %provider, name = %current.name, "Provider connected");
                    return Ok(current);
                }
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = sleep_until(deadline) => {
                    return Err(match baseline {
                        Some(_) => DiscoveryError::Timeout {
                            provider,
                            waited_ms: timeout.as_millis() as u64,
                        },
                        None => DiscoveryError::NotFound(provider),
                    });
                }
            }
        }
    }
}
