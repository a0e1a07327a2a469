//! Domain event publishing over NATS.

use crate::domain::events::DomainEvent;

/// Publishes events when a NATS connection is configured; otherwise a no-op.
#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn disabled() -> Self { Self { nats: None } }

    /// Connects to `url`. An unreachable server leaves publishing disabled.
    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else { return Self::disabled() };
        match async_nats::connect(url).await {
            Ok(client) => {
                tracing::info!(%url, "connected to NATS");
                Self { nats: Some(client) }
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "NATS unavailable, events will not be published");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool { self.nats.is_some() }

    /// Fire and forget. Failures are logged and never fail the caller.
    pub async fn publish(&self, event: &DomainEvent) {
        let Some(client) = &self.nats else { return };
        let payload = match serde_json::to_vec(event) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "event serialization failed");
                return;
            }
        };
        if let Err(e) = client.publish(event.subject().to_string(), payload.into()).await {
            tracing::warn!(subject = event.subject(), error = %e, "event publish failed");
        }
    }
}
