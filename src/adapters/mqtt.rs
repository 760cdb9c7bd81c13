//! MQTT-over-TLS transport adapter.
//!
//! Implements [`TransportPort`].
//!
//! - **`target_os = "espidf"`**: `EspMqttClient` (esp-mqtt) with the
//!   embedded trust anchor as server certificate.  esp-mqtt runs its own
//!   task, reconnects on its own after `reconnect_interval`, and queues
//!   outgoing messages in its outbox so `publish` never waits on the
//!   network.
//! - **`not(target_os = "espidf")`**: logs every publish; the session
//!   connects as soon as it is opened.

use log::info;

use crate::app::events::SessionEvent;
use crate::app::ports::{Endpoint, Qos, SessionHandler, TransportError, TransportPort};
use crate::telemetry::TrustAnchor;

// ───────────────────────────────────────────────────────────────
// ESP-IDF client
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod platform {
    use super::*;

    use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};
    use esp_idf_svc::sys::EspError;
    use esp_idf_svc::tls::X509;

    #[derive(Default)]
    pub struct MqttTransport {
        client: Option<EspMqttClient<'static>>,
    }

    impl MqttTransport {
        pub fn new() -> Self {
            Self::default()
        }
    }

    fn map_event(payload: EventPayload<'_, EspError>) -> Option<SessionEvent> {
        match payload {
            EventPayload::BeforeConnect => Some(SessionEvent::BeforeConnect),
            EventPayload::Connected(_) => Some(SessionEvent::Connected),
            EventPayload::Disconnected => Some(SessionEvent::Disconnected),
            EventPayload::Published(id) => Some(SessionEvent::Published(id)),
            EventPayload::Error(e) => Some(SessionEvent::Error(e.code())),
            _ => None,
        }
    }

    fn qos(q: Qos) -> QoS {
        match q {
            Qos::AtMostOnce => QoS::AtMostOnce,
            Qos::AtLeastOnce => QoS::AtLeastOnce,
            Qos::ExactlyOnce => QoS::ExactlyOnce,
        }
    }

    impl TransportPort for MqttTransport {
        fn open(
            &mut self,
            endpoint: &Endpoint<'_>,
            trust_anchor: TrustAnchor,
            mut handler: SessionHandler,
        ) -> Result<(), TransportError> {
            if self.client.is_some() {
                return Ok(());
            }

            let conf = MqttClientConfiguration {
                client_id: Some(endpoint.client_id),
                username: endpoint.username,
                password: endpoint.password,
                server_certificate: Some(X509::pem(trust_anchor.as_cstr())),
                reconnect_timeout: Some(endpoint.reconnect_interval),
                ..Default::default()
            };

            let client = EspMqttClient::new_cb(endpoint.url, &conf, move |event| {
                if let Some(ev) = map_event(event.payload()) {
                    handler(ev);
                }
            })
            .map_err(|e| TransportError::Open(e.code()))?;

            info!("MQTT: client created for {} as '{}'", endpoint.url, endpoint.client_id);
            self.client = Some(client);
            Ok(())
        }

        fn publish(&mut self, topic: &str, payload: &[u8], q: Qos, retain: bool) -> Result<u32, TransportError> {
            let client = self.client.as_mut().ok_or(TransportError::NotOpen)?;
            client
                .enqueue(topic, qos(q), retain, payload)
                .map_err(|e| TransportError::Rejected(e.code()))
        }
    }
}

#[cfg(target_os = "espidf")]
pub use platform::MqttTransport;

// ───────────────────────────────────────────────────────────────
// Simulated client
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod sim {
    use super::*;

    /// Logs messages instead of sending them.
    #[derive(Default)]
    pub struct MqttTransport {
        handler: Option<SessionHandler>,
        next_id: u32,
    }

    impl MqttTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Report a session event as if the broker connection changed.
        pub fn sim_event(&mut self, event: SessionEvent) {
            if let Some(handler) = self.handler.as_mut() {
                handler(event);
            }
        }
    }

    impl TransportPort for MqttTransport {
        fn open(
            &mut self,
            endpoint: &Endpoint<'_>,
            trust_anchor: TrustAnchor,
            mut handler: SessionHandler,
        ) -> Result<(), TransportError> {
            info!(
                "MQTT(sim): opening {} as '{}' ({:?})",
                endpoint.url, endpoint.client_id, trust_anchor
            );
            handler(SessionEvent::BeforeConnect);
            handler(SessionEvent::Connected);
            self.handler = Some(handler);
            Ok(())
        }

        fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos, retain: bool) -> Result<u32, TransportError> {
            let handler = self.handler.as_mut().ok_or(TransportError::NotOpen)?;
            self.next_id = self.next_id.wrapping_add(1);
            info!(
                "MQTT(sim): [{}] qos={} retain={} {}",
                topic,
                qos.level(),
                retain,
                String::from_utf8_lossy(payload)
            );
            if qos != Qos::AtMostOnce {
                handler(SessionEvent::Published(self.next_id));
            }
            Ok(self.next_id)
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub use sim::MqttTransport;
