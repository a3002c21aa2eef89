// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-instance socket event propagation.
//!
//! Emissions are never delivered directly. They are published on the
//! channel for their addressing kind, and every instance (this one
//! included) consumes all five channels and delivers to the connections it
//! holds. Whoever decides to send never needs to know which process holds
//! the recipient.

use std::sync::Arc;

use nestor_config::RoleDelivery;
use nestor_core::{NestorError, PubSub, Subscription};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::contract::{Addressing, PROTOCOL_VERSION, SocketEvent};
use crate::hub::ConnectionHub;
use crate::metrics;
use crate::registry::SocketRegistry;

/// Publishes addressed events and delivers consumed ones locally.
#[derive(Clone)]
pub struct EventPropagator {
    bus: Arc<dyn PubSub>,
    registry: Arc<SocketRegistry>,
    hub: Arc<ConnectionHub>,
    role_delivery: RoleDelivery,
}

impl EventPropagator {
    pub fn new(
        bus: Arc<dyn PubSub>,
        registry: Arc<SocketRegistry>,
        hub: Arc<ConnectionHub>,
        role_delivery: RoleDelivery,
    ) -> Self {
        Self {
            bus,
            registry,
            hub,
            role_delivery,
        }
    }

    pub fn registry(&self) -> &Arc<SocketRegistry> {
        &self.registry
    }

    pub fn hub(&self) -> &Arc<ConnectionHub> {
        &self.hub
    }

    /// Sends to one user's connections. `false` without a `userId`.
    pub async fn propagate_event(&self, event: SocketEvent) -> Result<bool, NestorError> {
        if event.user_id.is_none() {
            return Ok(false);
        }
        self.publish(Addressing::Send, &event).await?;
        Ok(true)
    }

    pub async fn emit_to_all(&self, event: SocketEvent) -> Result<bool, NestorError> {
        self.publish(Addressing::EmitAll, &event).await?;
        Ok(true)
    }

    /// `false` without a `room`.
    pub async fn emit_to_room(&self, event: SocketEvent) -> Result<bool, NestorError> {
        if event.room.as_deref().is_none_or(str::is_empty) {
            return Ok(false);
        }
        self.publish(Addressing::EmitRoom, &event).await?;
        Ok(true)
    }

    pub async fn emit_to_authenticated(&self, event: SocketEvent) -> Result<bool, NestorError> {
        self.publish(Addressing::EmitAuthenticated, &event).await?;
        Ok(true)
    }

    /// `false` without a `roleId`.
    pub async fn emit_to_role(&self, event: SocketEvent) -> Result<bool, NestorError> {
        if event.role_id.is_none() {
            return Ok(false);
        }
        self.publish(Addressing::EmitRole, &event).await?;
        Ok(true)
    }

    async fn publish(&self, addressing: Addressing, event: &SocketEvent) -> Result<(), NestorError> {
        let payload = serde_json::to_string(event)?;
        self.bus.publish(addressing.channel(), &payload).await?;
        metrics::record_published(addressing);
        debug!(channel = addressing.channel(), event = %event.event, "socket event published");
        Ok(())
    }

    /// Subscribes to all five channels, then consumes them in background
    /// tasks until `cancel` fires. Subscriptions are in place when this
    /// returns.
    pub async fn start(&self, cancel: &CancellationToken) -> Result<Vec<JoinHandle<()>>, NestorError> {
        let mut tasks = Vec::with_capacity(Addressing::ALL.len());
        for addressing in Addressing::ALL {
            let subscription = self.bus.subscribe(addressing.channel()).await?;
            let propagator = self.clone();
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                propagator.consume(addressing, subscription, cancel).await;
            }));
        }
        info!(channels = tasks.len(), "socket event propagation started");
        Ok(tasks)
    }

    async fn consume(&self, addressing: Addressing, mut subscription: Subscription, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                payload = subscription.recv() => match payload {
                    Some(payload) => {
                        self.deliver(addressing, &payload);
                    }
                    None => break,
                },
            }
        }
        debug!(channel = addressing.channel(), "socket event consumer stopped");
    }

    /// Applies the delivery rule for `addressing` to a received payload and
    /// returns how many local connections accepted the frame. Unparseable
    /// payloads and unknown versions are dropped.
    pub fn deliver(&self, addressing: Addressing, payload: &str) -> usize {
        let event: SocketEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(err) => {
                warn!(channel = addressing.channel(), error = %err, "unparseable socket event dropped");
                return 0;
            }
        };
        if event.v != PROTOCOL_VERSION {
            warn!(
                channel = addressing.channel(),
                version = event.v,
                "socket event with unknown version dropped"
            );
            return 0;
        }

        let targets = self.targets(addressing, &event);
        let frame = json!({"event": event.event, "data": event.data}).to_string();
        let delivered = targets
            .iter()
            .filter(|conn| conn.send_frame(frame.clone()))
            .count();
        metrics::record_delivered(addressing, delivered);
        debug!(channel = addressing.channel(), event = %event.event, delivered, "socket event delivered");
        delivered
    }

    fn targets(&self, addressing: Addressing, event: &SocketEvent) -> Vec<Connection> {
        match addressing {
            Addressing::Send => {
                let Some(user) = &event.user_id else {
                    return Vec::new();
                };
                let mut conns = self.registry.get(&user.to_string());
                if let Some(origin) = &event.socket_id {
                    conns.retain(|c| c.id().as_str() != origin);
                }
                conns
            }
            Addressing::EmitAll => self.hub.all(),
            Addressing::EmitRoom => match &event.room {
                Some(room) => self.hub.room_members(room),
                None => Vec::new(),
            },
            Addressing::EmitAuthenticated => self.registry.get_all(),
            Addressing::EmitRole => {
                let all = self.registry.get_all();
                match (self.role_delivery, event.role_id) {
                    (RoleDelivery::AllAuthenticated, _) => all,
                    (RoleDelivery::ByRole, Some(role)) => all
                        .into_iter()
                        .filter(|c| c.identity().and_then(|i| i.role_id) == Some(role))
                        .collect(),
                    (RoleDelivery::ByRole, None) => Vec::new(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Identity;
    use async_trait::async_trait;
    use nestor_core::{AdapterType, HealthStatus, PluginAdapter};
    use std::sync::Mutex;
    use tokio::sync::{broadcast, mpsc};
    use tracing_test::traced_test;

    /// Records publishes; subscriptions never yield.
    #[derive(Default)]
    struct Recorder {
        published: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl PluginAdapter for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 0, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::PubSub
        }
        async fn health_check(&self) -> Result<HealthStatus, NestorError> {
            Ok(HealthStatus::Healthy)
        }
        async fn shutdown(&self) -> Result<(), NestorError> {
            Ok(())
        }
    }

    #[async_trait]
    impl PubSub for Recorder {
        async fn publish(&self, channel: &str, payload: &str) -> Result<(), NestorError> {
            self.published
                .lock()
                .unwrap()
                .push((channel.to_string(), payload.to_string()));
            Ok(())
        }
        async fn subscribe(&self, channel: &str) -> Result<Subscription, NestorError> {
            Ok(Subscription::new(channel, broadcast::channel(1).1))
        }
    }

    fn propagator(bus: Arc<Recorder>, role_delivery: RoleDelivery) -> EventPropagator {
        EventPropagator::new(
            bus,
            Arc::new(SocketRegistry::new()),
            Arc::new(ConnectionHub::new()),
            role_delivery,
        )
    }

    fn authenticated(
        p: &EventPropagator,
        user_id: i64,
        role_id: Option<i64>,
    ) -> (Connection, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(8);
        let identity = Identity { user_id, role_id };
        let conn = Connection::new(Some(identity), tx);
        p.hub().connect(conn.clone());
        p.registry().add(&identity.key(), conn.clone());
        (conn, rx)
    }

    #[tokio::test]
    async fn missing_discriminators_publish_nothing() {
        let bus = Arc::new(Recorder::default());
        let p = propagator(bus.clone(), RoleDelivery::ByRole);
        assert!(!p.emit_to_room(SocketEvent::new("e", 1)).await.unwrap());
        assert!(!p.emit_to_room(SocketEvent::new("e", 1).in_room("")).await.unwrap());
        assert!(!p.emit_to_role(SocketEvent::new("e", 1)).await.unwrap());
        assert!(!p.propagate_event(SocketEvent::new("e", 1)).await.unwrap());
        assert!(bus.published.lock().unwrap().is_empty());

        assert!(p.emit_to_all(SocketEvent::new("e", 1)).await.unwrap());
        assert!(p.emit_to_authenticated(SocketEvent::new("e", 1)).await.unwrap());
        let published = bus.published.lock().unwrap();
        assert_eq!(published[0].0, "nestor.socket.v1.emit_all");
        assert_eq!(published[1].0, "nestor.socket.v1.emit_authenticated");
    }

    #[tokio::test]
    async fn send_skips_the_originating_connection() {
        let p = propagator(Arc::default(), RoleDelivery::ByRole);
        let (origin, mut origin_rx) = authenticated(&p, 1, None);
        let (_other, mut other_rx) = authenticated(&p, 1, None);
        let (_stranger, mut stranger_rx) = authenticated(&p, 2, None);

        let payload = serde_json::to_string(
            &SocketEvent::new("msg", "hi")
                .to_user(1)
                .except(origin.id().as_str()),
        )
        .unwrap();
        assert_eq!(p.deliver(Addressing::Send, &payload), 1);
        assert!(other_rx.try_recv().is_ok());
        assert!(origin_rx.try_recv().is_err());
        assert!(stranger_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn role_delivery_by_role_filters() {
        let p = propagator(Arc::default(), RoleDelivery::ByRole);
        let (_admin, mut admin_rx) = authenticated(&p, 1, Some(1));
        let (_member, mut member_rx) = authenticated(&p, 2, Some(2));

        let payload = serde_json::to_string(&SocketEvent::new("r", 0).for_role(1)).unwrap();
        assert_eq!(p.deliver(Addressing::EmitRole, &payload), 1);
        assert!(admin_rx.try_recv().is_ok());
        assert!(member_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn role_delivery_all_authenticated_broadcasts() {
        let p = propagator(Arc::default(), RoleDelivery::AllAuthenticated);
        let (_admin, mut admin_rx) = authenticated(&p, 1, Some(1));
        let (_member, mut member_rx) = authenticated(&p, 2, Some(2));
        let (tx, mut guest_rx) = mpsc::channel(8);
        p.hub().connect(Connection::new(None, tx));

        let payload = serde_json::to_string(&SocketEvent::new("r", 0).for_role(1)).unwrap();
        assert_eq!(p.deliver(Addressing::EmitRole, &payload), 2);
        assert!(admin_rx.try_recv().is_ok());
        assert!(member_rx.try_recv().is_ok());
        assert!(guest_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn emit_all_includes_guests() {
        let p = propagator(Arc::default(), RoleDelivery::ByRole);
        let (_user, mut user_rx) = authenticated(&p, 1, None);
        let (tx, mut guest_rx) = mpsc::channel(8);
        p.hub().connect(Connection::new(None, tx));

        let payload = serde_json::to_string(&SocketEvent::new("all", 1)).unwrap();
        assert_eq!(p.deliver(Addressing::EmitAll, &payload), 2);
        assert_eq!(p.deliver(Addressing::EmitAuthenticated, &payload), 1);
        assert!(user_rx.try_recv().is_ok());
        assert!(guest_rx.try_recv().is_ok());
    }

    #[traced_test]
    #[tokio::test]
    async fn unknown_versions_are_dropped_with_a_warning() {
        let p = propagator(Arc::default(), RoleDelivery::ByRole);
        let (_user, mut rx) = authenticated(&p, 1, None);

        assert_eq!(
            p.deliver(Addressing::EmitAll, r#"{"v": 2, "event": "e", "data": 1}"#),
            0
        );
        assert!(logs_contain("unknown version"));
        assert_eq!(p.deliver(Addressing::EmitAll, "not json"), 0);
        assert!(logs_contain("unparseable"));
        assert!(rx.try_recv().is_err());
    }
}
