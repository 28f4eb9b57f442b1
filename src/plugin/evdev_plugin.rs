// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The plugin facade tying devices, state and playback together.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::device::DeviceBackend;
use crate::error::Error;
use crate::event::{EventPublisher, PluginHost};
use crate::playback::{Announcement, Clock, PlaybackSequencer, SequencerState, TokioClock};
use crate::state::{StateSnapshot, StateTable};
use crate::subscription::{SubscribeOptions, SubscriptionRegistry};

use super::{PROTOCOL_VERSION, PluginConfig, PluginMetadata, ServiceCall, ServiceResponse};

/// A running playback task.
struct Playback {
    stop: CancellationToken,
    task: JoinHandle<Result<(), Error>>,
    status: watch::Receiver<SequencerState>,
}

/// Input device plugin for an event-driven automation host.
///
/// The plugin relays raw events from subscribed devices into its namespace
/// and, when configured with a [`ScriptedSequence`](crate::playback::ScriptedSequence),
/// replays that sequence to simulate a device.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use evdev_relay::device::MemoryBackend;
/// use evdev_relay::event::EventBus;
/// use evdev_relay::plugin::{EvdevPlugin, PluginConfig};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> evdev_relay::Result<()> {
/// let backend = MemoryBackend::new();
/// let keyboard = backend.add_device("/dev/input/event3", Some("Test Keyboard"));
///
/// let bus = Arc::new(EventBus::new());
///
/// let config = PluginConfig::new().with_device("/dev/input/event3");
/// let plugin = EvdevPlugin::new("evdev", config, bus, backend)?;
/// plugin.start().await;
///
/// keyboard.send_key(30, 1);
///
/// // Service calls use the host's keyword-argument form
/// let kwargs = json!({"device": "/dev/input/event3"});
/// plugin.call_service("unsubscribe", kwargs.as_object().unwrap()).await?;
///
/// plugin.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct EvdevPlugin<B: DeviceBackend, C: Clock + Clone = TokioClock> {
    name: String,
    config: PluginConfig,
    host: Arc<dyn PluginHost>,
    state: Arc<StateTable>,
    registry: SubscriptionRegistry<B>,
    clock: C,
    playback: Mutex<Option<Playback>>,
    lifecycle: tokio::sync::Mutex<()>,
    started: AtomicBool,
}

impl<B: DeviceBackend> EvdevPlugin<B, TokioClock> {
    /// Creates a plugin reading devices through `backend`.
    ///
    /// The state table is seeded from `config.initial_state`.
    ///
    /// # Errors
    ///
    /// Returns any error from [`PluginConfig::validate`].
    pub fn new(
        name: impl Into<String>,
        config: PluginConfig,
        host: Arc<dyn PluginHost>,
        backend: B,
    ) -> Result<Self, Error> {
        config.validate()?;

        let publisher: Arc<dyn EventPublisher> = Arc::clone(&host) as Arc<dyn EventPublisher>;
        let registry = SubscriptionRegistry::new(
            backend,
            publisher,
            config.namespace.clone(),
            config.event_name.clone(),
        );
        let state = Arc::new(StateTable::from_initial(config.initial_state.clone()));

        Ok(Self {
            name: name.into(),
            config,
            host,
            state,
            registry,
            clock: TokioClock,
            playback: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
            started: AtomicBool::new(false),
        })
    }
}

impl<B: DeviceBackend, C: Clock + Clone> EvdevPlugin<B, C> {
    /// Replaces the clock driving playback.
    #[must_use]
    pub fn with_clock<C2: Clock + Clone>(self, clock: C2) -> EvdevPlugin<B, C2> {
        EvdevPlugin {
            name: self.name,
            config: self.config,
            host: self.host,
            state: self.state,
            registry: self.registry,
            clock,
            playback: self.playback,
            lifecycle: self.lifecycle,
            started: self.started,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts the plugin.
    ///
    /// The plugin announces itself to the host before anything else is
    /// published, then starts playback if a sequence is configured and
    /// subscribes the configured devices. A device that cannot be opened is
    /// logged and skipped. Calling `start` on a started plugin does nothing.
    ///
    /// `start` and [`stop`](Self::stop) never overlap: a `stop` issued while
    /// devices are still being subscribed waits and then releases them.
    ///
    /// Returns the number of configured devices that were subscribed.
    pub async fn start(&self) -> usize {
        let _lifecycle = self.lifecycle.lock().await;
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!(namespace = %self.config.namespace, "Plugin already started");
            return 0;
        }
        tracing::info!(
            name = %self.name,
            namespace = %self.config.namespace,
            devices = self.config.devices.len(),
            simulated = self.config.sequence.is_some(),
            "Starting plugin"
        );

        self.host.notify_started(
            &self.name,
            &self.config.namespace,
            self.metadata(),
            self.state.snapshot(),
            true,
        );

        if let Some(sequence) = &self.config.sequence {
            let announcement = Announcement {
                name: self.name.clone(),
                namespace: self.config.namespace.clone(),
                metadata: self.metadata(),
            };
            let sequencer = PlaybackSequencer::new(
                announcement,
                sequence.clone(),
                Arc::clone(&self.state),
                Arc::clone(&self.host),
            )
            .with_clock(self.clock.clone())
            .without_handshake();

            let stop = CancellationToken::new();
            let status = sequencer.watch();
            let task = tokio::spawn(sequencer.run(stop.clone()));
            *self.playback.lock() = Some(Playback { stop, task, status });
        }

        let options = SubscribeOptions {
            grab: self.config.grab,
        };
        let mut subscribed = 0;
        for device in &self.config.devices {
            match self.registry.subscribe(device, options).await {
                Ok(_) => subscribed += 1,
                Err(e) => tracing::error!(%device, error = %e, "Failed to subscribe configured device"),
            }
        }
        subscribed
    }

    /// Stops playback and releases every device.
    ///
    /// Safe to call any number of times.
    pub async fn stop(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        let playback = self.playback.lock().take();
        if let Some(playback) = playback {
            playback.stop.cancel();
            match playback.task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Playback had ended with an error"),
                Err(e) => tracing::error!(error = %e, "Playback task did not finish cleanly"),
            }
        }

        let closed = self.registry.shutdown_all().await;
        if self.started.swap(false, Ordering::SeqCst) {
            tracing::info!(namespace = %self.config.namespace, closed, "Plugin stopped");
        }
    }

    // =========================================================================
    // Services
    // =========================================================================

    /// Parses and executes a host service call.
    ///
    /// # Errors
    ///
    /// Any error from [`ServiceCall::parse`] or [`execute`](Self::execute).
    pub async fn call_service(
        &self,
        service: &str,
        kwargs: &Map<String, Value>,
    ) -> Result<ServiceResponse, Error> {
        let call = ServiceCall::parse(service, kwargs)?;
        self.execute(call).await
    }

    /// Executes a parsed service call.
    ///
    /// # Errors
    ///
    /// - [`Error::NamespaceMismatch`] if the call names another namespace
    /// - any error from [`SubscriptionRegistry::subscribe`] or
    ///   [`SubscriptionRegistry::unsubscribe`]
    pub async fn execute(&self, call: ServiceCall) -> Result<ServiceResponse, Error> {
        if let Some(namespace) = call.namespace()
            && namespace != self.config.namespace
        {
            return Err(Error::NamespaceMismatch {
                expected: self.config.namespace.clone(),
                actual: namespace.to_string(),
            });
        }

        match call {
            ServiceCall::Subscribe { device, grab, .. } => {
                let options = SubscribeOptions {
                    grab: grab.unwrap_or(self.config.grab),
                };
                let handle = self.registry.subscribe(&device, options).await?;
                Ok(ServiceResponse::Subscribed(handle))
            }
            ServiceCall::Unsubscribe { device, .. } => {
                self.registry.unsubscribe(&device).await?;
                Ok(ServiceResponse::Unsubscribed)
            }
        }
    }

    // =========================================================================
    // State and metadata
    // =========================================================================

    /// Returns the metadata announced to the host.
    #[must_use]
    pub fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            protocol_version: PROTOCOL_VERSION.to_string(),
            event_name: self.config.event_name.clone(),
            devices: self.config.devices.clone(),
            grab: self.config.grab,
        }
    }

    /// Returns a snapshot of every entity's state.
    #[must_use]
    pub fn complete_state(&self) -> StateSnapshot {
        self.state.snapshot()
    }

    /// Stores a value written by the host. No event is published.
    pub fn set_plugin_state(&self, entity: impl Into<String>, value: Value) {
        self.state.set(entity, value);
    }

    /// Returns the current playback state, if a sequence was started.
    #[must_use]
    pub fn sequencer_state(&self) -> Option<SequencerState> {
        self.playback
            .lock()
            .as_ref()
            .map(|playback| *playback.status.borrow())
    }

    /// Returns the plugin name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the namespace events are published into.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Returns `true` between [`start`](Self::start) and [`stop`](Self::stop).
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Returns the subscription registry.
    #[must_use]
    pub fn registry(&self) -> &SubscriptionRegistry<B> {
        &self.registry
    }

    /// Returns the shared state table.
    #[must_use]
    pub fn state_table(&self) -> &Arc<StateTable> {
        &self.state
    }
}

impl<B: DeviceBackend, C: Clock + Clone> std::fmt::Debug for EvdevPlugin<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevPlugin")
            .field("name", &self.name)
            .field("namespace", &self.config.namespace)
            .field("started", &self.is_started())
            .field("sequencer", &self.sequencer_state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{EV_KEY, MemoryBackend, SessionState};
    use crate::event::{BusMessage, EventBus, STATE_CHANGED};
    use crate::playback::{ScriptEvent, ScriptedSequence};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::broadcast;

    fn kwargs(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("kwargs must be an object"),
        }
    }

    async fn next_message(rx: &mut broadcast::Receiver<BusMessage>) -> BusMessage {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for bus message")
            .expect("bus closed")
    }

    fn plugin(config: PluginConfig, backend: MemoryBackend) -> (Arc<EventBus>, EvdevPlugin<MemoryBackend>) {
        let bus = Arc::new(EventBus::new());
        let plugin = EvdevPlugin::new("evdev", config, Arc::clone(&bus) as Arc<dyn PluginHost>, backend)
            .unwrap();
        (bus, plugin)
    }

    #[tokio::test]
    async fn start_without_sequence_announces() {
        let (bus, plugin) = plugin(
            PluginConfig::new().with_initial_state("sensor.x", json!(1)),
            MemoryBackend::new(),
        );
        let mut rx = bus.subscribe();

        assert_eq!(plugin.start().await, 0);
        match next_message(&mut rx).await {
            BusMessage::PluginStarted {
                name,
                namespace,
                metadata,
                state,
                initial,
            } => {
                assert_eq!(name, "evdev");
                assert_eq!(namespace, "default");
                assert_eq!(metadata.protocol_version, PROTOCOL_VERSION);
                assert_eq!(state["sensor.x"], json!(1));
                assert!(initial);
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(plugin.is_started());
        assert!(plugin.sequencer_state().is_none());
        plugin.stop().await;
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let backend = MemoryBackend::new();
        let _keyboard = backend.add_device("/dev/input/event0", Some("kbd"));
        let (bus, plugin) = plugin(PluginConfig::new().with_device("/dev/input/event0"), backend);
        let mut rx = bus.subscribe();

        assert_eq!(plugin.start().await, 1);
        assert_eq!(plugin.start().await, 0);
        assert!(next_message(&mut rx).await.is_lifecycle());
        assert!(rx.try_recv().is_err());
        plugin.stop().await;
    }

    #[tokio::test]
    async fn start_skips_missing_devices() {
        let backend = MemoryBackend::new();
        let _keyboard = backend.add_device("/dev/input/event0", Some("kbd"));
        let config = PluginConfig::new()
            .with_device("/dev/input/missing")
            .with_device("/dev/input/event0");
        let (_bus, plugin) = plugin(config, backend);

        assert_eq!(plugin.start().await, 1);
        assert_eq!(plugin.registry().devices().await, vec!["/dev/input/event0"]);
        plugin.stop().await;
    }

    #[tokio::test]
    async fn relays_device_events_with_configured_name() {
        let backend = MemoryBackend::new();
        let keyboard = backend.add_device("/dev/input/event0", Some("kbd"));
        let config = PluginConfig::new()
            .with_namespace("kb")
            .with_event_name("KEYPRESS")
            .with_device("/dev/input/event0");
        let (bus, plugin) = plugin(config, backend);
        let mut rx = bus.subscribe();
        plugin.start().await;
        let _ = next_message(&mut rx).await;

        keyboard.send(crate::device::RawInputEvent::new(EV_KEY, 30, 1));
        match next_message(&mut rx).await {
            BusMessage::Event { namespace, envelope } => {
                assert_eq!(namespace, "kb");
                assert_eq!(envelope.event_type(), "KEYPRESS");
                assert_eq!(envelope.get("code"), Some(&json!(30)));
            }
            other => panic!("unexpected message: {other:?}"),
        }
        plugin.stop().await;
    }

    #[tokio::test]
    async fn stop_releases_grabs_and_is_idempotent() {
        let backend = MemoryBackend::new();
        let keyboard = backend.add_device("/dev/input/event0", Some("kbd"));
        let (_bus, plugin) = plugin(PluginConfig::new().with_device("/dev/input/event0"), backend);

        plugin.start().await;
        assert!(keyboard.is_grabbed());

        plugin.stop().await;
        assert!(!keyboard.is_grabbed());
        assert!(plugin.registry().is_empty().await);
        assert!(!plugin.is_started());

        plugin.stop().await;
    }

    #[tokio::test]
    async fn service_subscribe_and_unsubscribe() {
        let backend = MemoryBackend::new();
        let keyboard = backend.add_device("/dev/input/event0", Some("kbd"));
        let (_bus, plugin) = plugin(PluginConfig::new(), backend);
        plugin.start().await;

        let response = plugin
            .call_service(
                "evdev/subscribe",
                &kwargs(json!({"device": "/dev/input/event0", "grab": false})),
            )
            .await
            .unwrap();
        let ServiceResponse::Subscribed(handle) = response else {
            panic!("expected a subscription handle");
        };
        assert!(!handle.grabbed());
        assert!(!keyboard.is_grabbed());

        let err = plugin
            .call_service("subscribe", &kwargs(json!({"device": "/dev/input/event0"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadySubscribed(_)));

        let response = plugin
            .call_service("unsubscribe", &kwargs(json!({"device": "/dev/input/event0"})))
            .await
            .unwrap();
        assert!(matches!(response, ServiceResponse::Unsubscribed));
        assert_eq!(handle.state(), SessionState::Closed);

        let err = plugin
            .call_service("unsubscribe", &kwargs(json!({"device": "/dev/input/event0"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotSubscribed(_)));
        plugin.stop().await;
    }

    #[tokio::test]
    async fn service_rejects_other_namespace() {
        let backend = MemoryBackend::new();
        let _keyboard = backend.add_device("/dev/input/event0", Some("kbd"));
        let (_bus, plugin) = plugin(PluginConfig::new().with_namespace("kb"), backend);

        let err = plugin
            .call_service(
                "subscribe",
                &kwargs(json!({"device": "/dev/input/event0", "namespace": "other"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::NamespaceMismatch { ref expected, ref actual } if expected == "kb" && actual == "other"
        ));
        assert!(plugin.registry().is_empty().await);
    }

    #[tokio::test]
    async fn service_missing_device_fails() {
        let (_bus, plugin) = plugin(PluginConfig::new(), MemoryBackend::new());

        let err = plugin
            .call_service("subscribe", &kwargs(json!({"device": "/dev/missing"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeviceOpen { ref device, .. } if device == "/dev/missing"));
        assert!(plugin.registry().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn sequence_drives_handshake_and_state() {
        let sequence = ScriptedSequence::new().step(
            Duration::from_secs(2),
            ScriptEvent::state_change("light.hall", "ON"),
        );
        let config = PluginConfig::new()
            .with_sequence(sequence)
            .with_initial_state("light.hall", "OFF");
        let (bus, plugin) = plugin(config, MemoryBackend::new());
        let mut rx = bus.subscribe();

        plugin.start().await;
        assert!(matches!(
            next_message(&mut rx).await,
            BusMessage::PluginStarted { initial: true, .. }
        ));

        let message = next_message(&mut rx).await;
        let envelope = message.envelope().unwrap();
        assert_eq!(envelope.event_type(), STATE_CHANGED);
        assert_eq!(envelope.get("old_state"), Some(&json!("OFF")));
        assert_eq!(plugin.complete_state()["light.hall"], json!("ON"));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(plugin.sequencer_state(), Some(SequencerState::Parked));

        plugin.stop().await;
        assert!(plugin.sequencer_state().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn handshake_precedes_device_events_in_simulation() {
        let backend = MemoryBackend::new();
        let keyboard = backend.add_device("/dev/input/event0", Some("kbd"));
        keyboard.send_key(30, 1);

        let sequence = ScriptedSequence::new().step(
            Duration::from_secs(60),
            ScriptEvent::state_change("light.hall", "ON"),
        );
        let config = PluginConfig::new()
            .with_device("/dev/input/event0")
            .with_sequence(sequence)
            .with_initial_state("light.hall", "OFF");
        let (bus, plugin) = plugin(config, backend);
        let mut rx = bus.subscribe();

        plugin.start().await;
        assert!(matches!(
            next_message(&mut rx).await,
            BusMessage::PluginStarted { initial: true, .. }
        ));
        let message = next_message(&mut rx).await;
        assert_eq!(message.envelope().unwrap().event_type(), "EVDEV_EVENT");
        // The sequencer must not announce a second time.
        let message = next_message(&mut rx).await;
        assert!(!message.is_lifecycle());

        plugin.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_issued_during_start_releases_every_device() {
        let backend = MemoryBackend::new();
        let handles: Vec<_> = (0..16)
            .map(|n| backend.add_device(format!("/dev/input/event{n}"), None))
            .collect();
        let config = handles
            .iter()
            .fold(PluginConfig::new(), |config, handle| config.with_device(handle.path()));
        let (_bus, plugin) = plugin(config, backend);
        let plugin = Arc::new(plugin);

        let starter = tokio::spawn({
            let plugin = Arc::clone(&plugin);
            async move { plugin.start().await }
        });
        while !plugin.is_started() {
            tokio::task::yield_now().await;
        }
        plugin.stop().await;
        assert_eq!(starter.await.unwrap(), handles.len());

        assert!(plugin.registry().is_empty().await);
        assert!(!plugin.is_started());
        for handle in &handles {
            assert!(!handle.is_grabbed(), "{} still grabbed", handle.path());
            assert_eq!(handle.open_count(), 0);
        }
    }

    #[test]
    fn metadata_reflects_config() {
        let config = PluginConfig::new()
            .with_event_name("KEYS")
            .with_device("/dev/input/event1")
            .with_grab(false);
        let (_bus, plugin) = plugin(config, MemoryBackend::new());
        let metadata = plugin.metadata();
        assert_eq!(metadata.event_name, "KEYS");
        assert_eq!(metadata.devices, vec!["/dev/input/event1"]);
        assert!(!metadata.grab);
    }

    #[test]
    fn set_plugin_state_writes_table() {
        let (_bus, plugin) = plugin(PluginConfig::new(), MemoryBackend::new());
        plugin.set_plugin_state("input.mode", json!("gaming"));
        assert_eq!(plugin.complete_state()["input.mode"], json!("gaming"));
        assert_eq!(plugin.state_table().get("input.mode").unwrap(), json!("gaming"));
    }

    #[test]
    fn new_rejects_invalid_config() {
        let bus = Arc::new(EventBus::new());
        let err = EvdevPlugin::new(
            "evdev",
            PluginConfig::new().with_event_name(" "),
            bus,
            MemoryBackend::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidEnvelope(_)));
    }
}
