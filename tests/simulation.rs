// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for scripted playback driven through the plugin.

use std::sync::Arc;
use std::time::Duration;

use evdev_relay::device::MemoryBackend;
use evdev_relay::event::{BusMessage, EventBus, STATE_CHANGED};
use evdev_relay::playback::SequencerState;
use evdev_relay::plugin::{EvdevPlugin, PluginConfig};
use evdev_relay::Error;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio::time::Instant;

async fn recv(rx: &mut broadcast::Receiver<BusMessage>) -> BusMessage {
    tokio::time::timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("timed out waiting for bus message")
        .expect("bus closed")
}

fn start_plugin(config: Value) -> (broadcast::Receiver<BusMessage>, EvdevPlugin<MemoryBackend>) {
    let config = PluginConfig::from_value(config).unwrap();
    let bus = Arc::new(EventBus::new());
    let rx = bus.subscribe();
    let plugin = EvdevPlugin::new("simulated", config, bus, MemoryBackend::new()).unwrap();
    (rx, plugin)
}

async fn wait_for_state(plugin: &EvdevPlugin<MemoryBackend>, expected: SequencerState) {
    tokio::time::timeout(Duration::from_secs(60), async {
        while plugin.sequencer_state() != Some(expected) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("sequencer did not reach the expected state");
}

// ============================================================================
// End-to-end Scenario
// ============================================================================

mod end_to_end {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn single_state_change_then_parks() {
        let (mut rx, plugin) = start_plugin(json!({
            "devices": [],
            "initial_state": {"e1": "OFF"},
            "sequence": {
                "events": [{"offset": 0, "state": {"entity": "e1", "newstate": "ON"}}],
                "loop": 0
            }
        }));
        plugin.start().await;

        match recv(&mut rx).await {
            BusMessage::PluginStarted { name, state, initial, .. } => {
                assert_eq!(name, "simulated");
                assert_eq!(state["e1"], json!("OFF"));
                assert!(initial);
            }
            other => panic!("unexpected message: {other:?}"),
        }

        let message = recv(&mut rx).await;
        assert_eq!(message.namespace(), "default");
        let envelope = message.envelope().expect("state change envelope");
        assert_eq!(envelope.event_type(), STATE_CHANGED);
        assert_eq!(envelope.get("entity_id"), Some(&json!("e1")));
        assert_eq!(envelope.get("old_state"), Some(&json!("OFF")));
        assert_eq!(envelope.get("new_state"), Some(&json!("ON")));

        wait_for_state(&plugin, SequencerState::Parked).await;

        // Parked playback publishes nothing further.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Empty)));
        assert_eq!(plugin.complete_state()["e1"], json!("ON"));

        plugin.stop().await;
        assert!(plugin.sequencer_state().is_none());
    }
}

// ============================================================================
// Timing and Looping
// ============================================================================

mod timing {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn offsets_are_relative_delays() {
        let (mut rx, plugin) = start_plugin(json!({
            "initial_state": {"switch.a": false},
            "sequence": {
                "events": [
                    {"offset": 2, "state": {"entity": "switch.a", "newstate": true}},
                    {"offset": 3, "event": {"event_type": "button_pressed", "data": {"button": 1}}}
                ]
            }
        }));
        let started = Instant::now();
        plugin.start().await;
        assert!(recv(&mut rx).await.is_lifecycle());

        let first = recv(&mut rx).await;
        assert!(first.envelope().unwrap().is_state_change());
        assert_eq!(started.elapsed().as_secs(), 2);

        let second = recv(&mut rx).await;
        let envelope = second.envelope().unwrap();
        assert_eq!(envelope.event_type(), "button_pressed");
        assert_eq!(envelope.get("button"), Some(&json!(1)));
        assert_eq!(started.elapsed().as_secs(), 5);

        plugin.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn looping_sequence_repeats() {
        let (mut rx, plugin) = start_plugin(json!({
            "initial_state": {"light.porch": "off"},
            "sequence": {
                "events": [
                    {"offset": 1, "state": {"entity": "light.porch", "newstate": "on"}},
                    {"offset": 1, "state": {"entity": "light.porch", "newstate": "off"}}
                ],
                "loop": 1
            }
        }));
        plugin.start().await;
        assert!(recv(&mut rx).await.is_lifecycle());

        let expected = ["on", "off", "on", "off", "on"];
        for (i, value) in expected.iter().enumerate() {
            let message = recv(&mut rx).await;
            let envelope = message.envelope().unwrap();
            assert_eq!(envelope.get("new_state"), Some(&json!(value)), "step {i}");
        }

        plugin.stop().await;
        assert!(plugin.sequencer_state().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_and_connect_markers() {
        let (mut rx, plugin) = start_plugin(json!({
            "namespace": "sim",
            "sequence": {
                "events": [
                    {"offset": 1, "disconnect": true},
                    {"offset": 1, "connect": true}
                ],
                "loop": false
            }
        }));
        plugin.start().await;

        assert!(matches!(recv(&mut rx).await, BusMessage::PluginStarted { initial: true, .. }));
        assert!(matches!(recv(&mut rx).await, BusMessage::PluginStopped { ref namespace } if namespace == "sim"));
        assert!(matches!(recv(&mut rx).await, BusMessage::PluginStarted { initial: false, .. }));

        plugin.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_long_delay() {
        let (mut rx, plugin) = start_plugin(json!({
            "initial_state": {"e1": 0},
            "sequence": {"events": [{"offset": 3600, "state": {"entity": "e1", "newstate": 1}}]}
        }));
        plugin.start().await;
        assert!(recv(&mut rx).await.is_lifecycle());
        wait_for_state(&plugin, SequencerState::Idle { cursor: 0 }).await;

        let before = Instant::now();
        plugin.stop().await;
        assert!(before.elapsed() < Duration::from_secs(1));
        assert_eq!(plugin.complete_state()["e1"], json!(0));
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

mod configuration {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn unknown_entity_stops_playback() {
        let (mut rx, plugin) = start_plugin(json!({
            "sequence": {"events": [{"offset": 0, "state": {"entity": "ghost", "newstate": 1}}]}
        }));
        plugin.start().await;
        assert!(recv(&mut rx).await.is_lifecycle());

        wait_for_state(&plugin, SequencerState::Stopped).await;
        assert!(rx.try_recv().is_err());
        assert!(plugin.complete_state().is_empty());

        plugin.stop().await;
    }

    #[test]
    fn empty_step_is_rejected() {
        let err = PluginConfig::from_value(json!({
            "sequence": {"events": [{"offset": 1}]}
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("step 0"));
    }

    #[test]
    fn negative_offset_is_rejected() {
        let err = PluginConfig::from_value(json!({
            "sequence": {"events": [{"offset": -1, "connect": true}]}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("invalid offset"));
    }
}
