// SPDX-License-Identifier: MPL-2.0

//! Demo program: replay a scripted sequence and print every bus message.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example simulate -- [config.json] [seconds]
//! ```
//!
//! Without a configuration file a built-in doorbell scenario is played.
//! Set `RUST_LOG=evdev_relay=debug` to see the sequencer's own logging.
//!
//! # Example
//!
//! ```bash
//! RUST_LOG=debug cargo run --example simulate -- doorbell.json 30
//! ```

use std::env;
use std::sync::Arc;
use std::time::Duration;

use evdev_relay::device::MemoryBackend;
use evdev_relay::event::{BusMessage, EventBus};
use evdev_relay::plugin::{EvdevPlugin, PluginConfig};
use serde_json::json;
use tracing_subscriber::EnvFilter;

const DEFAULT_SECONDS: u64 = 10;

fn builtin_config() -> serde_json::Value {
    json!({
        "namespace": "simulated",
        "initial_state": {"binary_sensor.doorbell": "off", "light.hall": "off"},
        "sequence": {
            "events": [
                {"offset": 1, "state": {"entity": "binary_sensor.doorbell", "newstate": "on"}},
                {"offset": 0.5, "state": {"entity": "light.hall", "newstate": "on"}},
                {"offset": 0.5, "event": {"event_type": "doorbell_pressed", "data": {"button": 1}}},
                {"offset": 1, "state": {"entity": "binary_sensor.doorbell", "newstate": "off"}},
                {"offset": 1, "disconnect": true},
                {"offset": 2, "connect": true},
                {"offset": 2, "state": {"entity": "light.hall", "newstate": "off"}}
            ],
            "loop": 1
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() > 3 {
        eprintln!("Usage: {} [config.json] [seconds]", args[0]);
        std::process::exit(1);
    }

    let config = match args.get(1) {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => builtin_config(),
    };
    let seconds = match args.get(2) {
        Some(s) => s.parse()?,
        None => DEFAULT_SECONDS,
    };

    let config = PluginConfig::from_value(config)?;
    let bus = Arc::new(EventBus::new());
    let mut events = bus.subscribe();
    let plugin = EvdevPlugin::new("simulate", config, bus.clone(), MemoryBackend::new())?;

    println!("Playing for {seconds}s in namespace {}...", plugin.namespace());
    plugin.start().await;

    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            () = &mut deadline => break,
            message = events.recv() => match message {
                Ok(BusMessage::Event { namespace, envelope }) => {
                    println!("[{namespace}] {} {}", envelope.event_type(), json!(envelope.data()));
                }
                Ok(BusMessage::PluginStarted { namespace, initial, state, .. }) => {
                    println!("[{namespace}] started (initial: {initial}) with {} entities", state.len());
                }
                Ok(BusMessage::PluginStopped { namespace }) => println!("[{namespace}] stopped"),
                Err(e) => {
                    eprintln!("Event stream ended: {e}");
                    break;
                }
            },
        }
    }

    plugin.stop().await;
    println!("Final state: {}", json!(plugin.complete_state()));
    Ok(())
}
