//! Interactive console for a StormAudio ISP
//!
//! Prints every device event and forwards each stdin line as a remote
//! `send_cmd`, so simple commands (`MUTE_TOGGLE`), `PRESET_<name>`,
//! `VOLUME_<n>` and raw protocol lines (`ssp.procstate`) all work.
//!
//! ```text
//! UC_LOG_LEVEL=info cargo run --example console -- 192.168.1.50 [port]
//! ```

use serde_json::json;
use stormaudio_isp::{DeviceConfig, DeviceEvent, StormAudioDevice};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let level = std::env::var("UC_LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .init();

    let mut args = std::env::args().skip(1);
    let address = args.next().ok_or("usage: console <address> [port]")?;
    let port = match args.next() {
        Some(port) => port.parse()?,
        None => stormaudio_isp::protocol::DEFAULT_PORT,
    };

    let config =
        DeviceConfig::new(address.replace('.', "_"), "StormAudio", address).with_port(port);
    let device = StormAudioDevice::new(config);
    let remote_id = format!("remote.{}", device.identifier());

    let mut events = device.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                DeviceEvent::Update { entity_id, attributes } => {
                    println!("{} {}", entity_id, serde_json::Value::Object(attributes));
                }
                DeviceEvent::ConfigUpdated(config) => {
                    println!("config {}", serde_json::to_string(&config).unwrap_or_default());
                }
                other => println!("{:?}", other),
            }
        }
    });

    device.connect().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }
        let params = json!({ "command": line, "delay": 0 });
        let status = device.handle_command(&remote_id, "send_cmd", Some(&params)).await;
        println!("-> {:?}", status);
    }

    device.close_connection().await;
    Ok(())
}
