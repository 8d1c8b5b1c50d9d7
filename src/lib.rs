//! Rust driver for StormAudio immersive sound processors (ISP)
//!
//! This library keeps a persistent connection to a StormAudio ISP over its
//! line-based Telnet control protocol and exposes:
//!
//! - Power, mute and volume control with device confirmations
//! - Source, preset and upmixer mode selection
//! - Tone controls, loudness, Dolby mode, StormXT and Auro-Matic settings
//! - A typed session state decoded from the processor's status pushes
//! - Per-entity attribute records (media player, remote, sensors, selects)
//!   delivered as event subscriptions
//!
//! # Quick Start
//!
//! ```no_run
//! use stormaudio_isp::{DeviceConfig, DeviceEvent, StormAudioDevice};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let device = StormAudioDevice::new(DeviceConfig::new("isp", "Cinema", "192.168.1.50"));
//!     let mut events = device.subscribe();
//!     device.connect().await?;
//!
//!     device.power_on().await;
//!     device.select_source("TV").await;
//!     device.set_volume(45).await;
//!
//!     while let Ok(event) = events.recv().await {
//!         if let DeviceEvent::Update { entity_id, attributes } = event {
//!             println!("{}: {:?}", entity_id, attributes);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Setup
//!
//! Before persisting a user-entered address, check that it answers:
//!
//! ```no_run
//! use std::time::Duration;
//! use stormaudio_isp::setup::query_device;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = query_device("", "192.168.1.50", 23, Duration::from_secs(5)).await?;
//!     println!("{}", serde_json::to_string_pretty(&config)?);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The library is organized into several layers:
//!
//! - **Connection**: TCP socket, newline framing and a writer task
//! - **Correlator**: pairs awaited confirmations with incoming lines by shape,
//!   since the protocol carries no request ids
//! - **Decoder**: ordered rule table turning lines into state changes
//! - **Device**: connection lifecycle, read loop and the Command API
//! - **Projection**: session state to entity attribute records
//! - **Commands**: entity command ids and parameters to Command API calls

pub mod commands;
pub mod config;
pub mod connection;
mod control;
pub mod correlator;
pub mod decoder;
pub mod device;
pub mod error;
pub mod projection;
pub mod protocol;
pub mod setup;
pub mod state;
pub mod subscription;

pub use commands::{CommandStatus, SimpleCommand};
pub use config::{DeviceConfig, Timeouts};
pub use device::{ConnectionState, StormAudioDevice};
pub use error::{Result, StormAudioError};
pub use projection::{Attributes, Entity, SelectKind, SensorKind};
pub use protocol::{Command, Matcher, Navigation, ToneAction, ToneControl};
pub use state::{DeviceAttributes, DolbyMode, LoudnessMode, NamedIds, PowerState};
pub use subscription::{DeviceEvent, EventReceiver};
