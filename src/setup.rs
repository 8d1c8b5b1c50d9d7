//! Setup-time helpers: reachability check and config creation

use crate::config::DeviceConfig;
use crate::connection;
use crate::error::StormAudioError;
use std::time::Duration;
use thiserror::Error;

/// Failure classes surfaced to the setup flow
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("No address given")]
    MissingAddress,

    #[error("Connection refused by {0}")]
    ConnectionRefused(String),

    #[error("Timed out connecting to {0}")]
    Timeout(String),

    #[error("Failed to connect: {0}")]
    Other(#[source] StormAudioError),
}

impl From<StormAudioError> for SetupError {
    fn from(e: StormAudioError) -> Self {
        match e {
            StormAudioError::ConnectionRefused { address } => {
                SetupError::ConnectionRefused(address)
            }
            StormAudioError::ConnectTimeout { address } => SetupError::Timeout(address),
            other => SetupError::Other(other),
        }
    }
}

/// Open and immediately close a connection to confirm the processor is
/// reachable
pub async fn test_connection(address: &str, port: u16, limit: Duration) -> Result<(), SetupError> {
    if address.trim().is_empty() {
        return Err(SetupError::MissingAddress);
    }

    match connection::connect(address.trim(), port, limit).await {
        Ok((connection, _reader)) => {
            connection.close().await;
            tracing::debug!("Connection test to {}:{} succeeded", address, port);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Connection test to {}:{} failed: {}", address, port, e);
            Err(e.into())
        }
    }
}

/// Check that `address` answers and build the config to persist
///
/// An empty `name` defaults to `StormAudio (<address>)`. The identifier is
/// the given name, or the address with dots replaced when unnamed.
pub async fn query_device(
    name: &str,
    address: &str,
    port: u16,
    limit: Duration,
) -> Result<DeviceConfig, SetupError> {
    let address = address.trim();
    let name = name.trim();
    test_connection(address, port, limit).await?;

    let identifier = if name.is_empty() {
        address.replace('.', "_")
    } else {
        name.to_string()
    };
    let display_name = if name.is_empty() {
        format!("StormAudio ({})", address)
    } else {
        name.to_string()
    };

    Ok(DeviceConfig::new(identifier, display_name, address).with_port(port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_missing_address() {
        let result = test_connection("  ", 23, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(SetupError::MissingAddress)));
    }

    #[tokio::test]
    async fn test_query_device_defaults_name_and_identifier() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let config = query_device("", "127.0.0.1", port, Duration::from_secs(5)).await.unwrap();
        assert_eq!(config.identifier, "127_0_0_1");
        assert_eq!(config.name, "StormAudio (127.0.0.1)");
        assert_eq!(config.port, port);
    }

    #[test]
    fn test_error_classification() {
        let refused = StormAudioError::ConnectionRefused {
            address: "10.0.0.2:23".to_string(),
        };
        assert!(matches!(
            SetupError::from(refused),
            SetupError::ConnectionRefused(a) if a == "10.0.0.2:23"
        ));

        let other = SetupError::from(StormAudioError::NotConnected);
        assert!(matches!(other, SetupError::Other(StormAudioError::NotConnected)));
    }
}
