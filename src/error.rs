use thiserror::Error;

/// Result type for StormAudio operations
pub type Result<T> = std::result::Result<T, StormAudioError>;

/// Errors that can occur when talking to a StormAudio processor
#[derive(Error, Debug)]
pub enum StormAudioError {
    /// The processor actively refused the TCP connection
    #[error("Connection refused by {address}")]
    ConnectionRefused {
        /// `host:port` that refused the connection
        address: String,
    },

    /// Opening the TCP connection took longer than allowed
    #[error("Timed out connecting to {address}")]
    ConnectTimeout {
        /// `host:port` that did not answer in time
        address: String,
    },

    /// I/O error on the socket
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A command was issued while no connection is open
    #[error("Not connected")]
    NotConnected,

    /// Connection was closed by the peer or torn down locally
    #[error("Connection closed")]
    ConnectionClosed,

    /// No line matching an awaited response arrived in time
    #[error("Timed out waiting for response: {0}")]
    ResponseTimeout(String),

    /// A device line could not be parsed, even after quote repair
    #[error("Malformed payload in {line:?}: {reason}")]
    MalformedPayload {
        /// The raw line as received
        line: String,
        /// What went wrong
        reason: String,
    },

    /// A caller-supplied argument is outside what the device accepts
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Channel receive error
    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl StormAudioError {
    pub(crate) fn malformed(line: &str, reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{parse_payload, response};

    #[test]
    fn test_bad_json_surfaces_as_malformed_payload() {
        let err = parse_payload("ssp.vol.[-4x]", response::VOLUME, false).unwrap_err();
        match err {
            StormAudioError::MalformedPayload { line, .. } => assert_eq!(line, "ssp.vol.[-4x]"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_message_names_the_line() {
        let err = StormAudioError::malformed("ssp.input.[", "EOF while parsing");
        assert_eq!(
            err.to_string(),
            "Malformed payload in \"ssp.input.[\": EOF while parsing"
        );
    }
}
